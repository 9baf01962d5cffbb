//! Integration tests for rendering templates with the default engine.

use std::thread;

use ejs::ejs_script::ScriptError;
use ejs::{CompileError, CompileOptions, Engine, Error, RenderError, Template, locals, render};
use pretty_assertions::assert_eq;
use serde::Serialize;
use serde_json::json;

fn render_default<S: Serialize + ?Sized>(template: &str, locals: &S) -> String {
    render(template, locals, &CompileOptions::default()).unwrap()
}

fn compile_default(template: &str) -> Template {
    Engine::new()
        .compile_template(template, &CompileOptions::default())
        .unwrap()
}

// =============================================================================
// Output tags
// =============================================================================

#[test]
fn template_without_tags_renders_unchanged() {
    assert_eq!(render_default("<p>yay</p>", &()), "<p>yay</p>");
    assert_eq!(render_default("", &()), "");
    assert_eq!(render_default("line one\nline two\n", &()), "line one\nline two\n");
}

#[test]
fn escaped_output() {
    let out = render_default("<p><%= name %></p>", &locals! { "name" => "<script>" });
    assert_eq!(out, "<p>&lt;script&gt;</p>");
}

#[test]
fn raw_output_is_untouched() {
    let out = render_default("<%- name %>", &locals! { "name" => "<b>" });
    assert_eq!(out, "<b>");
}

#[test]
fn escaping_fixtures() {
    assert_eq!(render_default(r#"<%= "&nbsp;<script>" %>"#, &()), "&amp;nbsp;&lt;script&gt;");
    assert_eq!(render_default(r#"<%= "The Jones's" %>"#, &()), "The Jones&#39;s");
    assert_eq!(render_default(r#"<%= "&foo_bar;" %>"#, &()), "&amp;foo_bar;");
}

#[test]
fn null_and_undefined_render_empty() {
    let locals = json!({ "nothing": null });
    assert_eq!(render_default("[<%= nothing %>]", &locals), "[]");
    assert_eq!(render_default("[<%- nothing %>]", &locals), "[]");
    assert_eq!(render_default("[<%= locals.missing %>]", &locals), "[]");
}

#[test]
fn numbers_and_booleans_are_stringified() {
    let out = render_default("<%= count %> <%= ok %> <%= 1 / 4 %>", &locals! { "count" => 3, "ok" => true });
    assert_eq!(out, "3 true 0.25");
}

// =============================================================================
// Scriptlets
// =============================================================================

#[test]
fn conditional_scriptlet() {
    let template = "<% if (user) { %><p><%= user.name %></p><% } else { %><p>nobody</p><% } %>";
    let out = render_default(template, &json!({ "user": { "name": "tobi" } }));
    assert_eq!(out, "<p>tobi</p>");
    let out = render_default(template, &json!({ "user": null }));
    assert_eq!(out, "<p>nobody</p>");
}

#[test]
fn loop_with_callback() {
    let template = "<ul><% users.forEach(function(user){ %><li><%= user.name %></li><% }) %></ul>";
    let locals = json!({ "users": [{ "name": "tobi" }, { "name": "loki" }] });
    assert_eq!(render_default(template, &locals), "<ul><li>tobi</li><li>loki</li></ul>");
}

#[test]
fn for_of_loop_and_local_variables() {
    let template = "<% var total = 0; for (const n of numbers) { total += n; } %>sum=<%= total %>";
    let out = render_default(template, &locals! { "numbers" => vec![1, 2, 3] });
    assert_eq!(out, "sum=6");
}

#[test]
fn locals_object_is_in_scope() {
    let out = render_default("<%= locals.name %>", &locals! { "name" => "tobi" });
    assert_eq!(out, "tobi");
}

#[test]
fn serializable_struct_as_locals() {
    #[derive(Serialize)]
    struct Page {
        title: String,
        tags: Vec<String>,
    }

    let page = Page {
        title: "Rust & Templates".to_string(),
        tags: vec!["a".to_string(), "b".to_string()],
    };
    let out = render_default("<h1><%= title %></h1><%= tags.join(\", \") %>", &page);
    assert_eq!(out, "<h1>Rust &amp; Templates</h1>a, b");
}

#[test]
fn non_object_locals_are_rejected() {
    let err = render("x", &3, &CompileOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Render(RenderError::InvalidLocals { kind: "a number" })
    ));
    let err = render("x", &vec![1], &CompileOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "locals must serialize to an object, got an array");
}

// =============================================================================
// Literal text
// =============================================================================

#[test]
fn quotes_and_backslashes_survive() {
    let template = r#"<p>"double" 'single' back\slash \n</p>"#;
    assert_eq!(render_default(template, &()), template);
}

#[test]
fn literal_tag_escape() {
    assert_eq!(render_default(r#"<%%- "foo" %>"#, &()), r#"<%- "foo" %>"#);
    assert_eq!(render_default("<%%= x %%>", &()), "<%= x %%>");
}

#[test]
fn comments_render_nothing() {
    assert_eq!(render_default("a<%# a comment\nspanning lines %>b", &()), "ab");
}

// =============================================================================
// Newlines and whitespace control
// =============================================================================

#[test]
fn untrimmed_tags_keep_newlines() {
    let out = render_default("<% if (true) { %>\nyes\n<% } %>\n", &());
    assert_eq!(out, "\nyes\n\n");
}

#[test]
fn trim_suffix_drops_one_newline() {
    let template = "<ul>\n<% users.forEach(function(user){ -%>\n<li><%= user %></li>\n<% }) -%>\n</ul>";
    let out = render_default(template, &locals! { "users" => vec!["a", "b"] });
    assert_eq!(out, "<ul>\n<li>a</li>\n<li>b</li>\n</ul>");
}

#[test]
fn trim_suffix_drops_only_the_first_newline() {
    let out = render_default("<%= x -%>\n\nend", &locals! { "x" => 1 });
    assert_eq!(out, "1\nend");
    let out = render_default("<%= x -%>\r\nend", &locals! { "x" => 1 });
    assert_eq!(out, "1end");
}

#[test]
fn trim_suffix_without_following_newline_is_harmless() {
    let out = render_default("<%= x -%> end", &locals! { "x" => 1 });
    assert_eq!(out, "1 end");
}

// =============================================================================
// Reuse
// =============================================================================

#[test]
fn compiled_template_renders_repeatedly() {
    let template = compile_default("Hello <%= name %>!");
    assert_eq!(template.render(&locals! { "name" => "tobi" }).unwrap(), "Hello tobi!");
    assert_eq!(template.render(&locals! { "name" => "loki" }).unwrap(), "Hello loki!");
}

#[test]
fn scriptlet_globals_do_not_leak_between_renders() {
    let template = compile_default("<% if (typeof seen == \"undefined\") { seen = 0; } seen += 1; %><%= seen %>");
    assert_eq!(template.render(&()).unwrap(), "1");
    assert_eq!(template.render(&()).unwrap(), "1");
}

#[test]
fn templates_render_concurrently() {
    let template = compile_default("<%= n * 2 %>");
    let results: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let template = &template;
                scope.spawn(move || template.render(&locals! { "n" => n }).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(results, vec!["0", "2", "4", "6"]);
}

// =============================================================================
// Script limits
// =============================================================================

#[test]
fn recursive_helper_renders_on_a_small_thread_stack() {
    let out = thread::Builder::new()
        .stack_size(2 << 20)
        .spawn(|| {
            render_default(
                "<% function f(n){ return n==0?0:1+f(n-1); } %><%= f(99) %>",
                &(),
            )
        })
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(out, "99");
}

#[test]
fn deeply_nested_expression_is_a_compile_error() {
    let template = format!("<%= {}1{} %>", "(".repeat(20_000), ")".repeat(20_000));
    let err = render(&template, &(), &CompileOptions::default()).unwrap_err();
    assert!(
        matches!(
            err,
            Error::Compile(CompileError::Script {
                source: ScriptError::Syntax { .. },
                ..
            })
        ),
        "{err}"
    );
}

#[test]
fn oversized_array_is_a_render_error() {
    let template = "<% var a = []; a[10000000000000] = 1; %><%= a.length %>";
    let err = render(template, &(), &CompileOptions::default()).unwrap_err();
    let Error::Render(RenderError::Template { name, message, .. }) = &err else {
        panic!("expected a mapped render error, got {err:?}");
    };
    assert_eq!(name, "RangeError");
    assert_eq!(message, "Invalid array length");

    let template = "<% var a = []; try { a[10000000000000] = 1; } catch (e) { %><%= e.name %><% } %>";
    assert_eq!(render_default(template, &()), "RangeError");
}

#[test]
fn large_and_tiny_numbers_use_exponent_notation() {
    assert_eq!(render_default("<%= 1e21 %> <%= 1e-7 %>", &()), "1e+21 1e-7");
}
