//! Integration tests for evaluating scripts

use std::thread;

use ejs_script::{Interpreter, ScriptError, Value, format_number, parse_program};
use pretty_assertions::assert_eq;

fn eval(source: &str) -> String {
    let program = parse_program(source).unwrap();
    Interpreter::new().run(&program).unwrap().to_string()
}

fn eval_err(source: &str) -> ScriptError {
    let program = parse_program(source).unwrap();
    Interpreter::new().run(&program).unwrap_err()
}

// =============================================================================
// Expressions
// =============================================================================

#[test]
fn test_arithmetic_and_precedence() {
    assert_eq!(eval("return 1 + 2 * 3 - 4 / 2;"), "5");
    assert_eq!(eval("return (1 + 2) * 3;"), "9");
    assert_eq!(eval("return 7 % 3;"), "1");
    assert_eq!(eval("return 0.5 + 0.25;"), "0.75");
}

#[test]
fn test_number_formatting_uses_exponents_at_the_extremes() {
    assert_eq!(format_number(1e21), "1e+21");
    assert_eq!(format_number(-1.5e300), "-1.5e+300");
    assert_eq!(format_number(1e-7), "1e-7");
    assert_eq!(format_number(1.5e-7), "1.5e-7");
    assert_eq!(format_number(1e20), "100000000000000000000");
    assert_eq!(format_number(0.000001), "0.000001");
    assert_eq!(format_number(123.5), "123.5");
    assert_eq!(eval("return String(1e21) + ' ' + 1e-7;"), "1e+21 1e-7");
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval("return 'a' + 1 + 2;"), "a12");
    assert_eq!(eval("return 1 + 2 + 'a';"), "3a");
    assert_eq!(eval("return 'x' + [1, 2];"), "x1,2");
    assert_eq!(eval("return 'v: ' + null + ' ' + undefined;"), "v: null undefined");
}

#[test]
fn test_equality() {
    assert_eq!(eval("return 1 == '1';"), "true");
    assert_eq!(eval("return 1 === '1';"), "false");
    assert_eq!(eval("return null == undefined;"), "true");
    assert_eq!(eval("return null === undefined;"), "false");
    assert_eq!(eval("return 'a' !== 'b';"), "true");
}

#[test]
fn test_logical_operators_return_operands() {
    assert_eq!(eval("return 0 || 'fallback';"), "fallback");
    assert_eq!(eval("return 'x' && 'y';"), "y");
    assert_eq!(eval("return 0 ?? 5;"), "0");
    assert_eq!(eval("return null ?? 5;"), "5");
}

#[test]
fn test_conditional_and_typeof() {
    assert_eq!(eval("return 3 > 2 ? 'yes' : 'no';"), "yes");
    assert_eq!(eval("return typeof missing;"), "undefined");
    assert_eq!(eval("return typeof 'a' + typeof 1 + typeof {};"), "stringnumberobject");
}

#[test]
fn test_update_operators() {
    assert_eq!(eval("var i = 1; var j = i++; return i + ',' + j;"), "2,1");
    assert_eq!(eval("var i = 1; var j = ++i; return i + ',' + j;"), "2,2");
    assert_eq!(eval("var i = 5; i -= 2; i *= 3; return i;"), "9");
}

// =============================================================================
// Statements
// =============================================================================

#[test]
fn test_for_loop() {
    assert_eq!(
        eval("var out = []; for (var i = 0; i < 3; i++) { out.push(i); } return out.join('-');"),
        "0-1-2"
    );
}

#[test]
fn test_for_of_and_for_in() {
    assert_eq!(
        eval("var s = ''; for (const c of ['a', 'b']) { s += c; } return s;"),
        "ab"
    );
    assert_eq!(
        eval("var keys = []; for (var k in {x: 1, y: 2}) keys.push(k); return keys.join();"),
        "x,y"
    );
}

#[test]
fn test_while_with_break_and_continue() {
    assert_eq!(
        eval(
            "var n = 0, total = 0;\n\
             while (true) {\n\
               n++;\n\
               if (n % 2 == 0) continue;\n\
               if (n > 7) break;\n\
               total += n;\n\
             }\n\
             return total;"
        ),
        "16"
    );
}

#[test]
fn test_statements_without_semicolons() {
    assert_eq!(eval("var a = 1\nvar b = 2\nreturn a + b"), "3");
}

#[test]
fn test_try_catch_finally() {
    assert_eq!(
        eval(
            "var log = [];\n\
             try { log.push('a'); throw new Error('boom'); } \
             catch (e) { log.push(e.message); } \
             finally { log.push('done'); }\n\
             return log.join(' ');"
        ),
        "a boom done"
    );
}

#[test]
fn test_with_resolves_object_properties() {
    assert_eq!(
        eval("var locals = {name: 'ejs'}; var out; with (locals) { out = name.toUpperCase(); } return out;"),
        "EJS"
    );
}

#[test]
fn test_let_is_block_scoped() {
    assert_eq!(eval("var x = 1; { let x = 2; } return x;"), "1");
    assert_eq!(eval("{ var y = 3; } return y;"), "3");
}

// =============================================================================
// Functions
// =============================================================================

#[test]
fn test_function_declarations_are_hoisted() {
    assert_eq!(eval("return double(4);\nfunction double(n) { return n * 2; }"), "8");
}

#[test]
fn test_closures_capture_scope() {
    assert_eq!(
        eval(
            "function counter() { var n = 0; return function () { n += 1; return n; }; }\n\
             var next = counter(); next(); next();\n\
             return next();"
        ),
        "3"
    );
}

#[test]
fn test_arrow_functions() {
    assert_eq!(eval("var add = (a, b) => a + b; return add(2, 3);"), "5");
    assert_eq!(eval("return [1, 2, 3].map(n => n * n).join(',');"), "1,4,9");
}

#[test]
fn test_host_functions() {
    let program = parse_program("return greet('world');").unwrap();
    let mut interpreter = Interpreter::new();
    interpreter.define_global(
        "greet",
        Value::native("greet", |args| {
            Ok(Value::String(format!("hello {}", args[0])))
        }),
    );
    assert_eq!(interpreter.run(&program).unwrap().to_string(), "hello world");
}

#[test]
fn test_call_function_value_from_host() {
    let program = parse_program("function shout(s) { return s.toUpperCase() + '!'; }").unwrap();
    let mut interpreter = Interpreter::new();
    interpreter.run(&program).unwrap();
    let shout = interpreter.global("shout").unwrap();
    let result = interpreter.call(&shout, &[Value::from("hi")]).unwrap();
    assert_eq!(result.to_string(), "HI!");
}

#[test]
fn test_globals_persist_between_runs() {
    let mut interpreter = Interpreter::new();
    interpreter.run(&parse_program("var seen = 41;").unwrap()).unwrap();
    interpreter.run(&parse_program("seen++;").unwrap()).unwrap();
    assert_eq!(interpreter.global("seen").unwrap().to_string(), "42");
}

// =============================================================================
// Built-in methods
// =============================================================================

#[test]
fn test_string_methods() {
    assert_eq!(eval("return '  Hi '.trim().toLowerCase();"), "hi");
    assert_eq!(eval("return 'a,b,c'.split(',').length;"), "3");
    assert_eq!(eval("return 'hello'.slice(1, -1);"), "ell");
    assert_eq!(eval("return 'hello'.indexOf('l');"), "2");
    assert_eq!(eval("return 'aXbX'.replace('X', '-');"), "a-bX");
    assert_eq!(eval("return 'ab'.repeat(2);"), "abab");
    assert_eq!(eval("return 'abc'.charAt(1) + 'abc'[2];"), "bc");
}

#[test]
fn test_array_methods() {
    assert_eq!(eval("return [3, 1, 2].sort().join();"), "1,2,3");
    assert_eq!(eval("return [1, 10, 2].sort((a, b) => b - a).join();"), "10,2,1");
    assert_eq!(eval("return [1, 2, 3, 4].filter(n => n % 2 == 0).join();"), "2,4");
    assert_eq!(eval("return [1, 2, 3].reduce((acc, n) => acc + n, 10);"), "16");
    assert_eq!(eval("return [1, 2, 3].indexOf(2) + [1, 2].includes(3);"), "1");
    assert_eq!(eval("return [1, 2, 3].slice(-2).concat([4], 5).join();"), "2,3,4,5");
    assert_eq!(eval("return [{n: 1}, {n: 2}].find(o => o.n == 2).n;"), "2");
}

#[test]
fn test_foreach_visits_in_order() {
    assert_eq!(
        eval("var out = ''; ['a', 'b'].forEach(function (x, i) { out += i + x; }); return out;"),
        "0a1b"
    );
}

#[test]
fn test_global_helpers() {
    assert_eq!(eval("return Math.max(1, 5, 3) + Math.floor(2.7);"), "7");
    assert_eq!(eval("return parseInt('42px') + parseFloat('1.5');"), "43.5");
    assert_eq!(eval("return JSON.stringify({a: [1, 'x'], b: null});"), r#"{"a":[1,"x"],"b":null}"#);
    assert_eq!(eval("return Object.keys({a: 1, b: 2}).join('');"), "ab");
    assert_eq!(eval("return String(12) + Number('3');"), "123");
    assert_eq!(eval("return (2.345).toFixed(1);"), "2.3");
    assert_eq!(eval("return isNaN('abc');"), "true");
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_undefined_identifier_is_reference_error() {
    let ScriptError::Runtime(err) = eval_err("var a = 1;\nreturn missing;") else {
        panic!("expected runtime error");
    };
    assert_eq!(err.name, "ReferenceError");
    assert_eq!(err.message, "missing is not defined");
    assert_eq!(err.line, 2);
}

#[test]
fn test_calling_non_function_is_type_error() {
    let ScriptError::Runtime(err) = eval_err("var filters = {};\nfilters.nope(1);") else {
        panic!("expected runtime error");
    };
    assert_eq!(err.name, "TypeError");
    assert_eq!(err.message, "filters.nope is not a function");
}

#[test]
fn test_property_of_undefined_is_type_error() {
    let ScriptError::Runtime(err) = eval_err("var user;\nreturn user.name;") else {
        panic!("expected runtime error");
    };
    assert_eq!(err.name, "TypeError");
    assert_eq!(
        err.message,
        "Cannot read properties of undefined (reading 'name')"
    );
}

#[test]
fn test_thrown_object_keeps_extra_properties() {
    let ScriptError::Runtime(err) =
        eval_err("var e = new Error('bad'); e.path = 'a.ejs'; throw e;")
    else {
        panic!("expected runtime error");
    };
    assert_eq!(err.name, "Error");
    assert_eq!(err.message, "bad");
    assert_eq!(err.property("path"), Some("a.ejs"));
}

#[test]
fn test_thrown_string() {
    let ScriptError::Runtime(err) = eval_err("throw 'plain';") else {
        panic!("expected runtime error");
    };
    assert_eq!(err.name, "Error");
    assert_eq!(err.message, "plain");
}

#[test]
fn test_runaway_recursion_is_range_error() {
    let program = parse_program("function f() { return f(); }\nf();").unwrap();
    let mut interpreter = Interpreter::new().with_max_depth(16);
    let ScriptError::Runtime(err) = interpreter.run(&program).unwrap_err() else {
        panic!("expected runtime error");
    };
    assert_eq!(err.name, "RangeError");
    assert_eq!(err.message, "Maximum call stack size exceeded");
}

#[test]
fn test_recursion_fits_a_small_thread_stack() {
    let result = thread::Builder::new()
        .stack_size(2 << 20)
        .spawn(|| {
            let program =
                parse_program("function f(n) { return n == 0 ? 0 : 1 + f(n - 1); }\nreturn f(99);")
                    .unwrap();
            Interpreter::new().run(&program).map(|value| value.to_string())
        })
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(result.unwrap(), "99");
}

#[test]
fn test_deep_recursion_is_range_error_not_a_crash() {
    let source = "function f(n) { return n == 0 ? 0 : 1 + f(n - 1); }\nreturn f(100000);";
    let result = thread::Builder::new()
        .stack_size(2 << 20)
        .spawn(move || {
            let program = parse_program(source).unwrap();
            let default_limit = Interpreter::new().run(&program).map(|value| value.to_string());
            let raised_limit = Interpreter::new()
                .with_max_depth(usize::MAX)
                .run(&program)
                .map(|value| value.to_string());
            (default_limit, raised_limit)
        })
        .unwrap()
        .join()
        .unwrap();
    for result in [result.0, result.1] {
        let Err(ScriptError::Runtime(err)) = result else {
            panic!("expected runtime error, got {result:?}");
        };
        assert_eq!(err.name, "RangeError");
        assert_eq!(err.message, "Maximum call stack size exceeded");
    }
}

#[test]
fn test_recursion_error_is_catchable() {
    assert_eq!(
        eval("function f() { return f(); }\ntry { f(); } catch (e) { return e.name; }"),
        "RangeError"
    );
    // Evaluation continues normally afterwards.
    assert_eq!(
        eval("function f() { return f(); }\ntry { f(); } catch (e) {}\nfunction g(n) { return n ? g(n - 1) : 'ok'; }\nreturn g(50);"),
        "ok"
    );
}

#[test]
fn test_oversized_array_is_range_error() {
    for source in [
        "var a = [];\na[10000000000000] = 1;",
        "var a = [];\na.length = 4294967296;",
        "var a = [];\na.length = -1;",
    ] {
        let ScriptError::Runtime(err) = eval_err(source) else {
            panic!("expected runtime error");
        };
        assert_eq!(err.name, "RangeError");
        assert_eq!(err.message, "Invalid array length");
        assert_eq!(err.line, 2);
    }
    assert_eq!(
        eval("var a = [];\ntry { a[1e13] = 1; } catch (e) { return e.message + ' ' + a.length; }"),
        "Invalid array length 0"
    );
    assert_eq!(eval("var a = [1, 2, 3]; a.length = 1; a[3] = 4; return a.join();"), "1,,,4");
}

#[test]
fn test_oversized_repeat_is_range_error() {
    let ScriptError::Runtime(err) = eval_err("return 'ab'.repeat(1e15);") else {
        panic!("expected runtime error");
    };
    assert_eq!(err.name, "RangeError");
    assert_eq!(err.message, "Invalid string length");
    let ScriptError::Runtime(err) = eval_err("return 'ab'.repeat(-1);") else {
        panic!("expected runtime error");
    };
    assert_eq!(err.message, "Invalid count value: -1");
    assert_eq!(eval("return 'ab'.repeat(0) + 'x'.repeat(2.5);"), "xx");
}

#[test]
fn test_self_containing_array_converts_without_recursing() {
    assert_eq!(eval("var a = [1]; a.push(a); return String(a) + '|' + a.join('-');"), "1,|1-");
    assert_eq!(
        eval("var a = []; for (var i = 0; i < 2000; i++) { a = [a]; } return String(a).length;"),
        "0"
    );
}

#[test]
fn test_stringify_of_circular_structure_is_type_error() {
    let ScriptError::Runtime(err) = eval_err("var o = {}; o.list = [o]; JSON.stringify(o);") else {
        panic!("expected runtime error");
    };
    assert_eq!(err.name, "TypeError");
    assert_eq!(err.message, "Converting circular structure to JSON");
    // Shared but acyclic references are fine.
    assert_eq!(
        eval("var x = [1]; return JSON.stringify({a: x, b: [x, x]});"),
        r#"{"a":[1],"b":[[1],[1]]}"#
    );
}

#[test]
fn test_assignment_to_const_fails() {
    let ScriptError::Runtime(err) = eval_err("const a = 1;\na = 2;") else {
        panic!("expected runtime error");
    };
    assert_eq!(err.name, "TypeError");
    assert_eq!(err.line, 2);
}

#[test]
fn test_syntax_error_reports_line() {
    let err = parse_program("var a = 1;\nvar = 2;").unwrap_err();
    assert!(matches!(err, ScriptError::Syntax { line: 2, .. }));
}
