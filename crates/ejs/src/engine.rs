//! Compilation context: default delimiters plus the filter registry.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::codegen::generate;
use crate::error::{CompileError, Error, RenderError};
use crate::filters::FilterRegistry;
use crate::function::FunctionSource;
use crate::options::{CompileOptions, Delimiters};
use crate::parser::{Segment, SegmentKind, parse_template};
use crate::template::Template;

/// The result of [`Engine::compile`].
#[derive(Debug, Clone)]
pub enum Artifact {
    /// An invocable template.
    Function(Template),
    /// Function definition text, produced when `client` is set.
    Source(FunctionSource),
}

impl Artifact {
    /// Render either form with the same locals.
    pub fn render<S: Serialize + ?Sized>(&self, locals: &S) -> Result<String, RenderError> {
        match self {
            Artifact::Function(template) => template.render(locals),
            Artifact::Source(source) => source.call(locals),
        }
    }

    pub fn as_template(&self) -> Option<&Template> {
        match self {
            Artifact::Function(template) => Some(template),
            Artifact::Source(_) => None,
        }
    }

    pub fn as_source(&self) -> Option<&FunctionSource> {
        match self {
            Artifact::Source(source) => Some(source),
            Artifact::Function(_) => None,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Artifact::Function(template) => template.filename(),
            Artifact::Source(source) => source.filename(),
        }
    }
}

/// Holds the defaults consulted when a call leaves options unset.
///
/// Delimiters configured here apply to every later compile until changed
/// or reset. Filter registries are shared with compiled templates, so
/// changing them afterwards only affects templates compiled later.
///
/// # Example
///
/// ```
/// use ejs::{CompileOptions, Engine, locals};
///
/// let mut engine = Engine::new();
/// engine.set_delimiters("{{", "}}").unwrap();
/// let out = engine
///     .render("<p>{{= name }}</p>", &locals! { "name" => "tobi" }, &CompileOptions::default())
///     .unwrap();
/// assert_eq!(out, "<p>tobi</p>");
///
/// engine.reset_delimiters();
/// assert_eq!(engine.delimiters().open(), "<%");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Engine {
    delimiters: Delimiters,
    filters: Arc<FilterRegistry>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Replace the default delimiters.
    pub fn set_delimiters(
        &mut self,
        open: impl Into<String>,
        close: impl Into<String>,
    ) -> Result<(), CompileError> {
        self.delimiters = Delimiters::new(open, close)?;
        Ok(())
    }

    /// Restore `<%` and `%>`.
    pub fn reset_delimiters(&mut self) {
        self.delimiters = Delimiters::default();
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Mutable access for registering custom filters.
    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        Arc::make_mut(&mut self.filters)
    }

    /// Compile a template in the mode selected by `options.client`.
    pub fn compile(&self, template: &str, options: &CompileOptions) -> Result<Artifact, CompileError> {
        if options.client {
            self.compile_to_function_string(template, options)
                .map(Artifact::Source)
        } else {
            self.compile_template(template, options).map(Artifact::Function)
        }
    }

    /// Compile to an invocable template regardless of `options.client`.
    pub fn compile_template(
        &self,
        template: &str,
        options: &CompileOptions,
    ) -> Result<Template, CompileError> {
        let filename = options.filename.as_deref();
        let segments = self.scan(template, options)?;
        let generated = generate(&segments, options.compile_debug);
        debug!(
            filename = ?filename,
            segments = segments.len(),
            lines = generated.lines,
            debug = options.compile_debug,
            "Compiled template"
        );
        Template::build(&generated, template, filename, Arc::clone(&self.filters))
    }

    /// Compile to function definition text regardless of `options.client`.
    pub fn compile_to_function_string(
        &self,
        template: &str,
        options: &CompileOptions,
    ) -> Result<FunctionSource, CompileError> {
        let filename = options.filename.as_deref();
        let segments = self.scan(template, options)?;
        let generated = generate(&segments, options.compile_debug);
        debug!(
            filename = ?filename,
            function = ?options.function_name,
            lines = generated.lines,
            debug = options.compile_debug,
            "Compiled function source"
        );
        FunctionSource::build(
            &generated,
            template,
            filename,
            options.function_name.as_deref(),
            Arc::clone(&self.filters),
        )
    }

    /// Compile and render in one step.
    pub fn render<S: Serialize + ?Sized>(
        &self,
        template: &str,
        locals: &S,
        options: &CompileOptions,
    ) -> Result<String, Error> {
        let artifact = self.compile(template, options)?;
        Ok(artifact.render(locals)?)
    }

    fn scan(&self, template: &str, options: &CompileOptions) -> Result<Vec<Segment>, CompileError> {
        let delimiters = self.resolve_delimiters(options)?;
        let segments = parse_template(template, &delimiters, options.filename.as_deref())?;
        self.check_filters(&segments);
        Ok(segments)
    }

    fn resolve_delimiters(&self, options: &CompileOptions) -> Result<Delimiters, CompileError> {
        match (&options.open, &options.close) {
            (None, None) => Ok(self.delimiters.clone()),
            (open, close) => Delimiters::new(
                open.as_deref().unwrap_or(self.delimiters.open()),
                close.as_deref().unwrap_or(self.delimiters.close()),
            ),
        }
    }

    /// Unknown filters only fail when the tag runs, so flag them early.
    fn check_filters(&self, segments: &[Segment]) {
        for segment in segments {
            if let SegmentKind::FilteredExpression { filters, .. } = &segment.kind {
                for filter in filters.iter().filter(|f| !self.filters.contains(&f.name)) {
                    warn!(
                        filter = %filter.name,
                        line = segment.line,
                        suggestions = ?self.filters.suggestions(&filter.name),
                        "Template references an unknown filter"
                    );
                }
            }
        }
    }
}
