//! Template engine
//!
//! Blade-style templates (`*.blade.html`) compiled to cached instruction
//! programs and rendered against JSON view data. Dot-notation view names
//! map onto the configured template directories.

mod compiler;
mod expr;
mod program;
mod renderer;

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value as Json};
use thiserror::Error;

use crate::config::ViewConfig;
use crate::session::Session;

pub use compiler::Compiler;
pub use program::{Branch, Op, Program};

use renderer::{RenderState, Renderer};

/// Errors raised while compiling or rendering templates.
#[derive(Debug, Error)]
pub enum CompilationError {
    #[error("Cannot stop a section without first starting one.")]
    SectionUnderflow,

    #[error("Unbalanced @{directive} directive")]
    Unbalanced { directive: String },

    #[error("View [{view}] not found.")]
    ViewNotFound { view: String },

    // The field is `expr`, not `source`: thiserror reserves a `source`
    // field for error chaining.
    #[error("Invalid expression '{expr}': {reason}")]
    BadExpression { expr: String, reason: String },

    #[error("View data must be a JSON object")]
    InvalidData,

    #[error("Template I/O error for {path}: {message}")]
    Io { path: String, message: String },

    #[error("Corrupt compiled template at {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("@while exceeded {limit} iterations")]
    LoopLimit { limit: usize },

    #[error("Template nesting exceeded {limit} levels")]
    NestingLimit { limit: usize },
}

/// The view factory: finds templates, keeps the compiler, renders by name.
pub struct View {
    paths: Vec<PathBuf>,
    extension: String,
    compiler: Compiler,
    session: Option<Arc<Session>>,
}

impl View {
    pub fn new(config: &ViewConfig) -> Result<Self, CompilationError> {
        Ok(Self {
            paths: config.paths.iter().map(PathBuf::from).collect(),
            extension: config.extension.clone(),
            compiler: Compiler::new(&config.compiled)?,
            session: None,
        })
    }

    /// Attach a session so `@csrf` can embed its token.
    pub fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// Render `name` (dot notation, e.g. `users.show`) with `data`, which
    /// must be a JSON object or null.
    pub fn make(&self, name: &str, data: Json) -> Result<String, CompilationError> {
        let scope = match data {
            Json::Object(map) => map,
            Json::Null => Map::new(),
            _ => return Err(CompilationError::InvalidData),
        };
        let mut state = RenderState::default();
        Renderer { views: self }.render(name, scope, &mut state)
    }

    /// Whether a template exists for the given view name.
    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub(crate) fn find_template(&self, name: &str) -> Result<PathBuf, CompilationError> {
        self.resolve(name)
            .ok_or_else(|| CompilationError::ViewNotFound {
                view: name.to_string(),
            })
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = format!("{}.{}", name.replace('.', "/"), self.extension);
        self.paths
            .iter()
            .map(|base| base.join(&relative))
            .find(|candidate| candidate.is_file())
    }

    pub(crate) fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub(crate) fn session(&self) -> Option<&Session> {
        self.session.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn factory(templates: &[(&str, &str)]) -> (TempDir, View) {
        let dir = TempDir::new().unwrap();
        let views_dir = dir.path().join("views");
        for (name, body) in templates {
            let path = views_dir.join(format!("{}.blade.html", name.replace('.', "/")));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, body).unwrap();
        }
        let config = ViewConfig::new(
            vec![views_dir.display().to_string()],
            dir.path().join("compiled").display().to_string(),
        );
        let view = View::new(&config).unwrap();
        (dir, view)
    }

    #[test]
    fn test_escaped_and_raw_echo() {
        let (_dir, views) = factory(&[("page", "{{ content }}|{!! content !!}")]);
        let html = views
            .make("page", json!({"content": "<b>hi</b>"}))
            .unwrap();
        assert_eq!(html, "&lt;b&gt;hi&lt;/b&gt;|<b>hi</b>");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let (_dir, views) = factory(&[("page", "[{{ ghost }}]")]);
        assert_eq!(views.make("page", json!({})).unwrap(), "[]");
    }

    #[test]
    fn test_conditionals_and_loops() {
        let (_dir, views) = factory(&[(
            "list",
            "@if (title){{ title }}: @endif@foreach (item in items){{ item }},@endforeach",
        )]);
        let html = views
            .make("list", json!({"title": "Fruit", "items": ["a", "b"]}))
            .unwrap();
        assert_eq!(html, "Fruit: a,b,");

        let html = views.make("list", json!({"items": []})).unwrap();
        assert_eq!(html, "");
    }

    #[test]
    fn test_for_range_is_end_exclusive() {
        let (_dir, views) = factory(&[("count", "@for (i in 0..3){{ i }}@endfor")]);
        assert_eq!(views.make("count", json!({})).unwrap(), "012");
    }

    #[test]
    fn test_layout_sections_and_yield() {
        let (_dir, views) = factory(&[
            (
                "layouts.app",
                "<title>@yield('title')</title><main>@yield('content')</main>",
            ),
            (
                "home",
                "@extends('layouts.app')@section('title')Home@endsection@section('content')<p>Welcome</p>@endsection",
            ),
        ]);
        let html = views.make("home", json!({})).unwrap();
        assert_eq!(html, "<title>Home</title><main><p>Welcome</p></main>");
    }

    #[test]
    fn test_layout_receives_child_body_as_content_section() {
        let (_dir, views) = factory(&[
            ("layouts.bare", "[@yield('__content')]"),
            ("note", "@extends('layouts.bare')body text"),
        ]);
        assert_eq!(views.make("note", json!({})).unwrap(), "[body text]");
    }

    #[test]
    fn test_include_inherits_and_overrides_scope() {
        let (_dir, views) = factory(&[
            ("partials.badge", "<span>{{ label }}</span>"),
            ("page", "{{ label }}@include('partials.badge', override)"),
        ]);
        let html = views
            .make(
                "page",
                json!({"label": "outer", "override": {"label": "inner"}}),
            )
            .unwrap();
        assert_eq!(html, "outer<span>inner</span>");
    }

    #[test]
    fn test_stray_endsection_is_reported() {
        let (_dir, views) = factory(&[("broken", "text@endsection")]);
        let err = views.make("broken", json!({})).unwrap_err();
        assert!(matches!(err, CompilationError::SectionUnderflow));
    }

    #[test]
    fn test_unknown_view_is_reported_by_name() {
        let (_dir, views) = factory(&[]);
        let err = views.make("missing.page", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "View [missing.page] not found.");
    }

    #[test]
    fn test_self_including_template_is_rejected() {
        let (_dir, views) = factory(&[("recurse", "x@include('recurse')")]);
        let err = views.make("recurse", json!({})).unwrap_err();
        assert!(matches!(err, CompilationError::NestingLimit { .. }));
    }

    #[test]
    fn test_mutual_include_cycle_is_rejected() {
        let (_dir, views) = factory(&[
            ("cycle.a", "a@include('cycle.b')"),
            ("cycle.b", "b@include('cycle.a')"),
        ]);
        let err = views.make("cycle.a", json!({})).unwrap_err();
        assert!(matches!(err, CompilationError::NestingLimit { .. }));
    }

    #[test]
    fn test_while_loop_cap_prevents_runaway() {
        let (_dir, views) = factory(&[("spin", "@while (true)x@endwhile")]);
        let err = views.make("spin", json!({})).unwrap_err();
        assert!(matches!(err, CompilationError::LoopLimit { .. }));
    }

    #[test]
    fn test_csrf_field_uses_session_token() {
        let (_dir, views) = factory(&[("form", "<form>@csrf</form>")]);
        let session = Arc::new(Session::new());
        let token = session.token();
        let views = views.with_session(session);
        let html = views.make("form", json!({})).unwrap();
        assert!(html.contains(&format!("name=\"_token\" value=\"{}\"", token)));
    }

    #[test]
    fn test_method_field_renders_spoof_input() {
        let (_dir, views) = factory(&[("form", "@method('delete')")]);
        let html = views.make("form", json!({})).unwrap();
        assert_eq!(
            html,
            "<input type=\"hidden\" name=\"_method\" value=\"DELETE\">"
        );
    }
}
