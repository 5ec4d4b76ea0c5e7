//! Program execution
//!
//! Rendering walks a compiled [`Program`](super::program::Program) with an
//! explicit buffer stack. Sections capture into their own buffer; layouts
//! render after the child finishes, pulling captured sections via `yield`.

use std::collections::HashMap;

use serde_json::{Map, Value as Json};

use super::compiler::CONTENT_SECTION;
use super::expr;
use super::program::Op;
use super::{CompilationError, View};

/// Runaway guard for `@while`: the expression language has no assignment,
/// so an unbounded loop can never terminate on its own.
const WHILE_LIMIT: usize = 10_000;

/// Maximum template nesting through `@include` and `@extends`. A template
/// that includes itself (directly or through a cycle) would otherwise
/// recurse without bound.
const NESTING_LIMIT: usize = 64;

/// Mutable rendering state shared across a template and its layout chain.
#[derive(Default)]
pub(crate) struct RenderState {
    sections: HashMap<String, String>,
    section_stack: Vec<String>,
    layout_stack: Vec<String>,
    buffers: Vec<String>,
    depth: usize,
}

impl RenderState {
    fn write(&mut self, text: &str) {
        if let Some(buffer) = self.buffers.last_mut() {
            buffer.push_str(text);
        }
    }
}

pub(crate) struct Renderer<'v> {
    pub views: &'v View,
}

impl Renderer<'_> {
    /// Render one template by name into a string.
    ///
    /// The buffer and section stacks are restored to their entry depth on
    /// failure, so an error inside an include cannot corrupt the caller's
    /// capture state.
    pub fn render(
        &self,
        name: &str,
        mut scope: Map<String, Json>,
        state: &mut RenderState,
    ) -> Result<String, CompilationError> {
        if state.depth >= NESTING_LIMIT {
            return Err(CompilationError::NestingLimit {
                limit: NESTING_LIMIT,
            });
        }

        let path = self.views.find_template(name)?;
        let compiled = self.views.compiler().compile(&path)?;
        let program = self.views.compiler().load(&compiled)?;

        let buffer_depth = state.buffers.len();
        let section_depth = state.section_stack.len();
        state.buffers.push(String::new());
        state.depth += 1;

        let result = match self.execute(&program.ops, &mut scope, state) {
            Ok(()) => Ok(state.buffers.pop().unwrap_or_default()),
            Err(e) => {
                state.buffers.truncate(buffer_depth);
                state.section_stack.truncate(section_depth);
                Err(e)
            }
        };
        state.depth -= 1;
        result
    }

    fn execute(
        &self,
        ops: &[Op],
        scope: &mut Map<String, Json>,
        state: &mut RenderState,
    ) -> Result<(), CompilationError> {
        for op in ops {
            match op {
                Op::Literal(text) => state.write(text),
                Op::Echo { expr, raw } => {
                    let value = self.eval(expr, scope)?;
                    let text = expr::stringify(&value);
                    if *raw {
                        state.write(&text);
                    } else {
                        state.write(&escape(&text));
                    }
                }
                Op::Extends { view } => state.layout_stack.push(view.clone()),
                Op::StartSection { name } => {
                    state.section_stack.push(name.clone());
                    state.buffers.push(String::new());
                }
                Op::StopSection => self.stop_section(scope, state)?,
                Op::Yield { name } => {
                    let content = state.sections.get(name).cloned().unwrap_or_default();
                    state.write(&content);
                }
                Op::Include { view, data } => {
                    let merged = self.include_scope(scope, data.as_deref())?;
                    let rendered = self.render(view, merged, state)?;
                    state.write(&rendered);
                }
                Op::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = false;
                    for branch in branches {
                        if expr::truthy(&self.eval(&branch.cond, scope)?) {
                            self.execute(&branch.body, scope, state)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        if let Some(body) = otherwise {
                            self.execute(body, scope, state)?;
                        }
                    }
                }
                Op::Foreach { var, expr, body } => {
                    let items = match self.eval(expr, scope)? {
                        Json::Array(items) => items,
                        Json::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
                        Json::Null => Vec::new(),
                        other => {
                            return Err(CompilationError::BadExpression {
                                expr: expr.clone(),
                                reason: format!("cannot iterate {}", type_name(&other)),
                            })
                        }
                    };
                    self.run_loop(var, items, body, scope, state)?;
                }
                Op::For {
                    var,
                    from,
                    to,
                    body,
                } => {
                    let from = self.eval_int(from, scope)?;
                    let to = self.eval_int(to, scope)?;
                    let items = (from..to).map(Json::from).collect();
                    self.run_loop(var, items, body, scope, state)?;
                }
                Op::While { cond, body } => {
                    let mut iterations = 0usize;
                    while expr::truthy(&self.eval(cond, scope)?) {
                        iterations += 1;
                        if iterations > WHILE_LIMIT {
                            return Err(CompilationError::LoopLimit { limit: WHILE_LIMIT });
                        }
                        self.execute(body, scope, state)?;
                    }
                }
                Op::MethodField { verb } => {
                    state.write(&format!(
                        "<input type=\"hidden\" name=\"_method\" value=\"{}\">",
                        escape(verb)
                    ));
                }
                Op::CsrfField => {
                    let token = self
                        .views
                        .session()
                        .map(|s| s.token())
                        .unwrap_or_default();
                    state.write(&format!(
                        "<input type=\"hidden\" name=\"_token\" value=\"{}\">",
                        escape(&token)
                    ));
                }
            }
        }
        Ok(())
    }

    /// Close the innermost section. Closing the implicit content section of
    /// an extending template triggers its layout.
    fn stop_section(
        &self,
        scope: &mut Map<String, Json>,
        state: &mut RenderState,
    ) -> Result<(), CompilationError> {
        let Some(name) = state.section_stack.pop() else {
            return Err(CompilationError::SectionUnderflow);
        };
        let content = match state.buffers.pop() {
            Some(content) => content,
            None => return Err(CompilationError::SectionUnderflow),
        };
        state.sections.insert(name.clone(), content);

        if name == CONTENT_SECTION {
            if let Some(layout) = state.layout_stack.pop() {
                let rendered = self.render(&layout, scope.clone(), state)?;
                state.write(&rendered);
            }
        }
        Ok(())
    }

    fn include_scope(
        &self,
        scope: &Map<String, Json>,
        data: Option<&str>,
    ) -> Result<Map<String, Json>, CompilationError> {
        let mut merged = scope.clone();
        if let Some(source) = data {
            match self.eval(source, scope)? {
                Json::Object(extra) => merged.extend(extra),
                Json::Null => {}
                other => {
                    return Err(CompilationError::BadExpression {
                        expr: source.to_string(),
                        reason: format!("include data must be an object, got {}", type_name(&other)),
                    })
                }
            }
        }
        Ok(merged)
    }

    fn run_loop(
        &self,
        var: &str,
        items: Vec<Json>,
        body: &[Op],
        scope: &mut Map<String, Json>,
        state: &mut RenderState,
    ) -> Result<(), CompilationError> {
        let shadowed = scope.get(var).cloned();
        for item in items {
            scope.insert(var.to_string(), item);
            self.execute(body, scope, state)?;
        }
        match shadowed {
            Some(original) => scope.insert(var.to_string(), original),
            None => scope.remove(var),
        };
        Ok(())
    }

    fn eval(&self, source: &str, scope: &Map<String, Json>) -> Result<Json, CompilationError> {
        let expr = expr::parse(source)?;
        Ok(expr::eval(&expr, scope))
    }

    fn eval_int(&self, source: &str, scope: &Map<String, Json>) -> Result<i64, CompilationError> {
        match self.eval(source, scope)? {
            Json::Number(n) => {
                n.as_f64()
                    .map(|f| f as i64)
                    .ok_or_else(|| CompilationError::BadExpression {
                        expr: source.to_string(),
                        reason: "range bound is not a finite number".to_string(),
                    })
            }
            other => Err(CompilationError::BadExpression {
                expr: source.to_string(),
                reason: format!("range bound must be a number, got {}", type_name(&other)),
            }),
        }
    }
}

/// HTML-escape like `htmlspecialchars` with quote escaping enabled.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

fn type_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_covers_quotes() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;"
        );
    }
}
