//! A single registered route
//!
//! Routes are immutable once registration finishes: a successful match
//! produces a [`RouteMatch`](super::RouteMatch) pair instead of writing the
//! bound parameters back onto the route, so a route object can be shared
//! across concurrently handled requests.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::container::Callable;

/// Failure to compile a route's URI template into a matcher.
#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("Invalid pattern for route '{uri}': {reason}")]
    InvalidPattern { uri: String, reason: String },
}

/// A registered mapping from an HTTP method and URI pattern to an action.
pub struct Route {
    method: String,
    uri: String,
    action: Callable,
    middleware: Vec<String>,
    wheres: Vec<(String, String)>,
    pattern: OnceLock<Result<Regex, RoutingError>>,
}

impl Route {
    pub fn new(method: &str, uri: &str, action: Callable) -> Self {
        Self {
            method: method.to_uppercase(),
            uri: uri.trim_matches('/').to_string(),
            action,
            middleware: Vec::new(),
            wheres: Vec::new(),
            pattern: OnceLock::new(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn action(&self) -> &Callable {
        &self.action
    }

    /// Middleware names attached to this route, in attachment order.
    pub fn middleware_names(&self) -> &[String] {
        &self.middleware
    }

    /// Append middleware names to the route.
    pub fn middleware(&mut self, names: &[&str]) -> &mut Self {
        self.middleware.extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Set a regex constraint on a route parameter.
    ///
    /// Replaces the parameter's default `[^/]+` capture group.
    pub fn where_param(&mut self, name: &str, pattern: &str) -> &mut Self {
        self.wheres.push((name.to_string(), pattern.to_string()));
        self
    }

    /// Compile the URI template into an anchored regex matcher.
    ///
    /// Each `{name}` placeholder becomes a named capture group matching
    /// one-or-more non-slash characters unless a `where_param` constraint
    /// overrides it. Literal segments are escaped. Compiled once, lazily.
    fn regex(&self) -> Result<&Regex, RoutingError> {
        let compiled = self.pattern.get_or_init(|| self.build_regex());
        match compiled {
            Ok(re) => Ok(re),
            Err(e) => Err(e.clone()),
        }
    }

    fn build_regex(&self) -> Result<Regex, RoutingError> {
        let constraints: HashMap<&str, &str> = self
            .wheres
            .iter()
            .map(|(name, pattern)| (name.as_str(), pattern.as_str()))
            .collect();

        let mut pattern = String::from("^");
        let mut rest = self.uri.as_str();
        while let Some(open) = rest.find('{') {
            pattern.push_str(&regex::escape(&rest[..open]));
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_placeholder_name(&after[..close]) => {
                    let name = &after[..close];
                    let group = constraints.get(name).copied().unwrap_or("[^/]+");
                    pattern.push_str(&format!("(?P<{}>{})", name, group));
                    rest = &after[close + 1..];
                }
                // A brace that is not a placeholder stays literal text.
                _ => {
                    pattern.push_str(&regex::escape("{"));
                    rest = after;
                }
            }
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push('$');

        Regex::new(&pattern).map_err(|e| RoutingError::InvalidPattern {
            uri: self.uri.clone(),
            reason: e.to_string(),
        })
    }

    /// Match a slash-trimmed request path against this route.
    ///
    /// Returns the named-capture bindings on success; unnamed groups from
    /// constraint fragments are discarded.
    pub fn matches(&self, path: &str) -> Result<Option<HashMap<String, String>>, RoutingError> {
        let re = self.regex()?;
        let path = path.trim_matches('/');
        let Some(captures) = re.captures(path) else {
            return Ok(None);
        };

        let mut params = HashMap::new();
        for name in re.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                params.insert(name.to_string(), m.as_str().to_string());
            }
        }
        Ok(Some(params))
    }
}

fn is_placeholder_name(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}
