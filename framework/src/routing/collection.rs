//! Ordered route storage and lookup

use std::collections::HashMap;

use super::route::{Route, RoutingError};

/// A successful match: the winning route plus its extracted parameters.
///
/// The parameters live on the match, never on the route, so matching is a
/// read-only operation.
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: HashMap<String, String>,
}

/// Registered routes grouped by HTTP method, preserving registration order
/// within each method.
#[derive(Default)]
pub struct RouteCollection {
    routes: HashMap<String, Vec<Route>>,
}

impl RouteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Returns its position within its method bucket so a
    /// registrar can keep configuring it.
    pub fn add(&mut self, route: Route) -> usize {
        let bucket = self.routes.entry(route.method().to_string()).or_default();
        bucket.push(route);
        bucket.len() - 1
    }

    pub(crate) fn route_mut(&mut self, method: &str, index: usize) -> Option<&mut Route> {
        self.routes.get_mut(method)?.get_mut(index)
    }

    /// Find the first route registered for `method` that matches `path`.
    ///
    /// Earlier registrations win; a later, more specific route shadowed by an
    /// earlier pattern is never consulted.
    pub fn match_route(
        &self,
        method: &str,
        path: &str,
    ) -> Result<Option<RouteMatch<'_>>, RoutingError> {
        let Some(bucket) = self.routes.get(&method.to_uppercase()) else {
            return Ok(None);
        };
        for route in bucket {
            if let Some(params) = route.matches(path)? {
                return Ok(Some(RouteMatch { route, params }));
            }
        }
        Ok(None)
    }

    /// All registered routes, keyed by method.
    pub fn all(&self) -> &HashMap<String, Vec<Route>> {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.values().all(Vec::is_empty)
    }
}
