//! Route registration with group support
//!
//! The router is the write-side API: verb methods append routes to an
//! ordered [`RouteCollection`], and `group` pushes shared attributes
//! (URI prefix, middleware) onto a stack that every route registered
//! inside the group inherits.

use super::collection::RouteCollection;
use super::route::Route;
use crate::container::Callable;

/// Attributes shared by every route registered inside a group.
#[derive(Clone, Default)]
pub struct GroupAttributes {
    prefix: Option<String>,
    middleware: Vec<String>,
}

impl GroupAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.trim_matches('/').to_string());
        self
    }

    pub fn middleware(mut self, names: &[&str]) -> Self {
        self.middleware.extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Merge these attributes under an enclosing group: prefixes concatenate
    /// with a slash, middleware lists extend (outer first).
    fn merge_under(&self, outer: &GroupAttributes) -> GroupAttributes {
        let prefix = match (&outer.prefix, &self.prefix) {
            (Some(a), Some(b)) => Some(format!("{}/{}", a, b)),
            (Some(a), None) => Some(a.clone()),
            (None, b) => b.clone(),
        };
        let mut middleware = outer.middleware.clone();
        middleware.extend(self.middleware.iter().cloned());
        GroupAttributes { prefix, middleware }
    }
}

/// Registers routes and hands out [`RouteRegistrar`]s for per-route tuning.
#[derive(Default)]
pub struct Router {
    routes: RouteCollection,
    group_stack: Vec<GroupAttributes>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, uri: &str, action: Callable) -> RouteRegistrar<'_> {
        self.add_route("GET", uri, action)
    }

    pub fn post(&mut self, uri: &str, action: Callable) -> RouteRegistrar<'_> {
        self.add_route("POST", uri, action)
    }

    pub fn put(&mut self, uri: &str, action: Callable) -> RouteRegistrar<'_> {
        self.add_route("PUT", uri, action)
    }

    pub fn patch(&mut self, uri: &str, action: Callable) -> RouteRegistrar<'_> {
        self.add_route("PATCH", uri, action)
    }

    pub fn delete(&mut self, uri: &str, action: Callable) -> RouteRegistrar<'_> {
        self.add_route("DELETE", uri, action)
    }

    /// Register routes under shared attributes.
    ///
    /// Groups nest: the callback sees a router whose stack carries the merged
    /// attributes of every enclosing group, and the stack is popped when the
    /// callback returns.
    pub fn group<F>(&mut self, attributes: GroupAttributes, register: F)
    where
        F: FnOnce(&mut Router),
    {
        let merged = match self.group_stack.last() {
            Some(outer) => attributes.merge_under(outer),
            None => attributes,
        };
        self.group_stack.push(merged);
        register(self);
        self.group_stack.pop();
    }

    fn add_route(&mut self, method: &str, uri: &str, action: Callable) -> RouteRegistrar<'_> {
        let uri = self.prefixed(uri);
        let mut route = Route::new(method, &uri, action);
        if let Some(group) = self.group_stack.last() {
            let names: Vec<&str> = group.middleware.iter().map(String::as_str).collect();
            route.middleware(&names);
        }
        let method = route.method().to_string();
        let index = self.routes.add(route);
        RouteRegistrar {
            router: self,
            method,
            index,
        }
    }

    fn prefixed(&self, uri: &str) -> String {
        let uri = uri.trim_matches('/');
        match self.group_stack.last().and_then(|g| g.prefix.as_deref()) {
            Some(prefix) if uri.is_empty() => prefix.to_string(),
            Some(prefix) => format!("{}/{}", prefix, uri),
            None => uri.to_string(),
        }
    }

    pub fn routes(&self) -> &RouteCollection {
        &self.routes
    }

    pub fn into_routes(self) -> RouteCollection {
        self.routes
    }
}

/// Fluent handle onto a just-registered route.
pub struct RouteRegistrar<'r> {
    router: &'r mut Router,
    method: String,
    index: usize,
}

impl RouteRegistrar<'_> {
    /// Append middleware names to the route (after any group middleware).
    pub fn middleware(self, names: &[&str]) -> Self {
        if let Some(route) = self.router.routes.route_mut(&self.method, self.index) {
            route.middleware(names);
        }
        self
    }

    /// Constrain a route parameter with a regex fragment.
    pub fn where_param(self, name: &str, pattern: &str) -> Self {
        if let Some(route) = self.router.routes.route_mut(&self.method, self.index) {
            route.where_param(name, pattern);
        }
        self
    }
}
