//! HTTP kernel
//!
//! Owns the request lifecycle: match a route, expand its middleware names
//! through the kernel's group and alias tables, pipe the request through the
//! expanded chain, and dispatch the route action through the container.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use super::pipeline::{Pipe, Pipeline};
use super::request::Request;
use super::response::HttpResponse;
use crate::container::{value, value_as, Container, Params};
use crate::error::FrameworkError;
use crate::routing::{Route, Router};

/// The front controller for HTTP traffic.
pub struct Kernel {
    container: Arc<Container>,
    router: Router,
    /// Middleware class names run on every request, in order.
    middleware: Vec<String>,
    /// Named bundles expanded in place when a route references them.
    middleware_groups: HashMap<String, Vec<String>>,
    /// Short aliases for single middleware classes.
    route_middleware: HashMap<String, String>,
}

impl Kernel {
    pub fn new(container: Arc<Container>, router: Router) -> Self {
        Self {
            container,
            router,
            middleware: Vec::new(),
            middleware_groups: HashMap::new(),
            route_middleware: HashMap::new(),
        }
    }

    /// Middleware applied to every request, outermost first.
    pub fn global_middleware(mut self, names: &[&str]) -> Self {
        self.middleware.extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Define a named middleware group (e.g. `web`, `api`).
    pub fn middleware_group(mut self, name: &str, members: &[&str]) -> Self {
        self.middleware_groups
            .insert(name.to_string(), members.iter().map(|m| m.to_string()).collect());
        self
    }

    /// Alias a short name to a middleware class.
    pub fn route_alias(mut self, name: &str, class: &str) -> Self {
        self.route_middleware
            .insert(name.to_string(), class.to_string());
        self
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handle one request from match to response.
    ///
    /// An unmatched path is answered locally with a 404 and never enters the
    /// middleware pipeline, so no middleware side effects fire for it.
    pub fn handle(&self, request: Request) -> Result<HttpResponse, FrameworkError> {
        let matched = self
            .router
            .routes()
            .match_route(request.method(), request.path())?;

        let Some(matched) = matched else {
            debug!(method = request.method(), path = request.path(), "no route matched");
            return Ok(HttpResponse::html("Not Found").status(404));
        };

        let route = matched.route;
        let route_params = matched.params;
        debug!(
            method = request.method(),
            path = request.path(),
            uri = route.uri(),
            "route matched"
        );

        let pipes: Vec<Pipe> = self
            .gather_route_middleware(route)
            .into_iter()
            .map(Pipe::Class)
            .collect();

        let container = self.container.as_ref();
        Pipeline::new(container)
            .send(request)
            .through(pipes)
            .then(move |request| {
                let mut params = Params::new();
                for (name, raw) in &route_params {
                    params.insert(name.clone(), value(raw.clone()));
                }
                params.insert("request".to_string(), value(request));

                let result = container.call(route.action(), params)?;
                let response = value_as::<HttpResponse>(&result, "route action")?;
                Ok(response.as_ref().clone())
            })
    }

    /// Expand a route's middleware names into a concrete, ordered chain.
    ///
    /// Globals come first; each route name is then expanded as a group, an
    /// alias, or taken literally as a class name. Duplicates keep their first
    /// occurrence.
    fn gather_route_middleware(&self, route: &Route) -> Vec<String> {
        let mut names = self.middleware.clone();
        for name in route.middleware_names() {
            if let Some(group) = self.middleware_groups.get(name) {
                names.extend(group.iter().cloned());
            } else if let Some(class) = self.route_middleware.get(name) {
                names.push(class.clone());
            } else {
                names.push(name.clone());
            }
        }

        let mut seen = HashSet::new();
        names.retain(|name| seen.insert(name.clone()));
        names
    }

    /// Post-response hook. Runs after the response is written; failures here
    /// must not affect the already-sent response.
    pub fn terminate(&self, request: &Request, response: &HttpResponse) {
        debug!(
            method = request.method(),
            path = request.path(),
            status = response.status_code(),
            "request handled"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::container::{Callable, ClassDef, ClosureDef, Concrete, ParamDef};
    use crate::http::pipeline::{middleware_value, Middleware, Next};
    use crate::http::response::Response;

    struct TagMiddleware {
        tag: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl Middleware for TagMiddleware {
        fn handle(&self, request: Request, next: Next<'_>) -> Response {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = next.run(request)?;
            Ok(response.header(&format!("X-{}", self.tag), "on"))
        }
    }

    struct RejectMiddleware;

    impl Middleware for RejectMiddleware {
        fn handle(&self, _request: Request, _next: Next<'_>) -> Response {
            Ok(HttpResponse::text("blocked").status(401))
        }
    }

    fn register_middleware(
        container: &Container,
        name: &str,
        instance: Arc<dyn Middleware>,
    ) {
        let stored = middleware_value(instance);
        container.singleton(
            name,
            Concrete::factory(move |_| Ok(stored.clone())),
        );
    }

    fn hello_action() -> Callable {
        Callable::closure(ClosureDef::new(|_, _| {
            Ok(value(HttpResponse::text("hello")))
        }))
    }

    fn kernel_with(
        container: Arc<Container>,
        configure: impl FnOnce(&mut Router),
    ) -> Kernel {
        let mut router = Router::new();
        configure(&mut router);
        Kernel::new(container, router)
    }

    #[test]
    fn test_unmatched_path_gets_local_404_without_middleware() {
        let container = Arc::new(Container::new());
        let calls = Arc::new(AtomicUsize::new(0));
        register_middleware(
            &container,
            "Counter",
            Arc::new(TagMiddleware { tag: "c", calls: calls.clone() }),
        );

        let kernel = kernel_with(container.clone(), |r| {
            r.get("/exists", hello_action());
        })
        .global_middleware(&["Counter"]);

        let response = kernel.handle(Request::new("GET", "/missing")).unwrap();
        assert_eq!(response.status_code(), 404);
        assert_eq!(response.body(), "Not Found");
        assert_eq!(
            response.header_value("Content-Type"),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_global_then_group_then_literal_with_dedup() {
        let container = Arc::new(Container::new());
        let calls = Arc::new(AtomicUsize::new(0));
        for name in ["A", "B", "C"] {
            register_middleware(
                &container,
                name,
                Arc::new(TagMiddleware { tag: name, calls: calls.clone() }),
            );
        }

        let kernel = kernel_with(container.clone(), |r| {
            r.get("/page", hello_action()).middleware(&["web", "B"]);
        })
        .global_middleware(&["A"])
        .middleware_group("web", &["B", "C"]);

        let route = kernel
            .router()
            .routes()
            .match_route("GET", "page")
            .unwrap()
            .unwrap();
        // Literal B after the group expansion dedups to first occurrence.
        assert_eq!(kernel.gather_route_middleware(route.route), ["A", "B", "C"]);

        let response = kernel.handle(Request::new("GET", "/page")).unwrap();
        assert_eq!(response.body(), "hello");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(response.header_value("X-A"), Some("on"));
        assert_eq!(response.header_value("X-B"), Some("on"));
        assert_eq!(response.header_value("X-C"), Some("on"));
    }

    #[test]
    fn test_alias_expands_to_class() {
        let container = Arc::new(Container::new());
        register_middleware(&container, "Auth", Arc::new(RejectMiddleware));

        let kernel = kernel_with(container.clone(), |r| {
            r.get("/secret", hello_action()).middleware(&["auth"]);
        })
        .route_alias("auth", "Auth");

        let response = kernel.handle(Request::new("GET", "/secret")).unwrap();
        assert_eq!(response.status_code(), 401);
        assert_eq!(response.body(), "blocked");
    }

    #[test]
    fn test_route_params_reach_the_action() {
        let container = Arc::new(Container::new());
        let action = Callable::closure(
            ClosureDef::new(|_, args| {
                let id = args.string(0)?;
                Ok(value(HttpResponse::text(&format!("user {}", id))))
            })
            .param(ParamDef::primitive("id", "String")),
        );

        let kernel = kernel_with(container, |r| {
            r.get("/users/{id}", action);
        });

        let response = kernel.handle(Request::new("GET", "/users/42")).unwrap();
        assert_eq!(response.body(), "user 42");
    }

    #[test]
    fn test_request_is_injectable_by_name() {
        let container = Arc::new(Container::new());
        let action = Callable::closure(
            ClosureDef::new(|_, args| {
                let request = args.get::<Request>(0)?;
                Ok(value(HttpResponse::text(request.path())))
            })
            .param(ParamDef::service("request", "Request")),
        );

        let kernel = kernel_with(container, |r| {
            r.get("/echo", action);
        });

        let response = kernel.handle(Request::new("GET", "/echo")).unwrap();
        assert_eq!(response.body(), "/echo");
    }

    #[test]
    fn test_controller_method_dispatch_through_container() {
        use crate::container::MethodDef;

        let container = Arc::new(Container::new());
        container.register_class(
            ClassDef::new("GreetController")
                .constructor(|_, _| Ok(value(())))
                .method(
                    "show",
                    MethodDef::new(|_, _receiver, args| {
                        let name = args.string(0)?;
                        Ok(value(HttpResponse::text(&format!("hi {}", name))))
                    })
                    .param(ParamDef::primitive("name", "String")),
                ),
        );

        let kernel = kernel_with(container, |r| {
            r.get("/greet/{name}", Callable::method("GreetController", "show"));
        });

        let response = kernel.handle(Request::new("GET", "/greet/ada")).unwrap();
        assert_eq!(response.body(), "hi ada");
    }
}
