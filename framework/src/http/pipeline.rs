//! Onion-style middleware pipeline
//!
//! Pipes are composed by folding from the last pipe to the first, so the
//! first pipe in the list runs outermost. A pipe short-circuits by returning
//! a response without calling [`Next::run`]; nothing past it executes,
//! including the destination.

use std::sync::Arc;

use super::request::Request;
use super::response::Response;
use crate::container::{value, value_as, Container, Value};
use crate::error::FrameworkError;

/// The continuation handed to each middleware.
pub struct Next<'a> {
    inner: Box<dyn FnOnce(Request) -> Response + Send + 'a>,
}

impl<'a> Next<'a> {
    /// Pass the request on to the rest of the pipeline.
    pub fn run(self, request: Request) -> Response {
        (self.inner)(request)
    }
}

/// A middleware stage.
pub trait Middleware: Send + Sync {
    fn handle(&self, request: Request, next: Next<'_>) -> Response;
}

/// Wrap a middleware instance for storage in the container, so a pipe named
/// by class can resolve back to it.
pub fn middleware_value(middleware: Arc<dyn Middleware>) -> Value {
    value::<Arc<dyn Middleware>>(middleware)
}

/// One stage of a pipeline: a container class name, a concrete handler, or
/// an inline closure.
#[derive(Clone)]
pub enum Pipe {
    Class(String),
    Handler(Arc<dyn Middleware>),
    Closure(Arc<dyn for<'a> Fn(Request, Next<'a>) -> Response + Send + Sync>),
}

impl Pipe {
    pub fn class(name: &str) -> Self {
        Self::Class(name.to_string())
    }

    pub fn handler(middleware: Arc<dyn Middleware>) -> Self {
        Self::Handler(middleware)
    }

    pub fn closure<F>(f: F) -> Self
    where
        F: for<'a> Fn(Request, Next<'a>) -> Response + Send + Sync + 'static,
    {
        Self::Closure(Arc::new(f))
    }

    fn invoke(self, container: &Container, request: Request, next: Next<'_>) -> Response {
        match self {
            Self::Class(name) => {
                let resolved = container.make(&name)?;
                let middleware = value_as::<Arc<dyn Middleware>>(&resolved, &name)?;
                middleware.handle(request, next)
            }
            Self::Handler(middleware) => middleware.handle(request, next),
            Self::Closure(f) => f(request, next),
        }
    }
}

/// Sends a request through an ordered list of pipes to a destination.
pub struct Pipeline<'c> {
    container: &'c Container,
    passable: Option<Request>,
    pipes: Vec<Pipe>,
}

impl<'c> Pipeline<'c> {
    pub fn new(container: &'c Container) -> Self {
        Self {
            container,
            passable: None,
            pipes: Vec::new(),
        }
    }

    /// Set the request being sent through the pipeline.
    pub fn send(mut self, passable: Request) -> Self {
        self.passable = Some(passable);
        self
    }

    /// Set the ordered pipes the request passes through.
    pub fn through(mut self, pipes: Vec<Pipe>) -> Self {
        self.pipes = pipes;
        self
    }

    /// Run the pipeline, ending at `destination`.
    pub fn then<F>(self, destination: F) -> Response
    where
        F: FnOnce(Request) -> Response + Send + 'c,
    {
        let passable = self
            .passable
            .ok_or_else(|| FrameworkError::internal("pipeline run without a request"))?;

        let container = self.container;
        let mut stack: Box<dyn FnOnce(Request) -> Response + Send + 'c> = Box::new(destination);
        for pipe in self.pipes.into_iter().rev() {
            let inner = stack;
            stack = Box::new(move |request| {
                pipe.invoke(container, request, Next { inner })
            });
        }
        stack(passable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;

    fn tagging_pipe(tag: &'static str) -> Pipe {
        Pipe::closure(move |request, next| {
            let request = request.with_header("X-Trace", tag);
            let response = next.run(request)?;
            Ok(response.header(&format!("X-After-{}", tag), "1"))
        })
    }

    #[test]
    fn test_pipes_run_in_order_around_destination() {
        let container = Container::new();
        let response = Pipeline::new(&container)
            .send(Request::new("GET", "/"))
            .through(vec![tagging_pipe("a"), tagging_pipe("b")])
            .then(|request| {
                let seen: Vec<&str> = request
                    .headers()
                    .iter()
                    .filter(|(n, _)| n == "X-Trace")
                    .map(|(_, v)| v.as_str())
                    .collect();
                assert_eq!(seen, ["a", "b"]);
                Ok(HttpResponse::text("done"))
            })
            .unwrap();

        assert_eq!(response.header_value("X-After-a"), Some("1"));
        assert_eq!(response.header_value("X-After-b"), Some("1"));
    }

    #[test]
    fn test_short_circuit_skips_rest_of_pipeline() {
        let container = Container::new();
        let blocker = Pipe::closure(|_request, _next| {
            Ok(HttpResponse::text("denied").status(403))
        });
        let response = Pipeline::new(&container)
            .send(Request::new("GET", "/"))
            .through(vec![blocker, tagging_pipe("never")])
            .then(|_request| {
                panic!("destination must not run after a short-circuit");
            })
            .unwrap();

        assert_eq!(response.status_code(), 403);
        assert_eq!(response.header_value("X-After-never"), None);
    }

    #[test]
    fn test_empty_pipeline_reaches_destination_directly() {
        let container = Container::new();
        let response = Pipeline::new(&container)
            .send(Request::new("GET", "/ping"))
            .through(Vec::new())
            .then(|request| Ok(HttpResponse::text(request.path())))
            .unwrap();
        assert_eq!(response.body(), "/ping");
    }

    #[test]
    fn test_middleware_error_propagates() {
        let container = Container::new();
        let failing = Pipe::closure(|_request, _next| {
            Err(FrameworkError::internal("boom"))
        });
        let result = Pipeline::new(&container)
            .send(Request::new("GET", "/"))
            .through(vec![failing])
            .then(|_request| Ok(HttpResponse::text("unreached")));
        assert!(result.is_err());
    }
}
