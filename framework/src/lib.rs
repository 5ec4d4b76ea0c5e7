//! Trellis: a Laravel-inspired MVC core for Rust.
//!
//! The pieces compose the classic request lifecycle:
//!
//! - [`container`]: a service container with explicit class descriptors in
//!   place of runtime reflection
//! - [`routing`]: regex-backed routes with `{param}` placeholders,
//!   constraints and attribute-inheriting groups
//! - [`http`]: request/response types, the onion middleware [`Pipeline`]
//!   and the [`Kernel`] that drives match → middleware → dispatch
//! - [`view`]: blade-style templates compiled to cached instruction
//!   programs
//! - [`server`]: the hyper/tokio boundary; everything inside the kernel is
//!   synchronous

pub mod config;
pub mod container;
pub mod error;
pub mod http;
pub mod log;
pub mod routing;
pub mod server;
pub mod session;
pub mod view;

pub use container::{
    value, value_as, CallArgs, Callable, ClassDef, ClosureDef, Concrete, Container, MethodDef,
    ParamDef, Params, ResolutionError, Value,
};
pub use error::FrameworkError;
pub use http::{
    middleware_value, HttpResponse, Kernel, Middleware, Next, Pipe, Pipeline, Request, Response,
};
pub use routing::{GroupAttributes, Route, RouteCollection, RouteMatch, Router, RoutingError};
pub use server::Server;
pub use session::Session;
pub use view::{CompilationError, View};
