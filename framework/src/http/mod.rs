//! HTTP layer: request/response types, the middleware pipeline and the
//! kernel that drives a request from match to response.

mod kernel;
mod pipeline;
mod request;
mod response;

pub use kernel::Kernel;
pub use pipeline::{middleware_value, Middleware, Next, Pipe, Pipeline};
pub use request::{parse_form, Request};
pub use response::{HttpResponse, Response};
