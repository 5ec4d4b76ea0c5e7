//! HTTP routing
//!
//! Regex-backed route matching with `{param}` placeholders, per-parameter
//! constraints, first-match-wins ordering and attribute-inheriting groups.

mod collection;
mod route;
mod router;

pub use collection::{RouteCollection, RouteMatch};
pub use route::{Route, RoutingError};
pub use router::{GroupAttributes, RouteRegistrar, Router};
