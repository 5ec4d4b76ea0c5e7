//! Application middleware.

use std::sync::Arc;

use tracing::info;
use trellis::{middleware_value, Container, HttpResponse, Middleware, Next, Request, Response, Session};

/// Logs every request passing through the pipeline.
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn handle(&self, request: Request, next: Next<'_>) -> Response {
        let method = request.method().to_string();
        let path = request.path().to_string();
        let response = next.run(request)?;
        info!(%method, %path, status = response.status_code(), "handled");
        Ok(response)
    }
}

/// Rejects state-changing requests whose `_token` does not match the session.
pub struct VerifyCsrfToken {
    session: Arc<Session>,
}

impl Middleware for VerifyCsrfToken {
    fn handle(&self, request: Request, next: Next<'_>) -> Response {
        let guarded = matches!(request.method(), "POST" | "PUT" | "PATCH" | "DELETE");
        if guarded && request.input("_token").as_deref() != Some(self.session.token().as_str()) {
            return Ok(HttpResponse::html("Page Expired").status(419));
        }
        next.run(request)
    }
}

/// Gates routes behind a logged-in session.
pub struct Authenticate {
    session: Arc<Session>,
}

impl Middleware for Authenticate {
    fn handle(&self, request: Request, next: Next<'_>) -> Response {
        if !self.session.has("user_id") {
            return Ok(HttpResponse::redirect("/"));
        }
        next.run(request)
    }
}

pub fn register(container: &Container, session: Arc<Session>) {
    container.instance("RequestLogger", middleware_value(Arc::new(RequestLogger)));
    container.instance(
        "VerifyCsrfToken",
        middleware_value(Arc::new(VerifyCsrfToken {
            session: session.clone(),
        })),
    );
    container.instance(
        "Authenticate",
        middleware_value(Arc::new(Authenticate { session })),
    );
}
