//! HTTP server boundary
//!
//! The only async code in the framework: accept connections, read the wire
//! request into a plain [`Request`], hand it to the synchronous kernel, and
//! write the [`HttpResponse`] back out through hyper.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::http::{HttpResponse, Kernel, Request};

/// Methods a POST form may spoof via a `_method` field.
const SPOOFABLE: [&str; 3] = ["PUT", "PATCH", "DELETE"];

pub struct Server {
    kernel: Arc<Kernel>,
    config: ServerConfig,
}

impl Server {
    pub fn new(kernel: Kernel) -> Self {
        Self {
            kernel: Arc::new(kernel),
            config: ServerConfig::from_env(),
        }
    }

    pub fn configure(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Serve forever on the configured address.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let address = self.config.address();
        let listener = TcpListener::bind(&address).await?;
        info!(%address, "listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let kernel = self.kernel.clone();
            tokio::task::spawn(async move {
                let service = service_fn(move |incoming| {
                    let kernel = kernel.clone();
                    async move { Ok::<_, Infallible>(dispatch(kernel, incoming).await) }
                });
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!(%peer, error = %e, "connection error");
                }
            });
        }
    }
}

async fn dispatch(
    kernel: Arc<Kernel>,
    incoming: hyper::Request<Incoming>,
) -> hyper::Response<Full<Bytes>> {
    let (parts, body) = incoming.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!(error = %e, "failed to read request body");
            return HttpResponse::text("Bad Request").status(400).into_hyper();
        }
    };

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());
    let mut request = Request::new(parts.method.as_str(), &target);
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }
    request = request.with_body(&String::from_utf8_lossy(&bytes));
    let request = spoof_method(request);

    let response = match kernel.handle(request.clone()) {
        Ok(response) => response,
        Err(e) => {
            error!(method = request.method(), path = request.path(), error = %e, "request failed");
            HttpResponse::from(e)
        }
    };
    kernel.terminate(&request, &response);
    response.into_hyper()
}

/// HTML forms can only submit GET and POST; a hidden `_method` field on a
/// POST upgrades it to PUT, PATCH or DELETE.
fn spoof_method(request: Request) -> Request {
    if request.method() != "POST" {
        return request;
    }
    match request.form().get("_method").map(|m| m.to_uppercase()) {
        Some(verb) if SPOOFABLE.contains(&verb.as_str()) => request.with_method(&verb),
        _ => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_post(body: &str) -> Request {
        Request::new("POST", "/items/1")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body(body)
    }

    #[test]
    fn test_post_with_method_field_is_spoofed() {
        let request = spoof_method(form_post("_method=delete&id=1"));
        assert_eq!(request.method(), "DELETE");
    }

    #[test]
    fn test_unknown_spoof_target_is_ignored() {
        let request = spoof_method(form_post("_method=TRACE"));
        assert_eq!(request.method(), "POST");
    }

    #[test]
    fn test_get_is_never_spoofed() {
        let request = spoof_method(
            Request::new("GET", "/items/1?_method=DELETE"),
        );
        assert_eq!(request.method(), "GET");
    }
}
