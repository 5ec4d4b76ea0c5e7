//! Outgoing HTTP response

use bytes::Bytes;
use http_body_util::Full;

use crate::error::FrameworkError;

/// The result type produced by controllers and middleware.
pub type Response = Result<HttpResponse, FrameworkError>;

/// An HTTP response built by the application.
///
/// `Clone` so a response resolved out of the container can be handed to the
/// caller while the container keeps its type-erased copy.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl HttpResponse {
    pub fn new(body: &str) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    /// A 200 plain-text response.
    pub fn text(body: &str) -> Self {
        Self::new(body).header("Content-Type", "text/plain; charset=utf-8")
    }

    /// A 200 HTML response.
    pub fn html(body: &str) -> Self {
        Self::new(body).header("Content-Type", "text/html; charset=utf-8")
    }

    /// A 200 JSON response.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(&value.to_string()).header("Content-Type", "application/json")
    }

    /// A redirect to `location`.
    pub fn redirect(location: &str) -> Self {
        Self::new("").status(302).header("Location", location)
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Convert into a hyper response at the server boundary.
    pub fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let mut builder = hyper::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|_| {
                let mut fallback = hyper::Response::new(Full::new(Bytes::from_static(
                    b"Internal Server Error",
                )));
                *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }
}

impl From<FrameworkError> for HttpResponse {
    fn from(error: FrameworkError) -> Self {
        let body = serde_json::json!({ "error": error.to_string() });
        HttpResponse::json(&body).status(error.status_code())
    }
}
