//! Wires the container, routes and kernel together.

use std::sync::Arc;

use trellis::config::ViewConfig;
use trellis::{Container, FrameworkError, Kernel, Router, Session, View};

use crate::{controllers, middleware, models, routes};

pub fn kernel() -> Result<Kernel, FrameworkError> {
    let container = Arc::new(Container::new());

    let session = Arc::new(Session::new());
    container.instance("Session", session.clone());

    let views = View::new(&ViewConfig::from_env())?.with_session(session.clone());
    container.instance("View", Arc::new(views));

    models::register(&container);
    controllers::register(&container);
    middleware::register(&container, session);

    let mut router = Router::new();
    routes::register(&mut router);

    Ok(Kernel::new(container, router)
        .global_middleware(&["RequestLogger"])
        .middleware_group("web", &["VerifyCsrfToken"])
        .route_alias("auth", "Authenticate"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis::{value_as, HttpResponse, Request};

    fn handle(kernel: &Kernel, request: Request) -> HttpResponse {
        kernel.handle(request).unwrap()
    }

    #[test]
    fn test_home_page_renders_through_layout() {
        let kernel = kernel().unwrap();
        let response = handle(&kernel, Request::new("GET", "/"));
        assert_eq!(response.status_code(), 200);
        assert!(response.body().contains("<title>Trellis</title>"));
        assert!(response.body().contains("Onion middleware pipeline"));
    }

    #[test]
    fn test_user_show_and_constraint() {
        let kernel = kernel().unwrap();

        let response = handle(&kernel, Request::new("GET", "/users/1"));
        assert_eq!(response.status_code(), 200);
        assert!(response.body().contains("Ada Lovelace"));

        // The id constraint rejects non-numeric segments.
        let response = handle(&kernel, Request::new("GET", "/users/ada"));
        assert_eq!(response.status_code(), 404);
        assert_eq!(response.body(), "Not Found");
    }

    #[test]
    fn test_update_requires_csrf_token() {
        let kernel = kernel().unwrap();

        let response = handle(
            &kernel,
            Request::new("PUT", "/users/2")
                .with_header("Content-Type", "application/x-www-form-urlencoded")
                .with_body("name=Renamed"),
        );
        assert_eq!(response.status_code(), 419);

        let session = value_as::<Session>(
            &kernel.container().make("Session").unwrap(),
            "Session",
        )
        .unwrap();
        let body = format!("name=Renamed&_token={}", session.token());
        let response = handle(
            &kernel,
            Request::new("PUT", "/users/2")
                .with_header("Content-Type", "application/x-www-form-urlencoded")
                .with_body(&body),
        );
        assert_eq!(response.status_code(), 302);
        assert_eq!(response.header_value("Location"), Some("/users/2"));

        let response = handle(&kernel, Request::new("GET", "/users/2"));
        assert!(response.body().contains("Renamed"));
    }

    #[test]
    fn test_admin_requires_authentication() {
        let kernel = kernel().unwrap();

        let response = handle(&kernel, Request::new("GET", "/admin"));
        assert_eq!(response.status_code(), 302);
        assert_eq!(response.header_value("Location"), Some("/"));

        let session = value_as::<Session>(
            &kernel.container().make("Session").unwrap(),
            "Session",
        )
        .unwrap();
        session.put("user_id", "1");
        let response = handle(&kernel, Request::new("GET", "/admin"));
        assert_eq!(response.status_code(), 200);
    }
}
