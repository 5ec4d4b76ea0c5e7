//! Route table.

use trellis::{Callable, GroupAttributes, Router};

pub fn register(router: &mut Router) {
    router.get("/", Callable::method("HomeController", "index"));

    router.group(
        GroupAttributes::new().prefix("users").middleware(&["web"]),
        |r| {
            r.get("/", Callable::method("UserController", "index"));
            r.get("/{id}", Callable::method("UserController", "show"))
                .where_param("id", "[0-9]+");
            r.get("/{id}/edit", Callable::method("UserController", "edit"))
                .where_param("id", "[0-9]+");
            r.put("/{id}", Callable::method("UserController", "update"))
                .where_param("id", "[0-9]+");
        },
    );

    router.group(
        GroupAttributes::new().prefix("admin").middleware(&["web", "auth"]),
        |r| {
            r.get("/", Callable::method("UserController", "index"));
        },
    );
}
