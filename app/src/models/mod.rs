mod user;

pub use user::{User, UserRepository};

use trellis::Container;

pub fn register(container: &Container) {
    container.instance(
        UserRepository::NAME,
        std::sync::Arc::new(UserRepository::seeded()),
    );
}
