mod home;
mod user;

use trellis::Container;

pub fn register(container: &Container) {
    container.register_class(home::descriptor());
    container.register_class(user::descriptor());
}
