//! Configuration: `.env` loading and typed config sections.

mod env;
mod providers;

pub use env::{env, env_optional, load_dotenv};
pub use providers::{ServerConfig, ViewConfig};
