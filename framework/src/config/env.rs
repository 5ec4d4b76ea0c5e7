//! Environment access
//!
//! Typed helpers over process environment variables, with `.env` loading
//! via dotenvy. Parse failures fall back to the caller's default rather
//! than aborting startup.

use std::path::Path;
use std::str::FromStr;

use tracing::warn;

/// Load `.env` from `base`, then `.env.{APP_ENV}` on top when it exists.
/// Values already present in the process environment always win.
pub fn load_dotenv(base: impl AsRef<Path>) {
    let base = base.as_ref();
    let main = base.join(".env");
    if main.is_file() {
        if let Err(e) = dotenvy::from_path(&main) {
            warn!(path = %main.display(), error = %e, "failed to load env file");
        }
    }
    if let Ok(app_env) = std::env::var("APP_ENV") {
        let scoped = base.join(format!(".env.{}", app_env));
        if scoped.is_file() {
            if let Err(e) = dotenvy::from_path(&scoped) {
                warn!(path = %scoped.display(), error = %e, "failed to load env file");
            }
        }
    }
}

/// Read and parse an environment variable, falling back to `default` when
/// it is unset or unparseable.
pub fn env<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(key, value = %raw, "unparseable env value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Read and parse an environment variable, if set and valid.
pub fn env_optional<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_falls_back_on_missing_key() {
        assert_eq!(env("TRELLIS_TEST_MISSING_KEY", 8080u16), 8080);
    }

    #[test]
    fn test_env_parses_present_key() {
        std::env::set_var("TRELLIS_TEST_PORT", "9001");
        assert_eq!(env("TRELLIS_TEST_PORT", 0u16), 9001);
        std::env::remove_var("TRELLIS_TEST_PORT");
    }

    #[test]
    fn test_env_falls_back_on_parse_failure() {
        std::env::set_var("TRELLIS_TEST_BAD_PORT", "not-a-port");
        assert_eq!(env("TRELLIS_TEST_BAD_PORT", 3000u16), 3000);
        std::env::remove_var("TRELLIS_TEST_BAD_PORT");
    }
}
