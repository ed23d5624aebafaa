// src/utils/env.rs
use log::{info, warn};
use std::path::Path;

/// Loads the first `.env` file found. Variables already present in the
/// process environment are never overridden.
pub fn load_env() {
    let env_paths = [".env", ".env.local", "../.env"];
    for path in env_paths.iter() {
        if Path::new(path).exists() {
            match dotenv::from_path(path) {
                Ok(()) => {
                    info!("Loaded environment variables from {}", path);
                    return;
                }
                Err(e) => warn!("Failed to load environment from {}: {}", path, e),
            }
        }
    }
    info!("No .env file found, using environment variables from system");
}

/// Reads and parses an env var, falling back to `default` when unset or
/// unparsable.
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparsable value '{}' for {}", raw, key);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_parses_and_falls_back() {
        std::env::set_var("MEDCODE_TEST_ENV_OR_NUM", "42");
        std::env::set_var("MEDCODE_TEST_ENV_OR_BAD", "forty-two");
        assert_eq!(env_or("MEDCODE_TEST_ENV_OR_NUM", 0usize), 42);
        assert_eq!(env_or("MEDCODE_TEST_ENV_OR_BAD", 7usize), 7);
        assert_eq!(env_or("MEDCODE_TEST_ENV_OR_MISSING", 0.5f64), 0.5);
        std::env::remove_var("MEDCODE_TEST_ENV_OR_NUM");
        std::env::remove_var("MEDCODE_TEST_ENV_OR_BAD");
    }
}
