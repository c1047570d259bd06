//! Environment variable names used by this crate for convenient
//! configuration of destinations from services.
//!
//! These are purely helpers; the handler and sink types remain decoupled
//! from environment access.

use crate::sink::Destination;

/// Private key authorizing writes to the backend.
pub const INGEST_PRIVATE_KEY_ENV: &str = "INGEST_PRIVATE_KEY";

/// Application name the records are filed under.
pub const INGEST_APPLICATION_NAME_ENV: &str = "INGEST_APPLICATION_NAME";

/// Subsystem name the records are filed under.
pub const INGEST_SUBSYSTEM_NAME_ENV: &str = "INGEST_SUBSYSTEM_NAME";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Destination {
    /// Build a destination from the `INGEST_*` environment variables.
    ///
    /// Missing variables become empty strings, except the application and
    /// subsystem names which default to `"default"`.
    pub fn from_env() -> Self {
        Destination {
            private_key: env_or(INGEST_PRIVATE_KEY_ENV, ""),
            application_name: env_or(INGEST_APPLICATION_NAME_ENV, "default"),
            subsystem_name: env_or(INGEST_SUBSYSTEM_NAME_ENV, "default"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_when_unset() {
        assert_eq!(env_or("INGEST_TEST_SURELY_UNSET_VARIABLE", "fallback"), "fallback");
    }

    #[test]
    fn env_or_reads_set_variable() {
        std::env::set_var("INGEST_TEST_ENV_OR_SET", "value");
        assert_eq!(env_or("INGEST_TEST_ENV_OR_SET", "fallback"), "value");
    }
}
