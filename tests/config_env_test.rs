//! Config environment variable tests
//!
//! Config::from_env() also loads a .env file via dotenvy, so every test sets the
//! variables it asserts on and removes them afterwards.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use chefmentor::config::{
    Config, LogFormat, DEFAULT_GEMINI_MODEL, DEFAULT_GROQ_BASE_URL, DEFAULT_MAX_IMAGE_BYTES,
};
use serial_test::serial;
use std::env;

fn clear(keys: &[&str]) {
    for key in keys {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_config_provider_keys_enable_tiers() {
    env::set_var("GEMINI_API_KEY", "gemini-test-key");
    env::set_var("GROQ_API_KEY", "   ");

    let config = Config::from_env().unwrap();
    assert!(config.gemini.is_enabled());
    assert_eq!(config.gemini.api_key.as_deref(), Some("gemini-test-key"));
    // Blank keys count as unset.
    assert!(!config.groq.is_enabled());

    clear(&["GEMINI_API_KEY", "GROQ_API_KEY"]);
}

#[test]
#[serial]
fn test_config_provider_overrides() {
    env::set_var("GROQ_BASE_URL", "http://localhost:9999/v1");
    env::set_var("GROQ_MODEL", "llama-test");
    env::remove_var("GEMINI_MODEL");

    let config = Config::from_env().unwrap();
    assert_eq!(config.groq.base_url, "http://localhost:9999/v1");
    assert_eq!(config.groq.model, "llama-test");
    assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);

    clear(&["GROQ_BASE_URL", "GROQ_MODEL"]);
    let config = Config::from_env().unwrap();
    assert_eq!(config.groq.base_url, DEFAULT_GROQ_BASE_URL);
}

#[test]
#[serial]
fn test_config_custom_database() {
    env::set_var("DATABASE_PATH", "/custom/chef.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/custom/chef.db");
    assert_eq!(config.database.max_connections, 10);

    clear(&["DATABASE_PATH", "DATABASE_MAX_CONNECTIONS"]);
}

#[test]
#[serial]
fn test_config_zero_connections_is_rejected() {
    env::set_var("DATABASE_MAX_CONNECTIONS", "0");

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("DATABASE_MAX_CONNECTIONS"));

    clear(&["DATABASE_MAX_CONNECTIONS"]);
}

#[test]
#[serial]
fn test_config_json_log_format() {
    env::set_var("LOG_FORMAT", "JSON");
    env::set_var("LOG_LEVEL", "debug");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level, "debug");

    env::set_var("LOG_FORMAT", "fancy");
    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Pretty);

    clear(&["LOG_FORMAT", "LOG_LEVEL"]);
}

#[test]
#[serial]
fn test_config_timeouts() {
    env::set_var("TIER_TIMEOUT_MS", "2500");
    env::set_var("IMAGE_FETCH_TIMEOUT_MS", "not-a-number");
    env::set_var("IMAGE_MAX_BYTES", "2048");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.tier_timeout_ms, 2500);
    assert_eq!(config.request.image_fetch_timeout_ms, 10000);
    assert_eq!(config.request.max_image_bytes, 2048);

    env::set_var("IMAGE_MAX_BYTES", "0");
    let config = Config::from_env().unwrap();
    assert_eq!(config.request.max_image_bytes, DEFAULT_MAX_IMAGE_BYTES);

    clear(&["TIER_TIMEOUT_MS", "IMAGE_FETCH_TIMEOUT_MS", "IMAGE_MAX_BYTES"]);
}
