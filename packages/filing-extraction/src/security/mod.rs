//! Credential handling for the AI provider key.

pub mod credentials;

pub use credentials::{api_key_configured, api_key_from_env, ENV_API_KEY};
