//! AI provider key, read from the environment and held as a secret.

use secrecy::SecretString;

/// Environment variable holding the AI provider key.
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";

/// Read the provider key from the environment (and `.env` if present).
///
/// Returns None when no key is set. Cache operations work without one;
/// only AI extraction needs it.
pub fn api_key_from_env() -> Option<SecretString> {
    let _ = dotenvy::dotenv();
    api_key_from(std::env::var(ENV_API_KEY).ok())
}

/// Whether an AI provider key is available.
pub fn api_key_configured() -> bool {
    api_key_from_env().is_some()
}

fn api_key_from(raw: Option<String>) -> Option<SecretString> {
    let raw = raw?;
    let key = raw.trim();
    if key.is_empty() {
        return None;
    }
    Some(SecretString::from(key.to_string()))
}
