use std::env;
use std::fmt;
use std::fs;
use std::path::Path;

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::core::errors::{ApiError, ConfigError};

pub const API_KEY_HEADER: &str = "x-api-key";
const API_TOKEN_ENV: &str = "ASSISTANT_API_TOKEN";
const GENERATION_KEY_ENV: &str = "GROQ_API_KEY";

/// Token the presentation layer presents in the `x-api-key` header.
#[derive(Clone)]
pub struct ApiToken {
    value: String,
}

impl ApiToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(****)")
    }
}

/// Use `ASSISTANT_API_TOKEN` when set, otherwise mint a token and write it
/// owner-readable to `token_path` for the presentation layer to pick up.
pub fn init_api_token(token_path: &Path) -> ApiToken {
    if let Ok(token) = env::var(API_TOKEN_ENV) {
        if !token.trim().is_empty() {
            return ApiToken::new(token);
        }
    }

    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    if let Some(parent) = token_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Err(err) = fs::write(token_path, &token) {
        tracing::warn!("Failed to write API token: {}", err);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(token_path) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            let _ = fs::set_permissions(token_path, perms);
        }
    }

    ApiToken::new(token)
}

pub fn require_api_key(headers: &HeaderMap, expected: &ApiToken) -> Result<(), ApiError> {
    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    let matches: bool = header_value
        .as_bytes()
        .ct_eq(expected.value().as_bytes())
        .into();
    if !matches {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}

/// Bearer key for the generation endpoint: `GROQ_API_KEY` wins over secrets.yml.
pub fn resolve_generation_key(configured: Option<&str>) -> Result<String, ConfigError> {
    let from_env = env::var(GENERATION_KEY_ENV).ok();
    pick_credential(from_env.as_deref(), configured)
        .ok_or(ConfigError::MissingCredential(GENERATION_KEY_ENV))
}

fn pick_credential(from_env: Option<&str>, configured: Option<&str>) -> Option<String> {
    [from_env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}
