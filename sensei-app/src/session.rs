//! Session capabilities: the bearer credentials for the model backend and the
//! calendar service.
//!
//! Acquisition resolves exactly once, at startup, from config and environment
//! (the env overrides are already folded in by the config loader). There is no
//! OAuth flow here: the token either exists or the corresponding operations
//! short-circuit with a user-visible notice.

use crate::config::SenseiConfig;

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub model_api_key: Option<String>,
    pub calendar_token: Option<String>,
}

impl Credentials {
    pub fn acquire(cfg: &SenseiConfig) -> Self {
        let creds = Self {
            model_api_key: cfg
                .keys
                .openrouter_api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            calendar_token: cfg
                .keys
                .google_calendar_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
        };
        tracing::info!(
            model_key = creds.model_api_key.is_some(),
            calendar_token = creds.calendar_token.is_some(),
            "session capabilities acquired"
        );
        creds
    }

    pub fn has_calendar(&self) -> bool {
        self.calendar_token.is_some()
    }

    pub fn has_model(&self) -> bool {
        self.model_api_key.is_some()
    }
}
