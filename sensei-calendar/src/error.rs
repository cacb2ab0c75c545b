use thiserror::Error;

pub type Result<T> = std::result::Result<T, CalendarError>;

#[derive(Debug, Error)]
pub enum CalendarError {
    /// No calendar capability in the session. The remote call is never
    /// attempted.
    #[error("jeton Google Calendar absent ou invalide")]
    Unauthenticated,

    #[error("erreur réseau Google Calendar: {0}")]
    Network(String),

    #[error("réponse Google Calendar inattendue: {0}")]
    MalformedResponse(String),

    /// The backend explicitly refused the write. Carries the backend-provided
    /// detail when available.
    #[error("Google Calendar a refusé la requête: {0}")]
    RemoteRejected(String),
}

impl From<reqwest::Error> for CalendarError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<serde_json::Error> for CalendarError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedResponse(e.to_string())
    }
}
