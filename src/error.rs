use thiserror::Error;

/// Every failure the overlay can run into. None of them is fatal: each one is
/// either shown to the user as an assistant message or logged and replaced by
/// a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    /// Missing or malformed configuration, most often the API key.
    #[error("configuration error: {0}")]
    Config(String),
    /// The generation service rejected the API key.
    #[error("invalid API key: {0}")]
    InvalidCredential(String),
    /// Network failure, timeout or an unexpected reply from the service.
    #[error("transport error: {0}")]
    Transport(String),
    /// The global keyboard hook could not be installed.
    #[error("global hotkey unavailable: {0}")]
    HookUnavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl OverlayError {
    /// Text placed into the transcript when a request ends in this error.
    pub fn display_message(&self) -> String {
        match self {
            OverlayError::Config(msg) => format!(
                "❌ Error: {msg}\n\nNo API key is configured. Enter one with the API Key field or set GEMINI_API_KEY."
            ),
            OverlayError::InvalidCredential(msg) => format!(
                "❌ Error: {msg}\n\nThe API key was rejected. Please check that it was copied correctly."
            ),
            OverlayError::Transport(msg) => {
                format!("❌ Error: {msg}\n\nPlease check your connection or try again.")
            }
            OverlayError::HookUnavailable(msg) | OverlayError::Storage(msg) => {
                format!("❌ Error: {msg}")
            }
        }
    }
}

impl From<reqwest::Error> for OverlayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OverlayError::Transport(format!("request timed out: {err}"))
        } else {
            OverlayError::Transport(err.to_string())
        }
    }
}
