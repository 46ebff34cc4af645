use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("API key is missing. Set GEMINI_API_KEY (or API_KEY) or pass --api-key.")]
    MissingApiKey,

    #[error("Invalid data URL: {0}")]
    MalformedDataUrl(String),

    #[error("Unsupported aspect ratio '{0}' (expected 1:1, 16:9 or 9:16)")]
    InvalidAspectRatio(String),

    #[error("Unsupported output kind '{0}' (expected image or video)")]
    InvalidOutputKind(String),

    #[error("Unsupported describe mode '{0}' (expected general or character_only)")]
    InvalidDescribeMode(String),

    #[error("Gemini request failed{}: {message}", status_suffix(.status))]
    Backend {
        status: Option<u16>,
        message: String,
    },

    #[error("No image data found in response (model: {model})")]
    NoImageProduced { model: String },

    #[error("{0} is already in progress")]
    Busy(&'static str),

    #[error("The session was reset while the request was running")]
    SessionReset,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" with status {code}"))
        .unwrap_or_default()
}

impl StudioError {
    pub fn backend(status: Option<u16>, message: impl Into<String>) -> Self {
        StudioError::Backend {
            status,
            message: message.into(),
        }
    }
}
