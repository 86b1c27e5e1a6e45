use thiserror::Error;

/// Why a chat command failed. Rendered into the reply by the dispatcher.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Wrong argument count or shape. `detail` is shown to the requester.
    #[error("invalid command usage")]
    BadUsage { detail: String },

    #[error(transparent)]
    Store(#[from] motifini_subscribe::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl CommandError {
    #[must_use]
    pub fn bad_usage(detail: impl Into<String>) -> Self {
        Self::BadUsage {
            detail: detail.into(),
        }
    }

    /// Extra text shown under the `ERROR:` line.
    pub fn detail(&self) -> &str {
        match self {
            Self::BadUsage { detail } => detail,
            _ => "",
        }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;
