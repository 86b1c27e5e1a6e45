use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("event not found: {event}")]
    EventNotFound { event: String },

    #[error("event already exists: {event}")]
    EventExists { event: String },

    #[error("subscriber not found: {contact} ({api})")]
    SubscriberNotFound { api: String, contact: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn event_not_found(event: impl Into<String>) -> Self {
        Self::EventNotFound {
            event: event.into(),
        }
    }

    #[must_use]
    pub fn event_exists(event: impl Into<String>) -> Self {
        Self::EventExists {
            event: event.into(),
        }
    }

    #[must_use]
    pub fn subscriber_not_found(api: impl Into<String>, contact: impl Into<String>) -> Self {
        Self::SubscriberNotFound {
            api: api.into(),
            contact: contact.into(),
        }
    }

    /// `true` for the "not found" family, which callers usually render as
    /// plain text rather than as a failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EventNotFound { .. } | Self::SubscriberNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
