use thiserror::Error;

/// Errors are `Clone` so a single failed fetch can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Artwork unavailable for {uri}: {cause}")]
    ArtworkUnavailable { uri: String, cause: String },

    #[error("Invalid artwork URI: {0:?}")]
    InvalidUri(String),
}

impl MetadataError {
    pub fn unavailable(uri: impl Into<String>, cause: impl ToString) -> Self {
        MetadataError::ArtworkUnavailable {
            uri: uri.into(),
            cause: cause.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
