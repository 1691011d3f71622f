//! Top-level error types for editbot.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for startup and platform calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("discord error: {0}")]
    Discord(#[from] serenity::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required config key: {0}")]
    MissingKey(String),
}

/// Failures of a single edit invocation.
///
/// The `Display` text of every variant is sent to the user verbatim as the
/// final response content, so keep the messages short and readable.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("invalid edit spec: {0}")]
    InvalidEditSpec(String),

    #[error("no media found")]
    NoMediaFound,

    #[error("failed to read channel history: {0}")]
    HistoryFetchFailed(String),

    #[error("failed to fetch media: {0}")]
    MediaFetchFailed(String),

    #[error("failed to stage media: {0}")]
    StagingFailed(#[from] std::io::Error),

    #[error("{0}")]
    ProcessingFailed(String),
}

/// Failures delivering the deferred response. Logged only.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("allowed mentions error: {0}")]
    InvalidMentionPolicy(String),

    #[error("embed error: {0}")]
    InvalidEmbed(String),

    #[error("sum of text in embeds is {actual}, over the limit of {limit}")]
    EmbedBudgetExceeded { actual: usize, limit: usize },

    #[error("failed to edit interaction response: {0}")]
    EditFailed(String),
}
