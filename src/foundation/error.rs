/// Crate-wide result alias.
pub type StreamViewResult<T> = Result<T, StreamViewError>;

/// Error categories surfaced by the streaming pipeline.
///
/// Only [`StreamViewError::Config`] is ever returned synchronously from the control surface.
/// The other categories are produced inside the per-frame path, where they are logged and
/// counted instead of propagated.
#[derive(thiserror::Error, Debug)]
pub enum StreamViewError {
    /// Invalid layer or view configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Frame acquisition or filter failure inside a producer tick.
    #[error("producer error: {0}")]
    Producer(String),

    /// Image encoding failure.
    #[error("encode error: {0}")]
    Encode(String),

    /// Payload decoding failure on the compositor side.
    #[error("decode error: {0}")]
    Decode(String),

    /// Channel or protocol failure between producer and compositor.
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Any other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StreamViewError {
    /// Build a [`StreamViewError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`StreamViewError::Producer`].
    pub fn producer(msg: impl Into<String>) -> Self {
        Self::Producer(msg.into())
    }

    /// Build a [`StreamViewError::Encode`].
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`StreamViewError::Decode`].
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`StreamViewError::Transport`].
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Build a [`StreamViewError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
