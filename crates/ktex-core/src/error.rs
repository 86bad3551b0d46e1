use thiserror::Error;

#[derive(Debug, Error)]
pub enum KTexError {
    #[error("I/O error while {op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported TEX: {0}")]
    Unsupported(String),
    #[error("Malformed atlas key: {0}")]
    MalformedKey(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Nothing to process")]
    Empty,
}

impl KTexError {
    /// Wraps an I/O error together with the step that was running when it occurred.
    pub fn io(op: &'static str) -> impl FnOnce(std::io::Error) -> KTexError {
        move |source| KTexError::Io { op, source }
    }

    /// True for wrong-magic and out-of-range header values, as opposed to disk errors.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, KTexError::Unsupported(_))
    }
}

pub type Result<T> = std::result::Result<T, KTexError>;
