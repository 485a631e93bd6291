use thiserror::Error;

/// The central error type for all operations in stegcore.
#[derive(Error, Debug)]
pub enum StegError {
    #[error("Input bytes do not contain a decodable image")]
    NoImage,

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Payload of {required} bits exceeds the cover capacity of {available} bits")]
    MediaCapacity { required: usize, available: usize },

    #[error("Unknown steganographic format: {message}")]
    UnknownStegFormat {
        message: String,
        #[source]
        source: Option<Box<StegError>>,
    },

    #[error("Hidden message is damaged: {0}")]
    DamagedMessage(String),

    #[error("Embedder rejected cover element: {0}")]
    EmbedderInput(String),

    #[error("Encoder error: {message}")]
    EncoderError {
        message: String,
        #[source]
        source: Option<Box<StegError>>,
    },

    #[error("Cover element {position} not found, overlay holds {length} elements")]
    ElementNotFound { position: usize, length: usize },

    #[error("Image could not be reassembled: {0}")]
    MediaReassembling(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StegError {
    /// Plain encoder-layer failure without an underlying cause.
    pub fn encoder(message: impl Into<String>) -> Self {
        StegError::EncoderError {
            message: message.into(),
            source: None,
        }
    }

    /// Errors raised below an encoder are reported as `EncoderError` with the
    /// original cause attached. Capacity, lookup and RS failures pass through.
    pub fn into_encoder_error(self) -> Self {
        match self {
            StegError::EmbedderInput(ref msg) => StegError::EncoderError {
                message: format!("unsupported cover element: {msg}"),
                source: Some(Box::new(self)),
            },
            other => other,
        }
    }

    /// A capacity failure while reading a header-driven payload means there
    /// was no header to begin with.
    pub fn into_unknown_format(self, message: impl Into<String>) -> Self {
        match self {
            StegError::MediaCapacity { .. } => StegError::UnknownStegFormat {
                message: message.into(),
                source: Some(Box::new(self)),
            },
            other => other,
        }
    }

    /// Process exit status for the command-line front end.
    pub fn exit_code(&self) -> u8 {
        match self {
            StegError::NoImage
            | StegError::UnsupportedMedia(_)
            | StegError::UnknownStegFormat { .. } => 2,
            StegError::MediaCapacity { .. } => 3,
            StegError::DamagedMessage(_) => 4,
            _ => 1,
        }
    }
}

// Variants are compared by kind; payloads only where they are plain values.
impl PartialEq for StegError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StegError::UnsupportedMedia(a), StegError::UnsupportedMedia(b)) => a == b,
            (
                StegError::MediaCapacity {
                    required: r1,
                    available: a1,
                },
                StegError::MediaCapacity {
                    required: r2,
                    available: a2,
                },
            ) => r1 == r2 && a1 == a2,
            (
                StegError::ElementNotFound {
                    position: p1,
                    length: l1,
                },
                StegError::ElementNotFound {
                    position: p2,
                    length: l2,
                },
            ) => p1 == p2 && l1 == l2,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

/// A centralized result type for the library.
pub type Result<T> = std::result::Result<T, StegError>;
