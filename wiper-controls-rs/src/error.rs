//! Error types for control layout and persistence.

use core::fmt;

/// Errors building a [`ControlLoop`](crate::ControlLoop) layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LayoutError {
    /// More than [`MAX_CHANNELS`](crate::MAX_CHANNELS) channels.
    TooManyChannels,
    /// More than [`MAX_BUTTONS`](crate::MAX_BUTTONS) buttons.
    TooManyButtons,
    /// More than [`MAX_ENCODERS`](crate::MAX_ENCODERS) encoders.
    TooManyEncoders,
    /// A binding refers to a channel index that was never added.
    UnknownChannel,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LayoutError::TooManyChannels => write!(f, "too many channels"),
            LayoutError::TooManyButtons => write!(f, "too many buttons"),
            LayoutError::TooManyEncoders => write!(f, "too many encoders"),
            LayoutError::UnknownChannel => write!(f, "binding refers to an unknown channel"),
        }
    }
}

/// Errors encoding or decoding a snapshot record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// The snapshot did not fit in the record buffer.
    Encode,
    /// The record body is not a valid snapshot document.
    Decode,
    /// The length header points past the end of the record area.
    Length,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CodecError::Encode => write!(f, "snapshot does not fit in the record"),
            CodecError::Decode => write!(f, "malformed snapshot record"),
            CodecError::Length => write!(f, "record length header out of range"),
        }
    }
}

/// Errors saving or loading the persisted snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistError<E> {
    /// Underlying storage error (mount, read, erase or write).
    Store(E),
    /// The record could not be encoded or decoded.
    Codec(CodecError),
}

impl<E> From<CodecError> for PersistError<E> {
    fn from(error: CodecError) -> Self {
        PersistError::Codec(error)
    }
}

impl<E: fmt::Debug> fmt::Display for PersistError<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PersistError::Store(e) => write!(f, "storage error: {:?}", e),
            PersistError::Codec(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for PersistError<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            PersistError::Store(_) => defmt::write!(f, "storage error"),
            PersistError::Codec(e) => defmt::write!(f, "codec error: {}", e),
        }
    }
}
