use std::fmt;

/// Errors produced by the storage engine.
#[derive(Debug)]
pub enum WalError {
    /// The requested index is outside `[min_index, master_index]`, or is
    /// not present in its owning segment's lookup table.
    ///
    /// Also used as the end-of-stream sentinel by range reads.
    InvalidIndex(u64),
    /// The segment file that would own this index does not exist on disk.
    IndexDoesNotExist(u64),
    /// A payload exceeded the per-record size limit (`u16::MAX` bytes).
    PayloadTooLarge(usize),
    /// Underlying file-system or I/O failure.
    Io(std::io::Error),
}

impl fmt::Display for WalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalError::InvalidIndex(idx) => write!(f, "invalid index: {idx}"),
            WalError::IndexDoesNotExist(idx) => write!(f, "index does not exist: {idx}"),
            WalError::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes exceeds u16::MAX")
            }
            WalError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WalError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WalError {
    fn from(value: std::io::Error) -> Self {
        WalError::Io(value)
    }
}

pub type Result<T> = std::result::Result<T, WalError>;
