use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    #[error("Unsupported page: {0}")]
    UnsupportedPage(String),

    #[error("Offset {offset} is out of bounds (max: {max})")]
    OutOfBounds { offset: u64, max: u64 },

    #[error("Palette index {index} out of range (table has {len} entries)")]
    PaletteIndex { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, CoreError>;
