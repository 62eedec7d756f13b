use thiserror::Error;

#[derive(Error, Debug)]
pub enum EuropaError {
    #[error("hash size {0} out of range (256..=1048576)")]
    HashSizeOutOfRange(usize),

    #[error("unknown hash algorithm: {0}")]
    UnknownHashAlgorithm(String),

    #[error("unknown autocut method: {0}")]
    UnknownAutoCutMethod(String),

    #[error("window size not set")]
    WindowNotReady,

    #[error("no image loaded")]
    NoImage,

    #[error("empty image data")]
    EmptyImage,

    #[error("sample contains no finite values")]
    NoFiniteValues,

    #[error("invalid image dimensions: {width}x{height}x{channels}")]
    InvalidDimensions {
        width: usize,
        height: usize,
        channels: usize,
    },
}

pub type Result<T> = std::result::Result<T, EuropaError>;
