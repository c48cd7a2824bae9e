use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("input injection failed: {0}")]
    InputFailed(String),

    #[error("frame dimensions changed mid-session: {before_width}x{before_height} vs {after_width}x{after_height}")]
    DimensionMismatch {
        before_width: u32,
        before_height: u32,
        after_width: u32,
        after_height: u32,
    },

    #[error("ocr failed: {0}")]
    OcrFailed(String),

    #[error("drive api error: {0}")]
    DriveApiError(String),

    #[error("llm api error: {0}")]
    LlmApiError(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
