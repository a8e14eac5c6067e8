use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetPackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Frame '{name}' has invalid geometry {width}x{height}")]
    InvalidGeometry {
        name: String,
        width: u32,
        height: u32,
    },
    #[error("No canvas up to {max_width}x{max_height} fits all {frames} frames")]
    PackingInfeasible {
        frames: usize,
        max_width: u32,
        max_height: u32,
    },
}

pub type Result<T> = std::result::Result<T, SheetPackError>;
