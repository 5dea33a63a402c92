use thiserror::Error;

/// Errors which can occur while setting up a bake.
///
/// Stepping a bake never fails, degenerate geometry simply contributes nothing.
#[derive(Debug, Error)]
pub enum BakeError {
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("intersection backend failed to build: {0}")]
    Backend(String),

    #[error("invalid bake settings: {0}")]
    Settings(String),

    #[error("OBJ parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("toml write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, BakeError>;
