use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Invalid source definition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Source already registered: {0}")]
    DuplicateSource(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
