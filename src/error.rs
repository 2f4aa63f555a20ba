use thiserror::Error;

#[derive(Debug, Error)]
pub enum HearthError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Bad element file: {0}")]
    BadElementFile(String),

    #[error("Bad periodic boundary condition file: {0}")]
    BadPbcFile(String),

    #[error("Bad edge file: {0}")]
    BadEdgeFile(String),

    #[error("Material properties have not been defined for all regions")]
    MissingMaterialProps,

    #[error("Solve error: {0}")]
    Solve(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HearthError>;
