use thiserror::Error;

pub type Result<T> = std::result::Result<T, IrError>;

#[derive(Error, Debug)]
pub enum IrError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown DataPoint type tag: {0}")]
    UnknownType(String),

    #[error("missing required field `{0}` on DataPoint")]
    MissingField(&'static str),
}
