use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BracketError {
    #[error("bad input: {0}")]
    BadInput(String),
}

pub type BracketResult<T> = Result<T, BracketError>;

impl From<BracketError> for crate::errors::CoreError {
    fn from(value: BracketError) -> Self {
        match value {
            BracketError::BadInput(msg) => crate::errors::CoreError::BadInput(msg),
        }
    }
}
