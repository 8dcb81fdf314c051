use crate::types::field_path::FieldPathError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid field path in transform rules")]
    BadPath(#[from] FieldPathError),
}
