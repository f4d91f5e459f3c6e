//! Core shared errors (renderer-agnostic).

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("Invalid camera: {0}")]
    InvalidCamera(String),
    #[error("Invalid orbit distance range: min={min}, max={max}")]
    InvalidOrbitRange { min: f32, max: f32 },
    #[error("Canonical size must be positive and finite, got {0}")]
    InvalidCanonicalSize(f32),
}

pub type CoreResult<T> = Result<T, CoreError>;
