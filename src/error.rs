use std::io;

use thiserror::Error;

/// Errors raised while building or loading a scene.
///
/// Rendering itself never fails: degenerate geometry yields no intersections
/// and exhausted recursion yields black. Everything here is a malformed scene
/// graph or input file, detected before the first ray is cast.
#[derive(Debug, Error)]
pub enum TracerError {
    #[error("transform is not invertible: {0}")]
    NonInvertible(String),

    #[error("shape {0} already has a parent")]
    AlreadyParented(usize),

    #[error("shape {0} is not a group")]
    NotAGroup(usize),

    #[error("adding shape {0} would make it its own ancestor")]
    Cycle(usize),

    #[error("shape {0} does not exist")]
    UnknownShape(usize),

    #[error("invalid scene description: {0}")]
    Scene(String),

    #[error("OBJ parse error at line {line}: {message}")]
    Obj { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TracerError>;
