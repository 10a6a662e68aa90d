//! Error types for data checking and adapter operations.
//!
//! The repair pipeline itself never fails: malformed topology is handled by
//! conservative deletion or by leaving holes open. Errors arise only from
//! malformed input data and from the container adapters.

use thiserror::Error;

/// Result type alias for mesh operations.
pub type RepairResult<T> = Result<T, RepairError>;

/// Errors surfaced by data checking and container adapters.
#[derive(Debug, Error)]
pub enum RepairError {
    /// Invalid vertex index in face data.
    #[error(
        "invalid vertex index: face {face_index} references vertex {vertex_index}, but mesh only has {vertex_count} vertices"
    )]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    /// Invalid coordinate value (NaN or infinity).
    #[error("invalid coordinate at vertex {vertex_index}: {coordinate} is {value}")]
    InvalidCoordinate {
        vertex_index: usize,
        coordinate: &'static str,
        value: f64,
    },

    /// A mesh ingest adapter failed to produce objects.
    #[error("mesh ingest failed: {details}")]
    Ingest { details: String },

    /// A mesh emit adapter failed to consume repaired objects.
    #[error("mesh emit failed: {details}")]
    Emit { details: String },
}
