//! Mesh diagnosis and input data checking.

use tracing::{debug, warn};

use crate::Mesh;
use crate::adjacency::EdgeIncidence;
use crate::error::{RepairError, RepairResult};

/// Topological health summary of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnosis {
    /// Total vertex count.
    pub vertex_count: usize,

    /// Total triangle count.
    pub triangle_count: usize,

    /// Edges belonging to exactly one triangle.
    pub boundary_edge_count: usize,

    /// Edges belonging to three or more triangles.
    pub non_manifold_edge_count: usize,

    /// True when there are no boundary edges and no non-manifold edges.
    pub is_watertight: bool,
}

impl std::fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Diagnosis:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Triangles: {}", self.triangle_count)?;
        writeln!(
            f,
            "  Boundary edges: {} ({})",
            self.boundary_edge_count,
            if self.boundary_edge_count == 0 {
                "closed"
            } else {
                "open"
            }
        )?;
        writeln!(
            f,
            "  Non-manifold edges: {}",
            self.non_manifold_edge_count
        )?;
        writeln!(
            f,
            "  Watertight: {}",
            if self.is_watertight { "yes" } else { "NO" }
        )?;
        Ok(())
    }
}

/// Measure a mesh's topological health.
///
/// Pure: the mesh is only read. Watertight means zero boundary edges and
/// zero non-manifold edges.
pub fn diagnose(mesh: &Mesh) -> Diagnosis {
    let incidence = EdgeIncidence::build(&mesh.faces);
    let boundary_edge_count = incidence.boundary_edge_count();
    let non_manifold_edge_count = incidence.non_manifold_edge_count();

    let diagnosis = Diagnosis {
        vertex_count: mesh.vertex_count(),
        triangle_count: mesh.face_count(),
        boundary_edge_count,
        non_manifold_edge_count,
        is_watertight: boundary_edge_count == 0 && non_manifold_edge_count == 0,
    };

    if !diagnosis.is_watertight {
        warn!(
            "Mesh is not watertight: {} boundary edges, {} non-manifold edges",
            boundary_edge_count, non_manifold_edge_count
        );
    }
    debug!("{}", diagnosis);

    diagnosis
}

/// Reject malformed vertex or face data.
///
/// The repair pipeline assumes well-formed input; behavior on out-of-range
/// indices is undefined there. Ingest adapters call this to surface NaN or
/// infinite coordinates and out-of-range indices before repair sees them.
/// Returns the first violation found.
pub fn check_mesh_data(mesh: &Mesh) -> RepairResult<()> {
    for (vertex_index, vertex) in mesh.vertices.iter().enumerate() {
        let p = &vertex.position;
        for (coordinate, value) in [("x", p.x), ("y", p.y), ("z", p.z)] {
            if !value.is_finite() {
                return Err(RepairError::InvalidCoordinate {
                    vertex_index,
                    coordinate,
                    value,
                });
            }
        }
    }

    let vertex_count = mesh.vertex_count();
    for (face_index, face) in mesh.faces.iter().enumerate() {
        for &vertex_index in face {
            if vertex_index as usize >= vertex_count {
                return Err(RepairError::InvalidVertexIndex {
                    face_index,
                    vertex_index,
                    vertex_count,
                });
            }
        }
    }

    Ok(())
}
