//! Deterministic triangle-mesh repair for fabrication pipelines.
//!
//! This crate turns an arbitrary indexed triangle soup into a 2-manifold
//! surface safe to slice: every edge shared by at most two faces, holes
//! closed, duplicates and degenerates gone. It is the repair core of a
//! larger toolchain: container parsing (3MF and friends) and UI live
//! behind the adapter seams in [`adapter`].
//!
//! # Pipeline
//!
//! A repair runs a fixed sequence over working copies of the buffers:
//!
//! 1. **Weld** spatially-coincident vertices under a fixed-precision
//!    quantisation (6 decimal digits ≈ 1 µm for mm-unit data)
//! 2. **Filter** degenerate (repeated-index) and duplicate triangles
//! 3. **Resolve** non-manifold edges by deleting excess faces
//! 4. **Fill holes** to convergence: boundary loops close with centroid
//!    fans, tangled boundaries fall back to T-junction splices
//! 5. **Sweep** non-manifold edges once more (fans can over-share edges)
//! 6. **Compact** away unreferenced vertices
//!
//! # Determinism
//!
//! Every stage breaks ties by array position, so a repair is a pure
//! function of its input: identical buffers in, bit-identical buffers out.
//! The core is single-threaded and holds no shared state; callers may run
//! independent repairs in parallel.
//!
//! # Quick Start
//!
//! ```
//! use mesh_seal::{Mesh, RepairOptions, Vertex};
//!
//! let mut mesh = Mesh::new();
//! mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 1.0));
//! mesh.faces.push([0, 1, 2]);
//! mesh.faces.push([0, 1, 3]);
//! mesh.faces.push([1, 2, 3]);
//! mesh.faces.push([0, 2, 3]);
//!
//! let report = mesh.repair(&RepairOptions::default());
//! assert_eq!(report.holes_filled, 0); // already closed
//! assert!(mesh.diagnose().is_watertight);
//! ```
//!
//! # Failure model
//!
//! Repair itself never fails: pathological topology is handled by
//! conservative deletion or by leaving holes open, visible afterwards via
//! [`diagnose`]. Errors ([`RepairError`]) come only from input data
//! checking and the container adapters. Progress reporting is write-only
//! and best-effort; see [`progress`].

mod error;
mod types;

pub mod adapter;
pub mod adjacency;
pub mod holes;
pub mod progress;
pub mod repair;
pub mod validate;

pub use error::{RepairError, RepairResult};
pub use types::{Mesh, Vertex};

pub use adapter::{IngestBundle, MeshEmit, MeshIngest, repair_container};
pub use adjacency::{EdgeIncidence, HalfEdge, boundary_half_edges};
pub use holes::{BoundaryLoop, fill_holes, find_loops};
pub use progress::{BatchEvent, BatchSink, ProgressSink};
pub use repair::{
    BatchOutcome, MeshObject, RepairOptions, RepairReport, RepairedObject,
    remove_degenerate_triangles, remove_duplicate_triangles, remove_unreferenced_vertices,
    repair_all, repair_in_place, repair_mesh, repair_object, resolve_non_manifold_edges,
    weld_vertices,
};
pub use validate::{Diagnosis, check_mesh_data, diagnose};

// Convenience methods on Mesh
impl Mesh {
    /// Measure topological health. Pure; the mesh is only read.
    pub fn diagnose(&self) -> Diagnosis {
        validate::diagnose(self)
    }

    /// Repair in place with the given options, returning the counters.
    ///
    /// For an input-preserving repair or progress reporting, use
    /// [`repair_object`] / [`repair_mesh`].
    pub fn repair(&mut self, options: &RepairOptions) -> RepairReport {
        repair::repair_in_place(self, options, None)
    }
}
