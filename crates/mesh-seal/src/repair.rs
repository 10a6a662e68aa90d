//! Mesh repair stages and the pipeline driver.
//!
//! The stages are free functions over `&mut Mesh` that each return a count of
//! what they changed; the driver runs them in a fixed sequence. Every stage
//! breaks ties by array position, so a repair is a pure function of its
//! input: two runs on identical buffers produce identical buffers.

use hashbrown::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::adjacency::EdgeIncidence;
use crate::holes::fill_holes;
use crate::progress::{BatchEvent, BatchSink, ProgressSink};
use crate::validate::{Diagnosis, diagnose};
use crate::{Mesh, Vertex};

/// Configuration for the repair pipeline.
///
/// The defaults are the standard deterministic pipeline and are safe for any
/// mm-scale input. The caps exist to bound runtime on pathological inputs;
/// hitting one is reported through `tracing`, never as an error.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RepairOptions {
    /// Fraction digits used by the welding quantisation.
    ///
    /// Two vertices merge when all three coordinates agree after rounding to
    /// this many decimal digits. The default of 6 gives an absolute
    /// tolerance of about one micron for millimeter-unit data.
    pub weld_decimals: u32,

    /// Upper bound on non-manifold resolver passes.
    ///
    /// The resolver normally converges in a single pass; the cap guards
    /// against an implementation pathology that fails to make progress.
    pub max_resolver_passes: usize,

    /// Upper bound on hole-fill iterations.
    pub max_fill_iterations: usize,

    /// Maximum path length explored while searching for a boundary loop.
    pub max_loop_depth: usize,

    /// Consecutive non-shrinking boundary measurements tolerated before the
    /// hole-fill loop gives up.
    pub stuck_limit: usize,

    /// Hole-fill iterations between progress emissions.
    pub progress_interval: usize,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            weld_decimals: 6,
            max_resolver_passes: 100,
            max_fill_iterations: 10_000,
            max_loop_depth: 300,
            stuck_limit: 50,
            progress_interval: 100,
        }
    }
}

/// Counters accumulated during a repair run. Monotonically nondecreasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RepairReport {
    /// Vertices merged away by welding.
    pub vertices_merged: usize,

    /// Triangles deleted while resolving non-manifold edges.
    pub non_manifold_removed: usize,

    /// Boundary loops and junction splices filled.
    pub holes_filled: usize,
}

impl RepairReport {
    /// Add another report's counters into this one.
    pub fn absorb(&mut self, other: &RepairReport) {
        self.vertices_merged += other.vertices_merged;
        self.non_manifold_removed += other.non_manifold_removed;
        self.holes_filled += other.holes_filled;
    }
}

/// A face's vertex set, usable as an unordered identity.
#[inline]
pub(crate) fn sorted_triple([a, b, c]: [u32; 3]) -> [u32; 3] {
    let mut triple = [a, b, c];
    triple.sort_unstable();
    triple
}

/// Merge vertices that quantise to the same position.
///
/// Coordinates are rounded half-away-from-zero to `decimals` fraction
/// digits; vertices whose rounded triples agree collapse onto the first
/// occurrence, which keeps its position in the array's relative order. Face
/// indices are rewritten in place. Triangles that became degenerate are left
/// for the filter stage.
///
/// Returns the number of vertices merged away. Welding is a fixed point
/// after one application: surviving vertices all carry distinct keys.
pub fn weld_vertices(mesh: &mut Mesh, decimals: u32) -> usize {
    let original_count = mesh.vertices.len();
    if original_count == 0 {
        return 0;
    }

    let scale = 10f64.powi(decimals as i32);
    let quantise = |vertex: &Vertex| -> (i64, i64, i64) {
        (
            (vertex.position.x * scale).round() as i64,
            (vertex.position.y * scale).round() as i64,
            (vertex.position.z * scale).round() as i64,
        )
    };

    let mut first_seen: HashMap<(i64, i64, i64), u32> = HashMap::with_capacity(original_count);
    let mut remap: Vec<u32> = Vec::with_capacity(original_count);
    let mut kept: Vec<Vertex> = Vec::with_capacity(original_count);

    for vertex in &mesh.vertices {
        let key = quantise(vertex);
        match first_seen.get(&key).copied() {
            Some(index) => remap.push(index),
            None => {
                let index = kept.len() as u32;
                first_seen.insert(key, index);
                kept.push(*vertex);
                remap.push(index);
            }
        }
    }

    let merged = original_count - kept.len();
    if merged == 0 {
        return 0;
    }

    for face in &mut mesh.faces {
        for slot in face.iter_mut() {
            *slot = remap[*slot as usize];
        }
    }
    mesh.vertices = kept;

    info!(
        "Welded {} vertices: {} -> {}",
        merged,
        original_count,
        mesh.vertices.len()
    );
    merged
}

/// Drop triangles with a repeated vertex index.
///
/// Returns the number of triangles removed.
pub fn remove_degenerate_triangles(mesh: &mut Mesh) -> usize {
    let original_count = mesh.faces.len();

    mesh.faces.retain(|&[a, b, c]| a != b && b != c && a != c);

    let removed = original_count - mesh.faces.len();
    if removed > 0 {
        info!("Removed {} degenerate triangles", removed);
    }
    removed
}

/// Drop triangles whose unordered vertex set repeats an earlier face.
///
/// Winding is ignored for the comparison; the first occurrence of each
/// vertex set is the one kept. Run after welding so that coincident but
/// differently-indexed faces read as duplicates.
///
/// Returns the number of triangles removed.
pub fn remove_duplicate_triangles(mesh: &mut Mesh) -> usize {
    let original_count = mesh.faces.len();

    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(original_count);
    mesh.faces.retain(|&face| seen.insert(sorted_triple(face)));

    let removed = original_count - mesh.faces.len();
    if removed > 0 {
        info!("Removed {} duplicate triangles", removed);
    }
    removed
}

/// Delete excess faces on edges shared by more than two faces.
///
/// Per pass: every over-shared edge keeps its two lowest-index faces and the
/// rest are marked; the union of marks is deleted and the incidence rebuilt.
/// Deleting a face can empty an edge but cannot over-share another, so one
/// pass normally suffices; `max_passes` bounds the loop regardless.
///
/// Returns the total number of faces deleted.
pub fn resolve_non_manifold_edges(mesh: &mut Mesh, max_passes: usize) -> usize {
    let mut removed_total = 0;

    for pass in 0..max_passes {
        let incidence = EdgeIncidence::build(&mesh.faces);

        let mut doomed: HashSet<u32> = HashSet::new();
        for (_, faces) in incidence.non_manifold_edges() {
            // Face lists are ascending; keep the first two.
            doomed.extend(&faces[2..]);
        }

        if doomed.is_empty() {
            if removed_total > 0 {
                info!(
                    "Resolved non-manifold edges by removing {} faces in {} passes",
                    removed_total, pass
                );
            }
            return removed_total;
        }

        let mut index = 0u32;
        mesh.faces.retain(|_| {
            let keep = !doomed.contains(&index);
            index += 1;
            keep
        });

        removed_total += doomed.len();
        debug!("Non-manifold pass {}: removed {} faces", pass, doomed.len());
    }

    warn!(
        "Non-manifold resolution hit the pass cap after removing {} faces",
        removed_total
    );
    removed_total
}

/// Drop vertices no face references and renumber the rest.
///
/// Surviving vertices keep their relative order. Returns the number of
/// vertices removed.
pub fn remove_unreferenced_vertices(mesh: &mut Mesh) -> usize {
    let original_count = mesh.vertices.len();

    let mut referenced = vec![false; original_count];
    for face in &mesh.faces {
        for &index in face {
            referenced[index as usize] = true;
        }
    }

    if referenced.iter().all(|&r| r) {
        return 0;
    }

    let mut remap: Vec<u32> = vec![0; original_count];
    let mut kept: Vec<Vertex> = Vec::new();
    for (old_index, vertex) in mesh.vertices.iter().enumerate() {
        if referenced[old_index] {
            remap[old_index] = kept.len() as u32;
            kept.push(*vertex);
        }
    }

    for face in &mut mesh.faces {
        for slot in face.iter_mut() {
            *slot = remap[*slot as usize];
        }
    }

    let removed = original_count - kept.len();
    mesh.vertices = kept;

    info!("Removed {} unreferenced vertices", removed);
    removed
}

/// Run the full repair pipeline on a mesh in place.
///
/// Weld, filter, resolve non-manifold edges, fill holes to convergence,
/// sweep non-manifold edges again (loops sharing vertices can leave
/// freshly-filled fans over-sharing an edge), and compact. Stage names and
/// periodic hole-fill updates go to `progress` when one is attached; the
/// sink is write-only and its absence changes nothing.
pub fn repair_in_place(
    mesh: &mut Mesh,
    options: &RepairOptions,
    progress: Option<&dyn ProgressSink>,
) -> RepairReport {
    let emit = |message: &str| {
        if let Some(sink) = progress {
            sink.status(message);
        }
    };

    let initial_vertices = mesh.vertex_count();
    let initial_faces = mesh.face_count();
    let mut report = RepairReport::default();

    emit("welding");
    report.vertices_merged = weld_vertices(mesh, options.weld_decimals);

    emit("filtering");
    remove_degenerate_triangles(mesh);
    remove_duplicate_triangles(mesh);

    emit("fixing non-manifold");
    report.non_manifold_removed = resolve_non_manifold_edges(mesh, options.max_resolver_passes);

    emit("filling holes");
    report.holes_filled = fill_holes(mesh, options, progress);

    emit("final check");
    report.non_manifold_removed += resolve_non_manifold_edges(mesh, options.max_resolver_passes);

    emit("compacting");
    remove_unreferenced_vertices(mesh);

    info!(
        "Repair complete: {} verts -> {}, {} faces -> {}",
        initial_vertices,
        mesh.vertex_count(),
        initial_faces,
        mesh.face_count()
    );
    report
}

/// Repair a single mesh, leaving the input untouched.
pub fn repair_object(
    mesh: &Mesh,
    options: &RepairOptions,
    progress: Option<&dyn ProgressSink>,
) -> (Mesh, RepairReport) {
    let mut working = mesh.clone();
    let report = repair_in_place(&mut working, options, progress);
    (working, report)
}

/// Repair a single mesh and diagnose the result.
pub fn repair_mesh(
    mesh: &Mesh,
    options: &RepairOptions,
    progress: Option<&dyn ProgressSink>,
) -> (Mesh, RepairReport, Diagnosis) {
    let (repaired, report) = repair_object(mesh, options, progress);
    let diagnosis = diagnose(&repaired);
    (repaired, report, diagnosis)
}

/// A named mesh, as produced by an ingest adapter.
#[derive(Debug, Clone)]
pub struct MeshObject {
    pub id: String,
    pub mesh: Mesh,
}

/// One repaired object together with its report and post-repair diagnosis.
#[derive(Debug, Clone)]
pub struct RepairedObject {
    pub id: String,
    pub mesh: Mesh,
    pub report: RepairReport,
    pub diagnosis: Diagnosis,
}

/// Result of repairing a batch of objects.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub objects: Vec<RepairedObject>,

    /// Element-wise sum of the per-object reports.
    pub total: RepairReport,
}

/// Repair a batch of objects in order.
///
/// Each object gets a `Start` event, `Progress` events forwarding the
/// per-stage status lines, and a `Done` event carrying its report and
/// diagnosis. The batch total is the element-wise sum of per-object reports.
pub fn repair_all(
    objects: Vec<MeshObject>,
    options: &RepairOptions,
    events: Option<&dyn BatchSink>,
) -> BatchOutcome {
    let total_count = objects.len();
    let mut outcome = BatchOutcome {
        objects: Vec::with_capacity(total_count),
        total: RepairReport::default(),
    };

    for (index, object) in objects.into_iter().enumerate() {
        let MeshObject { id, mut mesh } = object;

        if let Some(sink) = events {
            sink.event(&BatchEvent::Start {
                index,
                object_id: id.clone(),
                total: total_count,
                status: format!("repairing {}", id),
            });
        }

        let report = match events {
            Some(sink) => {
                let forward = |message: &str| {
                    sink.event(&BatchEvent::Progress {
                        index,
                        object_id: id.clone(),
                        total: total_count,
                        status: message.to_owned(),
                    });
                };
                repair_in_place(&mut mesh, options, Some(&forward))
            }
            None => repair_in_place(&mut mesh, options, None),
        };
        let diagnosis = diagnose(&mesh);

        outcome.total.absorb(&report);

        if let Some(sink) = events {
            sink.event(&BatchEvent::Done {
                index,
                object_id: id.clone(),
                total: total_count,
                report,
                diagnosis,
                status: "done".to_owned(),
            });
        }

        outcome.objects.push(RepairedObject {
            id,
            mesh,
            report,
            diagnosis,
        });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_from(vertices: &[[f64; 3]], faces: &[[u32; 3]]) -> Mesh {
        let mut mesh = Mesh::with_capacity(vertices.len(), faces.len());
        for &[x, y, z] in vertices {
            mesh.vertices.push(Vertex::from_coords(x, y, z));
        }
        mesh.faces.extend_from_slice(faces);
        mesh
    }

    #[test]
    fn test_weld_collapses_coincident_vertices() {
        let mut mesh = mesh_from(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]],
            &[[0, 1, 2], [3, 1, 2]],
        );

        let merged = weld_vertices(&mut mesh, 6);
        assert_eq!(merged, 1);
        assert_eq!(mesh.vertex_count(), 3);
        // Both faces now reference the representative vertex 0.
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 1, 2]]);
    }

    #[test]
    fn test_weld_respects_quantisation_tolerance() {
        // 4e-7 apart: same key at 6 decimals. 2e-6 apart: distinct keys.
        let mut near = mesh_from(&[[0.0, 0.0, 0.0], [0.0000004, 0.0, 0.0]], &[]);
        assert_eq!(weld_vertices(&mut near, 6), 1);

        let mut far = mesh_from(&[[0.0, 0.0, 0.0], [0.000002, 0.0, 0.0]], &[]);
        assert_eq!(weld_vertices(&mut far, 6), 0);
    }

    #[test]
    fn test_weld_keeps_degenerate_faces_for_filter() {
        // Both endpoints of an edge collapse; the face survives welding.
        let mut mesh = mesh_from(
            &[[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            &[[0, 1, 2]],
        );
        weld_vertices(&mut mesh, 6);
        assert_eq!(mesh.faces, vec![[0, 0, 1]]);
        assert_eq!(remove_degenerate_triangles(&mut mesh), 1);
    }

    #[test]
    fn test_weld_is_idempotent() {
        let mut mesh = mesh_from(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]],
            &[[0, 1, 2], [3, 1, 2]],
        );
        weld_vertices(&mut mesh, 6);
        let welded_once = mesh.clone();

        assert_eq!(weld_vertices(&mut mesh, 6), 0);
        assert_eq!(mesh, welded_once);
    }

    #[test]
    fn test_remove_degenerate_triangles() {
        let mut mesh = mesh_from(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
            &[[0, 1, 1], [0, 1, 2]],
        );
        assert_eq!(remove_degenerate_triangles(&mut mesh), 1);
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_remove_duplicate_triangles_ignores_winding() {
        let mut mesh = mesh_from(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            &[[0, 1, 2], [2, 1, 0], [1, 2, 0]],
        );
        assert_eq!(remove_duplicate_triangles(&mut mesh), 2);
        // First occurrence wins.
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_resolver_keeps_first_two_faces_by_index() {
        // Three faces share edge (0, 1); the last by index loses.
        let mut mesh = mesh_from(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, -1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            &[[0, 1, 2], [0, 1, 3], [0, 1, 4]],
        );

        let removed = resolve_non_manifold_edges(&mut mesh, 100);
        assert_eq!(removed, 1);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 1, 3]]);
    }

    #[test]
    fn test_resolver_leaves_manifold_mesh_alone() {
        let mut mesh = mesh_from(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            &[[0, 1, 2], [0, 1, 3], [1, 2, 3], [0, 2, 3]],
        );
        assert_eq!(resolve_non_manifold_edges(&mut mesh, 100), 0);
        assert_eq!(mesh.face_count(), 4);
    }

    #[test]
    fn test_remove_unreferenced_vertices_renumbers() {
        let mut mesh = mesh_from(
            &[
                [0.0, 0.0, 0.0],
                [9.0, 9.0, 9.0], // orphan
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            &[[0, 2, 3]],
        );

        assert_eq!(remove_unreferenced_vertices(&mut mesh), 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_report_absorb() {
        let mut total = RepairReport::default();
        total.absorb(&RepairReport {
            vertices_merged: 1,
            non_manifold_removed: 2,
            holes_filled: 3,
        });
        total.absorb(&RepairReport {
            vertices_merged: 10,
            non_manifold_removed: 20,
            holes_filled: 30,
        });
        assert_eq!(
            total,
            RepairReport {
                vertices_merged: 11,
                non_manifold_removed: 22,
                holes_filled: 33,
            }
        );
    }

    #[test]
    fn test_options_defaults() {
        let options = RepairOptions::default();
        assert_eq!(options.weld_decimals, 6);
        assert_eq!(options.max_resolver_passes, 100);
        assert_eq!(options.max_fill_iterations, 10_000);
        assert_eq!(options.max_loop_depth, 300);
        assert_eq!(options.stuck_limit, 50);
        assert_eq!(options.progress_interval, 100);
    }

    #[test]
    fn test_repair_object_does_not_mutate_input() {
        let mesh = mesh_from(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]],
            &[[0, 1, 2], [3, 1, 2]],
        );
        let snapshot = mesh.clone();

        let (repaired, report) = repair_object(&mesh, &RepairOptions::default(), None);
        assert_eq!(mesh, snapshot);
        assert_eq!(report.vertices_merged, 1);
        assert_ne!(repaired, mesh);
    }
}
