//! Boundary loop discovery and hole filling.
//!
//! The boundary of an open mesh forms a directed graph of half-edges. Loop
//! discovery walks that graph looking for simple cycles; each cycle is
//! closed with a centroid fan. When the graph is too tangled for cycles, a
//! T-junction splice bridges a forked vertex so the next extraction sees a
//! simpler boundary.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use tracing::{debug, info, warn};

use crate::adjacency::{HalfEdge, boundary_half_edges};
use crate::repair::{RepairOptions, sorted_triple};
use crate::progress::ProgressSink;
use crate::{Mesh, Vertex};

/// A closed run of boundary half-edges.
#[derive(Debug, Clone)]
pub struct BoundaryLoop {
    /// Vertex indices in walk order; consecutive pairs (and last back to
    /// first) are boundary half-edges.
    pub vertices: Vec<u32>,
}

impl BoundaryLoop {
    /// Number of edges (and vertices) in the loop.
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Discover edge-disjoint directed cycles in a boundary half-edge list.
///
/// Half-edges are seeded in input order. Each seed is marked used before the
/// search explores from it, and outgoing edges are marked used as they are
/// taken, never unmarked, even when a branch dead-ends. Edges consumed by a
/// failed branch are therefore stranded for this call; the caller's junction
/// fallback and stall detector pick up whatever remains. Search paths are
/// capped at `max_depth` vertices and the first cycle of at least three
/// vertices closes a loop.
///
/// Loops come back sorted shortest-first: closing small pockets first tends
/// not to disturb larger boundaries.
pub fn find_loops(boundary: &[HalfEdge], max_depth: usize) -> Vec<BoundaryLoop> {
    let mut outgoing: HashMap<u32, Vec<(u32, usize)>> = HashMap::new();
    for (index, edge) in boundary.iter().enumerate() {
        outgoing.entry(edge.from).or_default().push((edge.to, index));
    }

    let mut used = vec![false; boundary.len()];
    let mut loops = Vec::new();

    for (seed, edge) in boundary.iter().enumerate() {
        if used[seed] {
            continue;
        }
        used[seed] = true;

        if let Some(vertices) = trace_cycle(edge, &outgoing, &mut used, max_depth) {
            loops.push(BoundaryLoop { vertices });
        }
    }

    loops.sort_by_key(BoundaryLoop::edge_count);

    if !loops.is_empty() {
        debug!(
            "Found {} boundary loops, sizes: {:?}",
            loops.len(),
            loops.iter().map(BoundaryLoop::edge_count).collect::<Vec<_>>()
        );
    }
    loops
}

/// Depth-first search from `edge.to` back to `edge.from`.
///
/// Explicit stack: the recursion can run as deep as the path cap, and a
/// single reusable path buffer beats per-branch allocation.
fn trace_cycle(
    edge: &HalfEdge,
    outgoing: &HashMap<u32, Vec<(u32, usize)>>,
    used: &mut [bool],
    max_depth: usize,
) -> Option<Vec<u32>> {
    let origin = edge.from;
    let mut path: Vec<u32> = vec![origin, edge.to];
    // Each frame is (vertex, next out-slot to try).
    let mut frames: Vec<(u32, usize)> = vec![(edge.to, 0)];

    while !frames.is_empty() {
        let top = frames.len() - 1;
        let (vertex, cursor) = frames[top];
        let slots = outgoing.get(&vertex).map(Vec::as_slice).unwrap_or(&[]);

        if cursor >= slots.len() {
            frames.pop();
            path.pop();
            continue;
        }
        frames[top].1 += 1;

        let (target, edge_index) = slots[cursor];
        if used[edge_index] {
            continue;
        }

        if target == origin {
            used[edge_index] = true;
            if path.len() >= 3 {
                return Some(path);
            }
            // A two-edge round trip is not a loop; the closing edge stays
            // consumed.
            continue;
        }

        if path.len() < max_depth {
            used[edge_index] = true;
            path.push(target);
            frames.push((target, 0));
        }
        // At the depth cap the edge is left for a later seed.
    }

    None
}

/// Triangulate a boundary loop, returning whether anything was added.
///
/// A 3-loop closes with its own triangle, unless that triangle is already
/// in the face list, which happens when a lone triangle's back side reads as
/// a 3-loop; duplicating it would re-break the mesh, so such a loop is
/// reported unfillable. Longer loops get a centroid fan: one new vertex at
/// the loop centroid and one triangle per boundary edge, so every edge of
/// the loop is consumed exactly once.
fn fill_loop(mesh: &mut Mesh, ring: &BoundaryLoop) -> bool {
    let vertices = &ring.vertices;
    let n = vertices.len();
    if n < 3 {
        return false;
    }

    if n == 3 {
        let candidate = [vertices[0], vertices[1], vertices[2]];
        let triple = sorted_triple(candidate);
        if mesh.faces.iter().any(|&face| sorted_triple(face) == triple) {
            debug!("3-loop already backed by a face; leaving it open");
            return false;
        }
        mesh.faces.push(candidate);
        return true;
    }

    let mut sum = Vector3::zeros();
    for &index in vertices {
        sum += mesh.vertices[index as usize].position.coords;
    }
    let centroid = Point3::from(sum / n as f64);
    let center = mesh.push_vertex(Vertex::new(centroid));

    for i in 0..n {
        mesh.faces.push([vertices[i], vertices[(i + 1) % n], center]);
    }
    debug!("Filled {}-edge loop with a centroid fan", n);
    true
}

/// Bridge a forked boundary vertex with a single triangle.
///
/// Scans boundary order for a vertex with two or more outgoing half-edges,
/// then for one with two or more incoming. The spliced triangle's winding
/// can disagree with the surrounding surface; that is accepted, and the
/// manifold sweep after hole filling keeps the topology legal.
fn splice_junction(mesh: &mut Mesh, boundary: &[HalfEdge]) -> bool {
    let mut outgoing: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut incoming: HashMap<u32, Vec<u32>> = HashMap::new();
    for edge in boundary {
        outgoing.entry(edge.from).or_default().push(edge.to);
        incoming.entry(edge.to).or_default().push(edge.from);
    }

    for edge in boundary {
        let outs = &outgoing[&edge.from];
        if outs.len() >= 2 {
            mesh.faces.push([edge.from, outs[1], outs[0]]);
            debug!("Spliced outgoing junction at vertex {}", edge.from);
            return true;
        }
    }

    for edge in boundary {
        let ins = &incoming[&edge.to];
        if ins.len() >= 2 {
            mesh.faces.push([edge.to, ins[0], ins[1]]);
            debug!("Spliced incoming junction at vertex {}", edge.to);
            return true;
        }
    }

    false
}

/// Fill at most one hole: the shortest closable loop, else a junction
/// splice.
///
/// One fill per call, because any fill can reshape the rest of the boundary;
/// the caller re-extracts before trying again.
fn fill_one(mesh: &mut Mesh, boundary: &[HalfEdge], max_depth: usize) -> bool {
    for ring in find_loops(boundary, max_depth) {
        if fill_loop(mesh, &ring) {
            return true;
        }
    }
    splice_junction(mesh, boundary)
}

/// Fill boundary holes until the mesh closes or progress stalls.
///
/// Each iteration re-extracts the boundary, measures it against the previous
/// iteration (a boundary that refuses to shrink `stuck_limit` times in a row
/// ends the loop), and fills at most one hole. The periodic status emission
/// doubles as the cooperative yield point for hosts driving many meshes; in
/// this synchronous implementation it is just the emission.
///
/// Returns the number of loop fills and junction splices performed.
pub fn fill_holes(
    mesh: &mut Mesh,
    options: &RepairOptions,
    progress: Option<&dyn ProgressSink>,
) -> usize {
    let mut filled = 0usize;
    let mut previous_boundary = usize::MAX;
    let mut stuck = 0usize;

    for iteration in 0..options.max_fill_iterations {
        let boundary = boundary_half_edges(&mesh.faces);
        if boundary.is_empty() {
            break;
        }

        if iteration % options.progress_interval == 0 {
            if let Some(sink) = progress {
                sink.status(&format!(
                    "filling holes: {} done, {} remaining",
                    filled,
                    boundary.len()
                ));
            }
        }

        if boundary.len() >= previous_boundary {
            stuck += 1;
            if stuck > options.stuck_limit {
                warn!(
                    "Hole filling stalled with {} boundary edges left",
                    boundary.len()
                );
                break;
            }
        } else {
            stuck = 0;
        }
        previous_boundary = boundary.len();

        if fill_one(mesh, &boundary, options.max_loop_depth) {
            filled += 1;
        } else {
            debug!(
                "No fillable loop or junction; {} boundary edges left",
                boundary.len()
            );
            break;
        }
    }

    if filled > 0 {
        info!("Filled {} holes", filled);
    }
    filled
}
