//! Collaborator seams for container formats.
//!
//! The container envelope (3MF's ZIP/XML layering, or anything else) lives
//! outside this crate. An ingest adapter produces named vertex/triangle
//! buffers plus an opaque passthrough payload; an emit adapter consumes the
//! repaired objects and the payload, untouched. [`repair_container`] wires
//! the two around a batch repair.

use crate::error::RepairResult;
use crate::progress::BatchSink;
use crate::repair::{MeshObject, RepairOptions, RepairReport, RepairedObject, repair_all};

/// Everything an ingest adapter recovered from a container.
#[derive(Debug)]
pub struct IngestBundle<P> {
    /// The meshes to repair, in container order.
    pub objects: Vec<MeshObject>,

    /// Container payload the repair pipeline carries through untouched.
    pub passthrough: P,
}

/// Produces mesh objects from some container.
pub trait MeshIngest {
    /// Opaque payload handed back to the matching emit adapter.
    type Passthrough;

    fn ingest(&mut self) -> RepairResult<IngestBundle<Self::Passthrough>>;
}

/// Consumes repaired mesh objects and re-emits a container.
pub trait MeshEmit {
    type Passthrough;

    fn emit(
        &mut self,
        objects: &[RepairedObject],
        passthrough: Self::Passthrough,
    ) -> RepairResult<()>;
}

/// Ingest a container, repair every object, and emit the result.
///
/// The passthrough payload flows from ingest to emit without inspection.
/// Returns the batch total report.
pub fn repair_container<I, E, P>(
    ingest: &mut I,
    emit: &mut E,
    options: &RepairOptions,
    events: Option<&dyn BatchSink>,
) -> RepairResult<RepairReport>
where
    I: MeshIngest<Passthrough = P>,
    E: MeshEmit<Passthrough = P>,
{
    let bundle = ingest.ingest()?;
    let outcome = repair_all(bundle.objects, options, events);
    emit.emit(&outcome.objects, bundle.passthrough)?;
    Ok(outcome.total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mesh, Vertex};

    /// Ingest adapter backed by a vector, standing in for a real container.
    struct VecIngest {
        objects: Vec<MeshObject>,
        payload: &'static str,
    }

    impl MeshIngest for VecIngest {
        type Passthrough = &'static str;

        fn ingest(&mut self) -> RepairResult<IngestBundle<&'static str>> {
            Ok(IngestBundle {
                objects: std::mem::take(&mut self.objects),
                passthrough: self.payload,
            })
        }
    }

    #[derive(Default)]
    struct VecEmit {
        ids: Vec<String>,
        payload: Option<&'static str>,
    }

    impl MeshEmit for VecEmit {
        type Passthrough = &'static str;

        fn emit(
            &mut self,
            objects: &[RepairedObject],
            passthrough: &'static str,
        ) -> RepairResult<()> {
            self.ids = objects.iter().map(|o| o.id.clone()).collect();
            self.payload = Some(passthrough);
            Ok(())
        }
    }

    fn lone_triangle() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        mesh
    }

    #[test]
    fn test_repair_container_preserves_passthrough() {
        let mut ingest = VecIngest {
            objects: vec![
                MeshObject {
                    id: "a".to_owned(),
                    mesh: lone_triangle(),
                },
                MeshObject {
                    id: "b".to_owned(),
                    mesh: lone_triangle(),
                },
            ],
            payload: "thumbnail-and-metadata",
        };
        let mut emit = VecEmit::default();

        let total =
            repair_container(&mut ingest, &mut emit, &RepairOptions::default(), None).unwrap();

        assert_eq!(emit.ids, vec!["a", "b"]);
        assert_eq!(emit.payload, Some("thumbnail-and-metadata"));
        assert_eq!(total, RepairReport::default());
    }
}
