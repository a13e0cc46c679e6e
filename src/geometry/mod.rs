pub mod cache;
pub mod primitive;

pub use cache::{EntryState, Feature, GeometryCache, GeometryKey, Group};
pub use primitive::{distance, lerp3, Mesh, MeshId, Primitive};
