pub mod face;
pub mod skeleton;
pub mod smooth;

pub use face::{compute_normals, FaceReconstructor, FaceTopology};
pub use skeleton::{
    BoneUpdate, OffsetUpdate, RibbonUpdate, SkeletonReconstructor, SkeletonUpdate,
};
pub use smooth::TemporalSmoother;
