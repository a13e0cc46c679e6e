pub mod connections;
pub mod point;
pub mod set;

pub use connections::{
    DUPLICATE_POSE_LANDMARKS, FACE_LEFT_EYE, FACE_LEFT_EYEBROW, FACE_LIPS, FACE_OVAL,
    FACE_RIGHT_EYE, FACE_RIGHT_EYEBROW, HAND_CONNECTIONS, POSE_CONNECTIONS,
};
pub use point::{Landmark, PoseLandmarkIndex};
pub use set::{
    strip_duplicates, HandLandmarks, HolisticResult, PoseLandmarks, Side, FACE_LANDMARK_COUNT,
    HAND_LANDMARK_COUNT,
};
