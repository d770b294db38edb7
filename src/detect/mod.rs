mod backend;
pub mod heuristics;
pub mod learned;
mod result;
mod shared;

pub use backend::FrameDetector;
pub use heuristics::{AreaScoring, FireDetector, OilLeakDetector, SmokeDetector};
pub use learned::{InferenceModel, LearnedDetector, ModelLoader, RawDetection};
pub use result::{BoundingBox, Detection, DetectionMethod, HazardClass};
pub use shared::SharedDetector;
