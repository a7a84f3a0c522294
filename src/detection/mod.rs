// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测系统 (Detection System)
///
/// - Detector: 外部模型适配 (失败按空帧处理)
/// - Filter:   行人过滤 + 本帧编号 + 计数
pub mod detector;
pub mod filter;
pub mod types;

pub use detector::{Detect, DetectorAdapter, YoloDetector};
pub use filter::DetectionFilter;
pub use types::{BoundingBox, Detection, FilteredDetection, FilteredFrame, Keypoint};
