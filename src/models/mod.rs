// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 模型实现
///
/// ## YOLOv8 (Detect / Pose)
/// - 模型加载 (new) → `OrtBackend`
/// - 预处理 (preprocess): letterbox 左上对齐, 灰色填充
/// - 推理 (run)
/// - 后处理 (postprocess): 置信度过滤 + NMS, 坐标还原到原图
///
/// ```text
/// RGB帧 → preprocess → NCHW张量 → OrtBackend::run → [1, C, N] → postprocess → Vec<Detection>
/// ```
///
/// YOLOv11 / YOLOv5u 导出的 ONNX 输出格式与 YOLOv8 相同, 可直接加载.
pub mod yolov8;

pub use yolov8::{YOLOv8, YOLOv8Config, YOLOv8Postprocessor};
