// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 视频输入系统 (Video Input System)
///
/// - Source:  视频源抽象 (地址 / 设备编号)
/// - Decoder: FFmpeg 拉流解码 (HTTP/RTSP/本地摄像头)
/// - Filter:  解码帧 → RGB24 → 通道
/// - Capture: 读取失败冷却重连 (无限重试)
pub mod capture;
pub mod decode_filter;
pub mod decoder;
pub mod source;

pub use capture::{Capture, CaptureManager};
pub use decode_filter::DecodeFilter;
pub use decoder::{FfmpegBackend, FfmpegSource};
pub use source::{SourceId, VideoBackend, VideoSource};
