// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 运行参数 (命令行 + JSON)
pub mod detection; // 检测适配 + 人员过滤
pub mod display; // 预览窗口
pub mod input; // 视频输入与断线重连
pub mod logging;
pub mod models; // YOLOv8 前后处理
pub mod ort_backend;
pub mod pipeline; // 主循环编排
pub mod renderer; // 画面叠加
pub mod telemetry; // 限速遥测发布

pub use crate::config::{Args, CounterConfig, MqttConfig, TransportKind};
pub use crate::detection::{
    BoundingBox, Detect, Detection, DetectionFilter, DetectorAdapter, FilteredDetection,
    FilteredFrame, Keypoint, YoloDetector,
};
pub use crate::input::{Capture, CaptureManager, FfmpegBackend, SourceId, VideoBackend, VideoSource};
pub use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP, YOLOTask};
pub use crate::pipeline::{Clock, Counter, Display, FrameReport, LoopState, SystemClock};
pub use crate::renderer::{Anchor, OverlayRenderer, OverlayStyle, TextPainter};
pub use crate::telemetry::{
    MqttTransport, PublishGate, PublishOutcome, TelemetryPayload, TelemetryPublisher, Transport,
    TransportError,
};

/// 行人类别标签
pub const PERSON_LABEL: &str = "person";

/// 退出按键 (Escape)
pub const EXIT_KEY: i32 = 27;

/// 贪心NMS: 按置信度降序, 剔除与已保留框重叠过大的框
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].bbox.iou(&xs[index].bbox);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// 当前墙钟时间 (秒, Unix纪元)
pub fn wall_clock_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// COCO-17 人体骨架连线
pub const SKELETON: [(usize, usize); 16] = [
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    (5, 6),
    (5, 11),
    (6, 12),
    (11, 12),
    (5, 7),
    (6, 8),
    (7, 9),
    (8, 10),
    (11, 13),
    (12, 14),
    (13, 15),
    (14, 16),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Detection {
        Detection::new(BoundingBox::new(x1, y1, x2, y2), confidence, PERSON_LABEL)
    }

    #[test]
    fn test_nms_drops_overlapping_lower_score() {
        let mut xs = vec![
            det(0.0, 0.0, 10.0, 10.0, 0.6),
            det(1.0, 1.0, 11.0, 11.0, 0.9),
            det(50.0, 50.0, 60.0, 60.0, 0.7),
        ];
        non_max_suppression(&mut xs, 0.45);

        assert_eq!(xs.len(), 2);
        assert_eq!(xs[0].confidence, 0.9);
        assert_eq!(xs[1].confidence, 0.7);
    }

    #[test]
    fn test_nms_empty() {
        let mut xs = Vec::new();
        non_max_suppression(&mut xs, 0.45);
        assert!(xs.is_empty());
    }

    #[test]
    fn test_wall_clock_is_epoch_seconds() {
        // 2020-01-01 之后
        assert!(wall_clock_secs() > 1_577_836_800.0);
    }
}
