// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测器 (Detector)
//! 职责: 原始帧 → 外部检测模型 → 检测结果序列

use anyhow::Result;
use image::RgbImage;
use tracing::{info, warn};

use super::types::Detection;
use crate::models::{YOLOv8, YOLOv8Config};

/// 外部检测模型接口
///
/// 只读取帧, 不得修改; 阈值以下的目标由模型自行过滤.
pub trait Detect {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>>;

    /// 类别id → 标签
    fn class_names(&self) -> &[String];
}

/// YOLOv8 (ONNX Runtime) 检测器
pub struct YoloDetector {
    model: YOLOv8,
}

impl YoloDetector {
    pub fn new(config: YOLOv8Config) -> Result<Self> {
        let model = YOLOv8::new(config)?;
        info!("📦 {}", model.summary());
        info!("🏷️ 类别: {:?}", model.names());
        Ok(Self { model })
    }
}

impl Detect for YoloDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        self.model.run(frame)
    }

    fn class_names(&self) -> &[String] {
        self.model.names()
    }
}

/// 检测适配器
///
/// 检测器报错时按空帧处理 (记录日志, 返回空序列), 主循环继续.
pub struct DetectorAdapter<D> {
    inner: D,
    failures: u64,
}

impl<D: Detect> DetectorAdapter<D> {
    pub fn new(inner: D) -> Self {
        Self { inner, failures: 0 }
    }

    pub fn detect(&mut self, frame: &RgbImage) -> Vec<Detection> {
        match self.inner.detect(frame) {
            Ok(detections) => detections,
            Err(e) => {
                self.failures += 1;
                warn!("⚠️ 检测失败 (第{}次), 按空帧处理: {:#}", self.failures, e);
                Vec::new()
            }
        }
    }

    /// 累计失败次数
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn class_names(&self) -> &[String] {
        self.inner.class_names()
    }
}
