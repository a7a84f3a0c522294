// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 人数统计数据结构定义
/// Data structures for the people counter

// ========== 数据结构 ==========

/// 检测框 (像素坐标, 左上 + 右下)
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// 由中心点 + 宽高构造
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2., cy - h / 2., cx + w / 2., cy + h / 2.)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// 限制在图像范围内
    pub fn clamp(&self, width: f32, height: f32) -> Self {
        Self::new(
            self.x1.clamp(0.0, width),
            self.y1.clamp(0.0, height),
            self.x2.clamp(0.0, width),
            self.y2.clamp(0.0, height),
        )
    }

    pub fn intersection_area(&self, another: &BoundingBox) -> f32 {
        let l = self.x1.max(another.x1);
        let r = self.x2.min(another.x2);
        let t = self.y1.max(another.y1);
        let b = self.y2.min(another.y2);
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn iou(&self, another: &BoundingBox) -> f32 {
        let union = self.area() + another.area() - self.intersection_area(another);
        if union <= 0.0 {
            return 0.0;
        }
        self.intersection_area(another) / union
    }
}

/// 姿态关键点 (x, y, 置信度)
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

/// 单帧中的一个检测结果, 产出后不可变
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_label: String,
    /// 姿态模型才有, 按 COCO-17 顺序
    pub keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32, class_label: impl Into<String>) -> Self {
        Self {
            bbox,
            confidence,
            class_label: class_label.into(),
            keypoints: Vec::new(),
        }
    }

    pub fn with_keypoints(mut self, keypoints: Vec<Keypoint>) -> Self {
        self.keypoints = keypoints;
        self
    }
}

/// 通过过滤的行人
///
/// `display_id` 只是本帧内的序号 (从1开始, 按检测器输出顺序),
/// 不代表跨帧身份.
#[derive(Clone, Debug, PartialEq)]
pub struct FilteredDetection {
    pub detection: Detection,
    pub display_id: usize,
}

/// 单帧过滤结果: `count == people.len()`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilteredFrame {
    pub people: Vec<FilteredDetection>,
    pub count: usize,
}

impl FilteredFrame {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
