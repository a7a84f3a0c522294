// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 画面叠加渲染 (Overlay Renderer)
//!
//! 检测框 + 编号 + 置信度 + 姿态骨架, 右上角 FPS 与人数.
//! 纯装饰: 不返回错误, 不影响计数与遥测.

pub mod text;

use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use tracing::{info, warn};

use crate::detection::{FilteredDetection, FilteredFrame, Keypoint};
use crate::SKELETON;
pub use text::{Anchor, TextPainter};

// ========== 颜色 (RGB) ==========

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const CONF_COLOR: Rgb<u8> = Rgb([255, 165, 0]);
const FPS_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const COUNT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const KEYPOINT_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const LIMB_COLOR: Rgb<u8> = Rgb([0, 200, 255]);

/// 叠加样式
#[derive(Debug, Clone)]
pub struct OverlayStyle {
    /// 人员编号前缀, 如 `pson1`
    pub label_prefix: String,
    /// 人数标签, 如 `偵測人數`
    pub count_label: String,
    pub text_size: f32,
    pub count_size: f32,
    /// 距右边缘
    pub margin: i32,
    /// FPS 文字基线
    pub fps_baseline: i32,
    /// 人数文字顶部
    pub count_top: i32,
    pub box_thickness: u32,
    pub keypoint_conf: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            label_prefix: "pson".to_string(),
            count_label: "偵測人數".to_string(),
            text_size: 28.0,
            count_size: 40.0,
            margin: 20,
            fps_baseline: 50,
            count_top: 100,
            box_thickness: 2,
            keypoint_conf: 0.5,
        }
    }
}

/// 叠加渲染器
pub struct OverlayRenderer {
    painter: Option<TextPainter>,
    style: OverlayStyle,
}

impl OverlayRenderer {
    pub fn new(painter: Option<TextPainter>, style: OverlayStyle) -> Self {
        Self { painter, style }
    }

    /// 加载字体; 失败时退回内置拉丁字体 (中文字形缺失, 其余照常)
    pub fn with_font(font_path: Option<&Path>, style: OverlayStyle) -> Self {
        let loaded = match font_path.map(TextPainter::load) {
            Some(Ok(painter)) => {
                info!("✅ 字体加载成功");
                Some(painter)
            }
            Some(Err(e)) => {
                warn!("⚠️ 找不到指定字体, 使用内置字体: {:#}", e);
                None
            }
            None => {
                warn!("⚠️ 未配置字体, 使用内置字体");
                None
            }
        };
        let painter = loaded.or_else(|| match TextPainter::builtin() {
            Ok(painter) => Some(painter),
            Err(e) => {
                warn!("⚠️ 内置字体不可用, 文字将不显示: {:#}", e);
                None
            }
        });
        Self::new(painter, style)
    }

    pub fn has_font(&self) -> bool {
        self.painter.is_some()
    }

    /// 完整叠加, 返回同一缓冲区
    pub fn render<'a>(
        &self,
        frame: &'a mut RgbImage,
        filtered: &FilteredFrame,
        fps: u32,
    ) -> &'a mut RgbImage {
        self.draw_detections(frame, &filtered.people);
        self.draw_readouts(frame, filtered.count, fps);
        frame
    }

    /// 检测框 + 编号 (框左上方) + 置信度 (框右上方右对齐) + 骨架
    pub fn draw_detections(&self, frame: &mut RgbImage, people: &[FilteredDetection]) {
        for person in people {
            let bbox = &person.detection.bbox;
            self.draw_box(frame, bbox.x1, bbox.y1, bbox.x2, bbox.y2);
            self.draw_pose(frame, &person.detection.keypoints);

            if let Some(painter) = &self.painter {
                let label = format!("{}{}", self.style.label_prefix, person.display_id);
                let top_left = (bbox.x1 as i32, bbox.y1 as i32);
                let top_right = (bbox.x2 as i32, bbox.y1 as i32);
                painter.draw(
                    frame,
                    &label,
                    top_left,
                    Anchor::BottomLeft,
                    self.style.text_size,
                    LABEL_COLOR,
                );
                painter.draw(
                    frame,
                    &format!("{:.2}", person.detection.confidence),
                    top_right,
                    Anchor::BottomRight,
                    self.style.text_size,
                    CONF_COLOR,
                );
            }
        }
    }

    /// 右上角: FPS 在上, 人数在下, 均按测量宽度右对齐
    pub fn draw_readouts(&self, frame: &mut RgbImage, count: usize, fps: u32) {
        let Some(painter) = &self.painter else {
            return;
        };
        let right = frame.width() as i32 - self.style.margin;

        painter.draw(
            frame,
            &format!("FPS={}", fps),
            (right, self.style.fps_baseline),
            Anchor::BottomRight,
            self.style.text_size,
            FPS_COLOR,
        );
        painter.draw(
            frame,
            &format!("{}: {}", self.style.count_label, count),
            (right, self.style.count_top),
            Anchor::TopRight,
            self.style.count_size,
            COUNT_COLOR,
        );
    }

    fn draw_box(&self, frame: &mut RgbImage, x1: f32, y1: f32, x2: f32, y2: f32) {
        let (x, y) = (x1.round() as i32, y1.round() as i32);
        let w = (x2 - x1).round().max(1.0) as u32;
        let h = (y2 - y1).round().max(1.0) as u32;
        for t in 0..self.style.box_thickness {
            if w <= 2 * t || h <= 2 * t {
                break;
            }
            let rect = Rect::at(x + t as i32, y + t as i32).of_size(w - 2 * t, h - 2 * t);
            draw_hollow_rect_mut(frame, rect, BOX_COLOR);
        }
    }

    fn draw_pose(&self, frame: &mut RgbImage, keypoints: &[Keypoint]) {
        let visible = |k: &Keypoint| k.confidence >= self.style.keypoint_conf;

        for &(a, b) in SKELETON.iter() {
            if let (Some(ka), Some(kb)) = (keypoints.get(a), keypoints.get(b)) {
                if visible(ka) && visible(kb) {
                    draw_line_segment_mut(frame, (ka.x, ka.y), (kb.x, kb.y), LIMB_COLOR);
                }
            }
        }
        for k in keypoints.iter().filter(|k| visible(k)) {
            draw_filled_circle_mut(frame, (k.x as i32, k.y as i32), 3, KEYPOINT_COLOR);
        }
    }
}
