// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 文字绘制: 字形级测量 + 锚点对齐 (支持中文字体)

use std::path::Path;

use ab_glyph::{FontArc, FontRef, FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

/// 文字锚点: 给定坐标对应文字包围盒的哪个角
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Anchor {
    /// 锚点坐标 + 文字尺寸 → 左上角绘制坐标
    pub fn origin(self, (x, y): (i32, i32), (w, h): (u32, u32)) -> (i32, i32) {
        let (w, h) = (w as i32, h as i32);
        match self {
            Anchor::TopLeft => (x, y),
            Anchor::TopRight => (x - w, y),
            Anchor::BottomLeft => (x, y - h),
            Anchor::BottomRight => (x - w, y - h),
        }
    }
}

/// 内置拉丁字体 (DejaVu Sans), 外部字体缺失时使用; 不含中文字形
static BUILTIN_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// 持有字体的文字绘制器
pub struct TextPainter {
    font: FontArc,
}

impl TextPainter {
    pub fn new(font: FontArc) -> Self {
        Self { font }
    }

    /// 内置字体
    pub fn builtin() -> Result<Self> {
        let font = FontRef::try_from_slice(BUILTIN_FONT).context("内置字体损坏")?;
        Ok(Self::new(FontArc::new(font)))
    }

    /// 加载字体文件 (.ttf/.otf/.ttc, 集合字体取第一个)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).with_context(|| format!("读取字体失败: {}", path.display()))?;
        let font = FontVec::try_from_vec_and_index(data, 0)
            .with_context(|| format!("字体格式无效: {}", path.display()))?;
        Ok(Self::new(FontArc::new(font)))
    }

    /// 按实际字形测量文字尺寸 (宽, 高)
    pub fn measure(&self, text: &str, size: f32) -> (u32, u32) {
        text_size(PxScale::from(size), &self.font, text)
    }

    /// 在锚点处绘制文字
    pub fn draw(
        &self,
        canvas: &mut RgbImage,
        text: &str,
        at: (i32, i32),
        anchor: Anchor,
        size: f32,
        color: Rgb<u8>,
    ) {
        let (x, y) = anchor.origin(at, self.measure(text, size));
        draw_text_mut(canvas, color, x, y, PxScale::from(size), &self.font, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_origin() {
        let at = (100, 50);
        let size = (30, 10);
        assert_eq!(Anchor::TopLeft.origin(at, size), (100, 50));
        assert_eq!(Anchor::TopRight.origin(at, size), (70, 50));
        assert_eq!(Anchor::BottomLeft.origin(at, size), (100, 40));
        assert_eq!(Anchor::BottomRight.origin(at, size), (70, 40));
    }

    #[test]
    fn test_load_missing_font() {
        assert!(TextPainter::load("/nonexistent/font.ttc").is_err());
    }

    #[test]
    fn test_builtin_font_measures_latin() {
        let painter = TextPainter::builtin().unwrap();
        let (w, h) = painter.measure("FPS=30", 28.0);
        assert!(w > 0 && h > 0);
        // 越长越宽
        assert!(painter.measure("FPS=300", 28.0).0 > w);
    }
}
