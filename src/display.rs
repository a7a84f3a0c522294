// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 预览窗口 (macroquad)
//! 可缩放窗口, 帧按比例居中显示; Esc 或关闭窗口 → 退出键 27

use image::RgbImage;
use macroquad::prelude::*;
use tracing::info;

use crate::pipeline::Display;
use crate::EXIT_KEY;

pub const WINDOW_TITLE: &str = "YOLOv8";

/// 窗口配置
pub fn window_conf() -> Conf {
    Conf {
        window_title: WINDOW_TITLE.to_string(),
        window_width: 1280,
        window_height: 720,
        window_resizable: true,
        high_dpi: false,
        ..Default::default()
    }
}

/// 按键 → 键码, Esc 映射为 27
pub fn key_code(key: KeyCode) -> i32 {
    match key {
        KeyCode::Escape => EXIT_KEY,
        other => other as i32,
    }
}

/// 等比缩放居中: (x, y, w, h)
pub fn fit_rect(frame_w: f32, frame_h: f32, screen_w: f32, screen_h: f32) -> (f32, f32, f32, f32) {
    if frame_w <= 0.0 || frame_h <= 0.0 {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let scale = (screen_w / frame_w).min(screen_h / frame_h);
    let (w, h) = (frame_w * scale, frame_h * scale);
    ((screen_w - w) / 2.0, (screen_h - h) / 2.0, w, h)
}

pub struct WindowDisplay {
    texture: Option<Texture2D>,
    rgba: Vec<u8>,
}

impl WindowDisplay {
    /// 必须在 macroquad 主循环内创建
    pub fn new() -> Self {
        prevent_quit();
        Self {
            texture: None,
            rgba: Vec::new(),
        }
    }

    fn upload(&mut self, frame: &RgbImage) {
        self.rgba.clear();
        self.rgba
            .extend(frame.pixels().flat_map(|p| [p[0], p[1], p[2], 255]));

        let (w, h) = (frame.width() as u16, frame.height() as u16);
        // 只在分辨率变化时重建纹理
        match &self.texture {
            Some(tex) if tex.width() == w as f32 && tex.height() == h as f32 => {
                tex.update(&Image {
                    bytes: self.rgba.clone(),
                    width: w,
                    height: h,
                });
            }
            _ => {
                let texture = Texture2D::from_rgba8(w, h, &self.rgba);
                texture.set_filter(FilterMode::Linear);
                self.texture = Some(texture);
            }
        }
    }
}

impl Display for WindowDisplay {
    async fn present(&mut self, frame: &RgbImage) -> Option<i32> {
        self.upload(frame);

        clear_background(BLACK);
        if let Some(texture) = &self.texture {
            let (x, y, w, h) = fit_rect(texture.width(), texture.height(), screen_width(), screen_height());
            draw_texture_ex(
                texture,
                x,
                y,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(w, h)),
                    ..Default::default()
                },
            );
        }

        let key = if is_quit_requested() {
            Some(EXIT_KEY)
        } else {
            get_last_key_pressed().map(key_code)
        };
        next_frame().await;
        key
    }

    fn close(&mut self) {
        self.texture = None;
        info!("🪟 窗口已关闭");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_maps_to_exit() {
        assert_eq!(key_code(KeyCode::Escape), 27);
        assert_ne!(key_code(KeyCode::Q), 27);
    }

    #[test]
    fn test_fit_rect_letterbox() {
        // 16:9 帧放进 4:3 窗口 → 上下留黑
        let (x, y, w, h) = fit_rect(1280.0, 720.0, 800.0, 600.0);
        assert_eq!((x, w), (0.0, 800.0));
        assert_eq!(h, 450.0);
        assert_eq!(y, 75.0);
    }

    #[test]
    fn test_fit_rect_degenerate() {
        assert_eq!(fit_rect(0.0, 10.0, 100.0, 100.0), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_window_conf() {
        let conf = window_conf();
        assert_eq!(conf.window_title, "YOLOv8");
        assert!(conf.window_resizable);
    }
}
