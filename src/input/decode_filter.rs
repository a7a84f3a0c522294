// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// FFmpeg解码过滤器模块
/// FFmpeg decode filter: RGB24 帧 → 主循环
use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use std::time::Instant;
use tracing::{debug, info};

/// 解码过滤器: 每个解码帧拷贝为 RgbImage 后投递到通道
///
/// 上游需配置 `format=rgb24` 滤镜.
#[derive(Clone)]
pub struct DecodeFilter {
    pub tx: Sender<RgbImage>,
    pub count: usize,
    pub last: Instant,
    pub current_fps: f64,
}

impl DecodeFilter {
    pub fn new(tx: Sender<RgbImage>) -> Self {
        Self {
            tx,
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
        }
    }
}

/// 按行拷贝 (去掉 linesize 对齐填充)
pub fn copy_packed_rgb(src: &[u8], width: usize, height: usize, stride: usize) -> Option<RgbImage> {
    let row = width * 3;
    if stride < row || src.len() < stride * height.saturating_sub(1) + row {
        return None;
    }
    let mut rgb = Vec::with_capacity(row * height);
    for y in 0..height {
        rgb.extend_from_slice(&src[y * stride..y * stride + row]);
    }
    RgbImage::from_raw(width as u32, height as u32, rgb)
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        info!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        let image = unsafe {
            if frame.as_ptr().is_null() {
                return Ok(Some(frame));
            }

            let av = &*frame.as_ptr();
            let (w, h) = (av.width as usize, av.height as usize);
            let stride = av.linesize[0] as usize;
            if av.data[0].is_null() || w == 0 || h == 0 || av.linesize[0] <= 0 {
                return Ok(Some(frame));
            }
            let plane = std::slice::from_raw_parts(av.data[0], stride * (h - 1) + w * 3);
            copy_packed_rgb(plane, w, h, stride)
        };

        self.count += 1;
        if self.last.elapsed().as_secs_f64() >= 1.0 {
            self.current_fps = self.count as f64 / self.last.elapsed().as_secs_f64();
            debug!("📺 解码统计: {}帧 | {:.1}fps", self.count, self.current_fps);
            self.last = Instant::now();
            self.count = 0;
        }

        if let Some(image) = image {
            // 队列满时丢弃新帧, 不阻塞解码线程
            let _ = self.tx.try_send(image);
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        info!("✅ 解码线程退出");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_strips_padding() {
        // 2x2 RGB, 每行填充到8字节
        let src = vec![
            1, 2, 3, 4, 5, 6, 0, 0, //
            7, 8, 9, 10, 11, 12,
        ];
        let img = copy_packed_rgb(&src, 2, 2, 8).unwrap();
        assert_eq!(img.as_raw(), &vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_copy_rejects_short_buffer() {
        assert!(copy_packed_rgb(&[0u8; 5], 2, 1, 6).is_none());
        assert!(copy_packed_rgb(&[0u8; 12], 2, 2, 4).is_none());
    }
}
