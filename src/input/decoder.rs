// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 视频流拉取解码器 (FFmpeg)
/// 支持: HTTP/MJPEG (ESP32-CAM) / RTSP / 本地摄像头 (DirectShow/AVFoundation/V4L2)
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbImage;
use tracing::{info, warn};

use super::decode_filter::DecodeFilter;
use super::source::{SourceId, VideoBackend, VideoSource};

/// 帧队列长度, 读取时只取最新一帧
const FRAME_QUEUE: usize = 4;

/// FFmpeg 视频源工厂
pub struct FfmpegBackend {
    read_timeout: Duration,
}

impl FfmpegBackend {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }

    /// 格式化摄像头输入 - 根据平台选择
    fn camera_input(index: usize) -> Input {
        #[cfg(target_os = "windows")]
        {
            // dshow 需要设备名称
            let name = match ez_ffmpeg::device::get_input_video_devices() {
                Ok(devices) => devices.into_iter().nth(index),
                Err(e) => {
                    warn!("⚠️ 获取摄像头列表失败: {}", e);
                    None
                }
            };
            let name = name.unwrap_or_else(|| index.to_string());
            Input::new(format!("video={}", name)).set_format("dshow")
        }
        #[cfg(target_os = "macos")]
        {
            Input::new(format!("{}", index)).set_format("avfoundation")
        }
        #[cfg(target_os = "linux")]
        {
            Input::new(format!("/dev/video{}", index)).set_format("v4l2")
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            Input::new(format!("{}", index)).set_format("video4linux2")
        }
    }

    fn stream_input(uri: &str) -> Input {
        if uri.starts_with("rtsp://") {
            Input::new(uri).set_input_opts(
                [("rtsp_transport", "tcp"), ("rtsp_flags", "prefer_tcp")].into(),
            )
        } else {
            Input::new(uri)
        }
    }
}

impl VideoBackend for FfmpegBackend {
    type Source = FfmpegSource;

    fn open(&mut self, source: &SourceId) -> Result<FfmpegSource> {
        let input = match source {
            SourceId::Device(index) => Self::camera_input(*index),
            SourceId::Uri(uri) => Self::stream_input(uri),
        };

        let (tx, rx) = bounded::<RgbImage>(FRAME_QUEUE);
        let filter = DecodeFilter::new(tx);

        // 构建帧处理管线
        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("decode", Box::new(filter));
        let out = create_null_output().add_frame_pipeline(pipe);

        let ctx = FfmpegContext::builder()
            .input(input)
            .filter_desc("format=rgb24")
            .output(out)
            .build()
            .map_err(|e| anyhow!("构建失败 ({}): {}", source, e))?;

        let sch = ctx
            .start()
            .map_err(|e| anyhow!("启动失败 ({}): {}", source, e))?;

        info!("✅ 视频源已打开: {}", source);

        Ok(FfmpegSource {
            rx,
            read_timeout: self.read_timeout,
            abort: Some(Box::new(move || {
                let _ = sch.abort();
            })),
        })
    }
}

/// 已打开的 FFmpeg 视频源
///
/// 解码在 FFmpeg 调度线程中进行, 这里只从通道取帧.
pub struct FfmpegSource {
    rx: Receiver<RgbImage>,
    read_timeout: Duration,
    abort: Option<Box<dyn FnOnce()>>,
}

impl VideoSource for FfmpegSource {
    fn read(&mut self) -> Option<RgbImage> {
        match self.rx.recv_timeout(self.read_timeout) {
            // 丢弃积压帧, 只保留最新一帧
            Ok(frame) => Some(self.rx.try_iter().last().unwrap_or(frame)),
            Err(RecvTimeoutError::Timeout) => {
                warn!("⚠️ 读取超时 ({:?})", self.read_timeout);
                None
            }
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn release(&mut self) {
        if let Some(abort) = self.abort.take() {
            abort();
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.release();
    }
}
