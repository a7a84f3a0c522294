// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 采集管理器 (Capture Manager)
//! 职责: 持有唯一的视频源句柄; 读取失败 → 冷却 → 重新打开, 无限重试

use std::time::Duration;

use image::RgbImage;
use tracing::{info, warn};

use super::source::{SourceId, VideoBackend, VideoSource};

/// 单次采集结果
#[derive(Debug)]
pub enum Capture {
    Frame(RgbImage),
    Unavailable,
}

/// 采集管理器
///
/// 句柄打开失败时保持为空, 下一次调用照常走"读取失败"流程.
pub struct CaptureManager<B: VideoBackend> {
    backend: B,
    source_id: SourceId,
    handle: Option<B::Source>,
    cooldown: Duration,
    sleep: Box<dyn FnMut(Duration)>,
    reopen_attempts: u64,
}

impl<B: VideoBackend> CaptureManager<B> {
    /// 打开视频源; 首次打开失败不致命
    pub fn open(mut backend: B, source_id: SourceId, cooldown: Duration) -> Self {
        let handle = match backend.open(&source_id) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("⚠️ 视频源打开失败, 稍后重试: {:#}", e);
                None
            }
        };
        Self {
            backend,
            source_id,
            handle,
            cooldown,
            sleep: Box::new(std::thread::sleep),
            reopen_attempts: 0,
        }
    }

    /// 替换冷却等待实现
    pub fn with_sleeper(mut self, sleep: impl FnMut(Duration) + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    /// 读取下一帧
    ///
    /// 失败时: 冷却 → 释放旧句柄 → 重新打开, 然后返回 `Unavailable`.
    pub fn next_frame(&mut self) -> Capture {
        if let Some(frame) = self.handle.as_mut().and_then(|h| h.read()) {
            return Capture::Frame(frame);
        }

        warn!("📹 无法读取影像, 尝试重连中... ({})", self.source_id);
        (self.sleep)(self.cooldown);
        self.reopen();
        Capture::Unavailable
    }

    fn reopen(&mut self) {
        if let Some(mut old) = self.handle.take() {
            old.release();
        }
        self.reopen_attempts += 1;
        match self.backend.open(&self.source_id) {
            Ok(handle) => {
                info!("🔄 视频源已重新打开 (第{}次)", self.reopen_attempts);
                self.handle = Some(handle);
            }
            Err(e) => {
                warn!("⚠️ 重新打开失败 (第{}次): {:#}", self.reopen_attempts, e);
            }
        }
    }

    /// 释放句柄
    pub fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
            info!("📹 视频源已释放");
        }
    }

    pub fn reopen_attempts(&self) -> u64 {
        self.reopen_attempts
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }
}
