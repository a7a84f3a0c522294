// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 视频源抽象

use std::fmt;

use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// 视频源标识: 流地址 或 本地设备编号
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceId {
    Device(usize),
    Uri(String),
}

impl SourceId {
    /// 纯数字解析为设备编号, 其余视为地址
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<usize>() {
            Ok(index) => SourceId::Device(index),
            Err(_) => SourceId::Uri(raw.to_string()),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Device(index) => write!(f, "camera#{}", index),
            SourceId::Uri(uri) => write!(f, "{}", uri),
        }
    }
}

/// 已打开的视频源句柄
pub trait VideoSource {
    /// 读取下一帧; `None` 表示本次读取失败
    fn read(&mut self) -> Option<RgbImage>;

    /// 释放底层资源
    fn release(&mut self);
}

/// 视频源工厂
pub trait VideoBackend {
    type Source: VideoSource;

    fn open(&mut self, source: &SourceId) -> Result<Self::Source>;
}
