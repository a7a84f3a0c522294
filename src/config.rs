// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 运行配置 - JSON 文件 + 命令行覆盖

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::input::SourceId;
use crate::models::YOLOv8Config;
use crate::ort_backend::OrtEP;
use crate::renderer::OverlayStyle;

/// 命令行参数 (优先于配置文件)
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "YOLOv8 人数统计 + MQTT 遥测")]
pub struct Args {
    /// 配置文件路径 (不存在则生成默认配置)
    #[arg(long, default_value = "people_counter.json")]
    pub config: String,

    /// 视频源: 摄像头编号 或 流地址 (如 http://192.168.1.100:81/stream)
    #[arg(short, long)]
    pub source: Option<String>,

    /// ONNX 模型路径
    #[arg(short, long)]
    pub model: Option<String>,

    /// 置信度阈值
    #[arg(long)]
    pub conf: Option<f32>,

    /// NMS IoU 阈值
    #[arg(long)]
    pub iou: Option<f32>,

    /// 使用 CUDA
    #[arg(long)]
    pub cuda: bool,

    /// 使用 TensorRT
    #[arg(long)]
    pub trt: bool,

    /// GPU 设备号
    #[arg(long)]
    pub device_id: Option<i32>,

    /// 中文字体路径
    #[arg(long)]
    pub font: Option<String>,

    /// MQTT broker 主机
    #[arg(long)]
    pub broker: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// WebSocket 路径
    #[arg(long)]
    pub path: Option<String>,

    #[arg(long)]
    pub topic: Option<String>,

    #[arg(long, env = "MQTT_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl Args {
    /// 命令行值覆盖配置文件值
    pub fn apply(&self, cfg: &mut CounterConfig) {
        if let Some(source) = &self.source {
            cfg.source = SourceId::parse(source);
        }
        if let Some(model) = &self.model {
            cfg.model = model.clone();
        }
        if let Some(conf) = self.conf {
            cfg.conf = conf;
        }
        if let Some(iou) = self.iou {
            cfg.iou = iou;
        }
        cfg.cuda |= self.cuda;
        cfg.trt |= self.trt;
        if let Some(device_id) = self.device_id {
            cfg.device_id = device_id;
        }
        if let Some(font) = &self.font {
            cfg.font_path = Some(font.into());
        }

        let mqtt = &mut cfg.mqtt;
        if let Some(broker) = &self.broker {
            mqtt.broker = broker.clone();
        }
        if let Some(port) = self.port {
            mqtt.port = port;
        }
        if let Some(path) = &self.path {
            mqtt.path = path.clone();
        }
        if let Some(topic) = &self.topic {
            mqtt.topic = topic.clone();
        }
        if self.username.is_some() {
            mqtt.username = self.username.clone();
        }
        if self.password.is_some() {
            mqtt.password = self.password.clone();
        }
    }
}

/// MQTT 传输方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Tcp,
    Tls,
    Ws,
    Wss,
}

/// MQTT 连接参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub path: String, // WebSocket 路径
    pub topic: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub keepalive_secs: u64,
    pub transport: TransportKind,
    pub insecure_tls: bool,      // 跳过证书校验
    pub send_interval_secs: f64, // 遥测限速间隔
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: String::new(),
            port: 443,
            path: "/mqtt".to_string(),
            topic: "people_counter/count".to_string(),
            username: None,
            password: None,
            client_id: "people-counter".to_string(),
            keepalive_secs: 60,
            transport: TransportKind::Wss,
            insecure_tls: false,
            send_interval_secs: 1.0,
        }
    }
}

/// 人数统计配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    // === 视频源 ===
    pub source: SourceId,
    pub reconnect_cooldown_secs: f64, // 读取失败后冷却
    pub read_timeout_secs: f64,       // 单帧读取超时

    // === 检测参数 ===
    pub model: String,
    pub conf: f32,  // 置信度阈值
    pub iou: f32,   // NMS IoU 阈值
    pub kconf: f32, // 关键点置信度
    pub input_size: u32,
    pub cuda: bool,
    pub trt: bool,
    pub device_id: i32,

    // === 画面 ===
    pub font_path: Option<PathBuf>,
    pub text_size: f32,
    pub count_font_size: f32,
    pub count_label: String,

    pub mqtt: MqttConfig,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            source: SourceId::Device(0),
            reconnect_cooldown_secs: 2.0,
            read_timeout_secs: 5.0,

            model: "yolov8s-pose.onnx".to_string(),
            conf: 0.5,
            iou: 0.45,
            kconf: 0.5,
            input_size: 640,
            cuda: false,
            trt: false,
            device_id: 0,

            font_path: default_font_path(),
            text_size: 28.0,
            count_font_size: 40.0,
            count_label: "偵測人數".to_string(),

            mqtt: MqttConfig::default(),
        }
    }
}

/// 各平台常见的中文字体
fn default_font_path() -> Option<PathBuf> {
    let path = if cfg!(target_os = "windows") {
        "C:/Windows/Fonts/msjh.ttc"
    } else if cfg!(target_os = "macos") {
        "/System/Library/Fonts/PingFang.ttc"
    } else {
        "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc"
    };
    Some(PathBuf::from(path))
}

impl CounterConfig {
    /// 从JSON文件加载配置
    pub fn load(path: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path);
                    config
                }
                Err(e) => {
                    warn!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在, 创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &str) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    error!("❌ 保存配置失败: {}", e);
                } else {
                    info!("💾 配置已保存到 {}", path);
                }
            }
            Err(e) => error!("❌ 序列化配置失败: {}", e),
        }
    }

    pub fn ep(&self) -> OrtEP {
        if self.trt {
            OrtEP::Trt(self.device_id)
        } else if self.cuda {
            OrtEP::CUDA(self.device_id)
        } else {
            OrtEP::CPU
        }
    }

    pub fn yolo(&self) -> YOLOv8Config {
        YOLOv8Config {
            model: self.model.clone(),
            ep: self.ep(),
            fp16: self.trt,
            width: self.input_size,
            height: self.input_size,
            conf: self.conf,
            kconf: self.kconf,
            iou: self.iou,
        }
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            count_label: self.count_label.clone(),
            text_size: self.text_size,
            count_size: self.count_font_size,
            keypoint_conf: self.kconf,
            ..Default::default()
        }
    }

    pub fn reconnect_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.reconnect_cooldown_secs.max(0.0))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.read_timeout_secs.max(0.0))
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️ 当前配置:");
        info!("  视频源: {}", self.source);
        info!("  模型: {} ({:?})", self.model, self.ep());
        info!("  置信度: {:.2}  IoU: {:.2}", self.conf, self.iou);
        info!("  重连冷却: {:.1}s", self.reconnect_cooldown_secs);
        info!(
            "  MQTT: {}:{}{} ({:?}) → {}",
            self.mqtt.broker, self.mqtt.port, self.mqtt.path, self.mqtt.transport, self.mqtt.topic
        );
        info!("  遥测间隔: {:.1}s", self.mqtt.send_interval_secs);
    }
}
