// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 人数统计 (People Counter)
//!
//! 视频源 → YOLOv8 姿态模型 → 行人计数 → 画面叠加 → MQTT 遥测 → 预览窗口
//! Esc 退出.

use anyhow::{Context, Result};
use clap::Parser;
use mimalloc::MiMalloc;
use tracing::{error, info, warn};

use people_counter::display::{window_conf, WindowDisplay};
use people_counter::renderer::OverlayRenderer;
use people_counter::{
    logging, Args, CaptureManager, Counter, CounterConfig, DetectionFilter, DetectorAdapter,
    FfmpegBackend, MqttTransport, SystemClock, TelemetryPublisher, YoloDetector,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[macroquad::main(window_conf)]
async fn main() {
    logging::init();
    if let Err(e) = run().await {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    let mut cfg = CounterConfig::load(&args.config);
    args.apply(&mut cfg);
    cfg.print_summary();

    // 模型加载失败是唯一的启动期致命错误
    let detector = YoloDetector::new(cfg.yolo())
        .with_context(|| format!("模型加载失败: {}", cfg.model))?;

    let transport = match MqttTransport::connect(&cfg.mqtt) {
        Ok(transport) => Some(transport),
        Err(e) => {
            warn!("⚠️ MQTT 连线错误: {}, 遥测停用", e);
            None
        }
    };
    let publisher = TelemetryPublisher::new(
        transport,
        cfg.mqtt.topic.clone(),
        cfg.mqtt.send_interval_secs,
    );

    let capture = CaptureManager::open(
        FfmpegBackend::new(cfg.read_timeout()),
        cfg.source.clone(),
        cfg.reconnect_cooldown(),
    );
    let renderer = OverlayRenderer::with_font(cfg.font_path.as_deref(), cfg.overlay_style());

    let mut counter = Counter::new(
        capture,
        DetectorAdapter::new(detector),
        DetectionFilter::new(cfg.conf),
        renderer,
        publisher,
        SystemClock,
    );

    let mut display = WindowDisplay::new();
    counter.run(&mut display).await;
    info!("✅ 正常退出");
    Ok(())
}
