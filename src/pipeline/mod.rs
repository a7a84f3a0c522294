// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 主循环编排 (Main Loop)
///
/// 单线程逐帧执行:
/// 采集 → 检测 → 过滤 → 画框 → FPS → 限速遥测 → 读数 → 显示 → 检查退出键
///
/// 唯一状态迁移 `Running → Stopped`, 由退出键触发;
/// 停止后按 采集 → 窗口 → 遥测 的顺序释放.
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, info};

use crate::detection::{Detect, DetectionFilter, DetectorAdapter};
use crate::input::{Capture, CaptureManager, VideoBackend};
use crate::renderer::OverlayRenderer;
use crate::telemetry::{PublishOutcome, TelemetryPublisher, Transport};
use crate::{wall_clock_secs, EXIT_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// 遥测时间源 (秒)
pub trait Clock {
    fn now(&self) -> f64;
}

/// 墙钟 (Unix 纪元秒)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        wall_clock_secs()
    }
}

/// 显示窗口
#[allow(async_fn_in_trait)]
pub trait Display {
    /// 显示一帧并返回本帧按下的键
    async fn present(&mut self, frame: &RgbImage) -> Option<i32>;

    fn close(&mut self);
}

/// `floor(1/elapsed)`, elapsed ≤ 0 时为 0
pub fn fps_from_elapsed(elapsed: f64) -> u32 {
    if elapsed > 0.0 {
        (1.0 / elapsed).floor() as u32
    } else {
        0
    }
}

/// 单帧统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub count: usize,
    pub fps: u32,
    pub publish: PublishOutcome,
}

/// 人数统计主循环
pub struct Counter<B: VideoBackend, D: Detect, T: Transport, C: Clock = SystemClock> {
    capture: CaptureManager<B>,
    detector: DetectorAdapter<D>,
    filter: DetectionFilter,
    renderer: OverlayRenderer,
    publisher: TelemetryPublisher<T>,
    clock: C,
    state: LoopState,
    frames: u64,
}

impl<B, D, T, C> Counter<B, D, T, C>
where
    B: VideoBackend,
    D: Detect,
    T: Transport,
    C: Clock,
{
    pub fn new(
        capture: CaptureManager<B>,
        detector: DetectorAdapter<D>,
        filter: DetectionFilter,
        renderer: OverlayRenderer,
        publisher: TelemetryPublisher<T>,
        clock: C,
    ) -> Self {
        Self {
            capture,
            detector,
            filter,
            renderer,
            publisher,
            clock,
            state: LoopState::Running,
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// 处理一帧 (不含显示); 视频源不可用时返回 `None`
    pub fn step(&mut self) -> Option<(RgbImage, FrameReport)> {
        let start = Instant::now();

        let mut frame = match self.capture.next_frame() {
            Capture::Frame(frame) => frame,
            Capture::Unavailable => return None,
        };

        let detections = self.detector.detect(&frame);
        let filtered = self.filter.filter(detections);
        self.renderer.draw_detections(&mut frame, &filtered.people);

        let fps = fps_from_elapsed(start.elapsed().as_secs_f64());
        let publish = self
            .publisher
            .maybe_publish(filtered.count, fps, self.clock.now());
        self.renderer.draw_readouts(&mut frame, filtered.count, fps);

        self.frames += 1;
        debug!(
            "🖼️ 帧#{} 人数={} FPS={} 遥测={:?}",
            self.frames, filtered.count, fps, publish
        );

        let report = FrameReport {
            count: filtered.count,
            fps,
            publish,
        };
        Some((frame, report))
    }

    /// 退出键 → Stopped
    pub fn handle_key(&mut self, key: Option<i32>) -> LoopState {
        if key == Some(EXIT_KEY) {
            info!("⏹️ 收到退出键");
            self.state = LoopState::Stopped;
        }
        self.state
    }

    /// 运行直到退出键, 然后释放资源
    ///
    /// 视频源不可用的轮次不刷新窗口也不检查按键: 断线期间窗口无响应,
    /// 每轮最长阻塞 读取超时 + 重连冷却, 恢复出帧后按键才生效.
    pub async fn run<W: Display>(&mut self, display: &mut W) {
        info!("▶️ 开始人数统计");
        while self.state == LoopState::Running {
            let Some((frame, _report)) = self.step() else {
                continue;
            };
            let key = display.present(&frame).await;
            self.handle_key(key);
        }
        self.shutdown(display);
    }

    /// 采集 → 窗口 → 遥测, 依次释放
    pub fn shutdown<W: Display>(&mut self, display: &mut W) {
        self.state = LoopState::Stopped;
        self.capture.release();
        display.close();
        self.publisher.close();
        info!("👋 已退出 (共处理 {} 帧)", self.frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BoundingBox, Detection};
    use crate::input::{SourceId, VideoSource};
    use crate::renderer::OverlayStyle;
    use crate::telemetry::TransportError;
    use anyhow::Result;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::Duration;

    type Log = Rc<RefCell<Vec<String>>>;

    struct FakeSource {
        frames: Rc<RefCell<VecDeque<Option<RgbImage>>>>,
        log: Log,
    }

    impl VideoSource for FakeSource {
        fn read(&mut self) -> Option<RgbImage> {
            self.frames.borrow_mut().pop_front().flatten()
        }
        fn release(&mut self) {
            self.log.borrow_mut().push("capture".into());
        }
    }

    struct FakeBackend {
        frames: Rc<RefCell<VecDeque<Option<RgbImage>>>>,
        log: Log,
    }

    impl VideoBackend for FakeBackend {
        type Source = FakeSource;
        fn open(&mut self, _source: &SourceId) -> Result<FakeSource> {
            Ok(FakeSource {
                frames: self.frames.clone(),
                log: self.log.clone(),
            })
        }
    }

    struct FakeDetector(Vec<Detection>);

    impl Detect for FakeDetector {
        fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }
        fn class_names(&self) -> &[String] {
            &[]
        }
    }

    struct FakeTransport {
        sent: Rc<RefCell<Vec<String>>>,
        log: Log,
    }

    impl Transport for FakeTransport {
        fn is_connected(&self) -> bool {
            true
        }
        fn publish(&mut self, _topic: &str, payload: String) -> Result<(), TransportError> {
            self.sent.borrow_mut().push(payload);
            Ok(())
        }
        fn stop(&mut self) {
            self.log.borrow_mut().push("transport".into());
        }
    }

    struct FakeDisplay {
        keys: VecDeque<Option<i32>>,
        shown: usize,
        log: Log,
    }

    impl Display for FakeDisplay {
        async fn present(&mut self, _frame: &RgbImage) -> Option<i32> {
            self.shown += 1;
            self.keys.pop_front().flatten()
        }
        fn close(&mut self) {
            self.log.borrow_mut().push("display".into());
        }
    }

    /// 每次调用前进 0.6 秒
    struct StepClock(Cell<f64>);

    impl Clock for StepClock {
        fn now(&self) -> f64 {
            let t = self.0.get();
            self.0.set(t + 0.6);
            t
        }
    }

    struct Rig {
        counter: Counter<FakeBackend, FakeDetector, FakeTransport, StepClock>,
        frames: Rc<RefCell<VecDeque<Option<RgbImage>>>>,
        sent: Rc<RefCell<Vec<String>>>,
        log: Log,
    }

    fn rig(detections: Vec<Detection>, frames: Vec<Option<RgbImage>>) -> Rig {
        let log: Log = Rc::default();
        let frames = Rc::new(RefCell::new(VecDeque::from(frames)));
        let sent: Rc<RefCell<Vec<String>>> = Rc::default();

        let backend = FakeBackend {
            frames: frames.clone(),
            log: log.clone(),
        };
        let capture = CaptureManager::open(backend, SourceId::Device(0), Duration::from_secs(2))
            .with_sleeper(|_| {});
        let transport = FakeTransport {
            sent: sent.clone(),
            log: log.clone(),
        };
        let counter = Counter::new(
            capture,
            DetectorAdapter::new(FakeDetector(detections)),
            DetectionFilter::new(0.5),
            OverlayRenderer::new(None, OverlayStyle::default()),
            TelemetryPublisher::new(transport, "t", 1.0),
            StepClock(Cell::new(0.0)),
        );
        Rig {
            counter,
            frames,
            sent,
            log,
        }
    }

    fn det(conf: f32, label: &str) -> Detection {
        Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), conf, label)
    }

    fn frame() -> Option<RgbImage> {
        Some(RgbImage::new(32, 32))
    }

    #[test]
    fn test_fps_from_elapsed() {
        assert_eq!(fps_from_elapsed(0.0), 0);
        assert_eq!(fps_from_elapsed(-1.0), 0);
        assert_eq!(fps_from_elapsed(0.04), 25);
        assert_eq!(fps_from_elapsed(0.3), 3);
        assert_eq!(fps_from_elapsed(2.0), 0);
    }

    #[test]
    fn test_count_flows_into_telemetry() {
        let mut r = rig(
            vec![det(0.9, "person"), det(0.3, "person"), det(0.95, "car")],
            vec![frame(), frame(), frame()],
        );

        let (_, report) = r.counter.step().unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(report.publish, PublishOutcome::Sent);

        // t=0.6 闸门未开, t=1.2 打开
        assert_eq!(r.counter.step().unwrap().1.publish, PublishOutcome::Gated);
        assert_eq!(r.counter.step().unwrap().1.publish, PublishOutcome::Sent);

        let sent = r.sent.borrow();
        assert_eq!(sent.len(), 2);
        let v: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(v["count"], 1);
        assert_eq!(v["ts"].as_f64(), Some(0.0));
    }

    #[test]
    fn test_unavailable_skips_iteration() {
        let mut r = rig(Vec::new(), vec![None]);
        assert!(r.counter.step().is_none());
        assert_eq!(r.counter.frames(), 0);
        assert!(r.sent.borrow().is_empty());
        assert_eq!(r.counter.state(), LoopState::Running);
    }

    #[test]
    fn test_exit_key_stops_and_releases_in_order() {
        let mut r = rig(Vec::new(), vec![frame(), None, frame(), frame()]);
        let mut display = FakeDisplay {
            keys: VecDeque::from(vec![None, Some(EXIT_KEY)]),
            shown: 0,
            log: r.log.clone(),
        };

        pollster::block_on(r.counter.run(&mut display));

        assert_eq!(r.counter.state(), LoopState::Stopped);
        // 不可用的那一轮不显示
        assert_eq!(display.shown, 2);
        assert_eq!(r.counter.frames(), 2);
        assert_eq!(r.frames.borrow().len(), 1);
        // 失败读取释放一次旧句柄, 其后为退出时的释放顺序
        assert_eq!(
            *r.log.borrow(),
            vec!["capture", "capture", "display", "transport"]
        );
    }

    #[test]
    fn test_other_keys_keep_running() {
        let mut r = rig(Vec::new(), Vec::new());
        assert_eq!(r.counter.handle_key(None), LoopState::Running);
        assert_eq!(r.counter.handle_key(Some(113)), LoopState::Running);
        assert_eq!(r.counter.handle_key(Some(EXIT_KEY)), LoopState::Stopped);
    }
}
