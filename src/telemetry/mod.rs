// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 遥测发布 (Telemetry Publisher)
///
/// - Gate:      固定间隔限速, 与帧率无关
/// - Payload:   `{"count":..,"fps":..,"ts":..}`
/// - Transport: 发布/订阅客户端抽象 + MQTT 实现
pub mod mqtt;
pub mod transport;

use serde::Serialize;
use tracing::{debug, warn};

pub use mqtt::MqttTransport;
pub use transport::{Transport, TransportError};

/// 遥测负载, 字段即线上 JSON 的全部键
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryPayload {
    pub count: usize,
    pub fps: u32,
    pub ts: f64,
}

impl TelemetryPayload {
    pub fn to_json(&self) -> Result<String, TransportError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 限速闸门
#[derive(Debug, Clone)]
pub struct PublishGate {
    last_send_time: Option<f64>,
    interval: f64,
}

impl PublishGate {
    pub fn new(interval: f64) -> Self {
        Self {
            last_send_time: None,
            interval,
        }
    }

    /// 首次调用必定打开; 之后仅当 `now - last > interval` 时打开.
    /// 打开即记录 `now`, 不论随后发布成败.
    pub fn try_open(&mut self, now: f64) -> bool {
        if let Some(last) = self.last_send_time {
            if now - last <= self.interval {
                return false;
            }
        }
        self.last_send_time = Some(now);
        true
    }

    pub fn last_send_time(&self) -> Option<f64> {
        self.last_send_time
    }
}

/// 单次 `maybe_publish` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// 闸门未开
    Gated,
    Sent,
    /// 闸门已开但未连接, 跳过
    NotConnected,
    /// 发送出错, 已记录日志
    Failed,
}

pub struct TelemetryPublisher<T: Transport> {
    transport: T,
    topic: String,
    gate: PublishGate,
}

impl<T: Transport> TelemetryPublisher<T> {
    pub fn new(transport: T, topic: impl Into<String>, interval: f64) -> Self {
        Self {
            transport,
            topic: topic.into(),
            gate: PublishGate::new(interval),
        }
    }

    /// 限速发布; 失败只记录, 等下一次闸门打开
    pub fn maybe_publish(&mut self, count: usize, fps: u32, now: f64) -> PublishOutcome {
        if !self.gate.try_open(now) {
            return PublishOutcome::Gated;
        }
        if !self.transport.is_connected() {
            debug!("📡 未连接, 跳过本次遥测");
            return PublishOutcome::NotConnected;
        }

        let payload = TelemetryPayload { count, fps, ts: now };
        let sent = payload
            .to_json()
            .and_then(|json| self.transport.publish(&self.topic, json));
        match sent {
            Ok(()) => {
                debug!("📤 {} ← {:?}", self.topic, payload);
                PublishOutcome::Sent
            }
            Err(e) => {
                warn!("⚠️ 发送失败: {}", e);
                PublishOutcome::Failed
            }
        }
    }

    pub fn gate(&self) -> &PublishGate {
        &self.gate
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn close(&mut self) {
        self.transport.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        connected: bool,
        fail: bool,
        sent: Vec<(String, String)>,
        attempts: usize,
        stopped: bool,
    }

    impl Transport for Recorder {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn publish(&mut self, topic: &str, payload: String) -> Result<(), TransportError> {
            self.attempts += 1;
            if self.fail {
                return Err(TransportError::NotConnected);
            }
            self.sent.push((topic.to_string(), payload));
            Ok(())
        }

        fn stop(&mut self) {
            self.stopped = true;
        }
    }

    fn publisher(connected: bool, fail: bool) -> TelemetryPublisher<Recorder> {
        let transport = Recorder {
            connected,
            fail,
            ..Default::default()
        };
        TelemetryPublisher::new(transport, "site/count", 1.0)
    }

    #[test]
    fn test_gate_scenario() {
        let mut p = publisher(true, false);
        assert_eq!(p.maybe_publish(1, 10, 0.0), PublishOutcome::Sent);
        assert_eq!(p.maybe_publish(1, 10, 0.5), PublishOutcome::Gated);
        assert_eq!(p.maybe_publish(2, 10, 1.1), PublishOutcome::Sent);
        assert_eq!(p.gate().last_send_time(), Some(1.1));
        assert_eq!(p.transport().sent.len(), 2);
    }

    #[test]
    fn test_exact_interval_is_gated() {
        let mut gate = PublishGate::new(1.0);
        assert!(gate.try_open(10.0));
        assert!(!gate.try_open(11.0));
        assert!(gate.try_open(11.01));
    }

    #[test]
    fn test_failure_still_advances_gate() {
        let mut p = publisher(true, true);
        assert_eq!(p.maybe_publish(3, 5, 100.0), PublishOutcome::Failed);
        assert_eq!(p.gate().last_send_time(), Some(100.0));
        // 不立即重试
        assert_eq!(p.maybe_publish(3, 5, 100.2), PublishOutcome::Gated);
        assert_eq!(p.transport().attempts, 1);
    }

    #[test]
    fn test_not_connected_skips_and_advances_gate() {
        let mut p = publisher(false, false);
        assert_eq!(p.maybe_publish(0, 0, 5.0), PublishOutcome::NotConnected);
        assert_eq!(p.gate().last_send_time(), Some(5.0));
        assert_eq!(p.transport().attempts, 0);
    }

    #[test]
    fn test_rate_limit_under_high_frame_rate() {
        let mut p = publisher(true, false);
        let mut sent_at = Vec::new();
        // 1000 fps, 持续 5 秒
        for i in 0..5000 {
            let now = 1_700_000_000.0 + i as f64 * 0.001;
            if p.maybe_publish(1, 1000, now) == PublishOutcome::Sent {
                sent_at.push(now);
            }
        }
        assert!(sent_at.len() >= 4 && sent_at.len() <= 5);
        for pair in sent_at.windows(2) {
            assert!(pair[1] - pair[0] >= 1.0);
        }
    }

    #[test]
    fn test_payload_keys() {
        let mut p = publisher(true, false);
        p.maybe_publish(0, 12, 1.5);
        let (topic, json) = &p.transport().sent[0];
        assert_eq!(topic, "site/count");

        let v: serde_json::Value = serde_json::from_str(json).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["count"], 0);
        assert_eq!(obj["fps"], 12);
        assert_eq!(obj["ts"].as_f64(), Some(1.5));
    }

    #[test]
    fn test_close_stops_transport() {
        let mut p = publisher(true, false);
        p.close();
        assert!(p.transport().stopped);
    }
}
