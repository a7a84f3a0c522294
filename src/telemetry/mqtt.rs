// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! MQTT 传输 (rumqttc)
//!
//! 主循环只调用 `try_publish` 入队; 连接/重连/投递全部在 `mqtt-eventloop` 线程中完成.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use rumqttc::{
    Client, ConnectReturnCode, Connection, ConnectionError, Event, MqttOptions, Outgoing, Packet,
    QoS, TlsConfiguration,
};
use tracing::{debug, info, warn};

use super::transport::{Transport, TransportError};
use crate::config::{MqttConfig, TransportKind};

/// 请求队列容量
const REQUEST_CAPACITY: usize = 16;
/// 连接出错后的重连间隔
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

pub struct MqttTransport {
    client: Client,
    connected: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MqttTransport {
    /// 启动后台连接; 连接结果通过 `is_connected` 反映
    pub fn connect(cfg: &MqttConfig) -> Result<Self, TransportError> {
        if cfg.broker.trim().is_empty() {
            return Err(TransportError::InvalidBroker(cfg.broker.clone()));
        }

        let (host, port) = broker_address(cfg);
        let mut opts = MqttOptions::new(cfg.client_id.clone(), host, port);
        opts.set_keep_alive(Duration::from_secs(cfg.keepalive_secs));
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            opts.set_credentials(user.clone(), pass.clone());
        }
        let transport = match cfg.transport {
            TransportKind::Tcp => rumqttc::Transport::Tcp,
            TransportKind::Tls => rumqttc::Transport::Tls(tls_config(cfg)?),
            TransportKind::Ws => rumqttc::Transport::Ws,
            TransportKind::Wss => rumqttc::Transport::Wss(tls_config(cfg)?),
        };
        opts.set_transport(transport);

        info!("📡 正在连接 MQTT broker {}:{} ({:?})", cfg.broker, cfg.port, cfg.transport);

        let (client, connection) = Client::new(opts, REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let connected = connected.clone();
            let stop = stop.clone();
            let label = format!("{}:{}", cfg.broker, cfg.port);
            std::thread::Builder::new()
                .name("mqtt-eventloop".to_string())
                .spawn(move || event_loop(connection, connected, stop, label))
                .map_err(|e| TransportError::Spawn(e.to_string()))?
        };

        Ok(Self {
            client,
            connected,
            stop,
            worker: Some(worker),
        })
    }
}

/// 事件循环: 维护连接状态, 出错后稍等再重连
fn event_loop(
    mut connection: Connection,
    connected: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    label: String,
) {
    for notification in connection.iter() {
        if stop.load(Ordering::Acquire) {
            break;
        }
        if apply_event(&connected, &notification, &label) {
            std::thread::sleep(RECONNECT_DELAY);
        }
    }
    connected.store(false, Ordering::Release);
    info!("📡 MQTT 事件循环已退出");
}

/// 事件 → 连接状态; 返回 true 表示连接出错, 需要退避
fn apply_event(
    connected: &AtomicBool,
    notification: &Result<Event, ConnectionError>,
    label: &str,
) -> bool {
    match notification {
        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
            let ok = ack.code == ConnectReturnCode::Success;
            connected.store(ok, Ordering::Release);
            if ok {
                info!("✅ MQTT 连线成功 ({})", label);
            } else {
                warn!("❌ MQTT 连线失败, 代码: {:?}", ack.code);
            }
            false
        }
        Ok(Event::Incoming(Packet::Disconnect)) | Ok(Event::Outgoing(Outgoing::Disconnect)) => {
            connected.store(false, Ordering::Release);
            false
        }
        Ok(event) => {
            debug!("mqtt: {:?}", event);
            false
        }
        Err(e) => {
            if connected.swap(false, Ordering::AcqRel) {
                warn!("⚠️ MQTT 连接中断: {}", e);
            } else {
                debug!("MQTT 连接失败: {}", e);
            }
            true
        }
    }
}

/// broker 地址: ws/wss 需要完整 URL (含路径)
pub fn broker_address(cfg: &MqttConfig) -> (String, u16) {
    let path = if cfg.path.starts_with('/') {
        cfg.path.clone()
    } else {
        format!("/{}", cfg.path)
    };
    let host = match cfg.transport {
        TransportKind::Tcp | TransportKind::Tls => cfg.broker.clone(),
        TransportKind::Ws => format!("ws://{}:{}{}", cfg.broker, cfg.port, path),
        TransportKind::Wss => format!("wss://{}:{}{}", cfg.broker, cfg.port, path),
    };
    (host, cfg.port)
}

fn tls_config(cfg: &MqttConfig) -> Result<TlsConfiguration, TransportError> {
    if !cfg.insecure_tls {
        return Ok(TlsConfiguration::Native);
    }
    warn!("⚠️ 已关闭 TLS 证书校验");
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()?;
    Ok(TlsConfiguration::NativeConnector(connector))
}

impl Transport for MqttTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn publish(&mut self, topic: &str, payload: String) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)?;
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);
        if let Err(e) = self.client.try_disconnect() {
            debug!("MQTT 断开请求失败: {}", e);
        }
        if worker.join().is_err() {
            warn!("⚠️ MQTT 事件线程异常退出");
        }
        info!("📡 MQTT 已断开");
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.stop();
    }
}
