// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 遥测传输抽象

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("broker 未连接")]
    NotConnected,
    #[error("MQTT 客户端错误: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("负载编码失败: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("TLS 配置失败: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("broker 地址无效: {0:?}")]
    InvalidBroker(String),
    #[error("后台线程启动失败: {0}")]
    Spawn(String),
}

/// 发布/订阅客户端
///
/// 所有方法均不阻塞: `publish` 只负责入队, 投递由后台线程完成.
pub trait Transport {
    fn is_connected(&self) -> bool;
    fn publish(&mut self, topic: &str, payload: String) -> Result<(), TransportError>;
    /// 停止后台投递并断开连接
    fn stop(&mut self);
}

/// `None` 表示启动时连接失败: 永远视为未连接
impl<T: Transport> Transport for Option<T> {
    fn is_connected(&self) -> bool {
        self.as_ref().is_some_and(|t| t.is_connected())
    }

    fn publish(&mut self, topic: &str, payload: String) -> Result<(), TransportError> {
        match self {
            Some(t) => t.publish(topic, payload),
            None => Err(TransportError::NotConnected),
        }
    }

    fn stop(&mut self) {
        if let Some(t) = self {
            t.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Always;

    impl Transport for Always {
        fn is_connected(&self) -> bool {
            true
        }
        fn publish(&mut self, _topic: &str, _payload: String) -> Result<(), TransportError> {
            Ok(())
        }
        fn stop(&mut self) {}
    }

    #[test]
    fn test_none_is_never_connected() {
        let mut t: Option<Always> = None;
        assert!(!t.is_connected());
        assert!(matches!(t.publish("a", "{}".into()), Err(TransportError::NotConnected)));
        t.stop();
    }

    #[test]
    fn test_some_delegates() {
        let mut t = Some(Always);
        assert!(t.is_connected());
        assert!(t.publish("a", "{}".into()).is_ok());
    }
}
