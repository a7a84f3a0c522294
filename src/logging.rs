// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 日志: tracing + EnvFilter (`RUST_LOG`, 默认 info)

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// 安装全局日志; 重复调用返回 false
pub fn init() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_thread_names(true))
        .try_init()
        .is_ok()
}
