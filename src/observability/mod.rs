//! 可观测性：tracing 订阅器

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 日志默认 info；RUST_LOG 优先，其次 --log 指定的级别
pub fn init(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
