use std::str::FromStr;

use tracing_subscriber::{prelude::*, Registry};

#[derive(Debug)]
pub struct TraceConfig {
    pub level: String,
    pub format: String,
}

pub fn prepare_tracing(conf: TraceConfig) {
    let level = tracing_subscriber::filter::LevelFilter::from_str(&conf.level)
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);
    if conf.format == "json" {
        let _ = Registry::default()
            .with(tracing_subscriber::fmt::Layer::new().with_ansi(true).json())
            .with(level)
            .try_init();
    } else {
        let _ = Registry::default()
            .with(tracing_subscriber::fmt::Layer::new().with_ansi(true))
            .with(level)
            .try_init();
    }
}
