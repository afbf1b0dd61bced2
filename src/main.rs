use std::env;

use anyhow::Context;
use bridgehead::{
    config::{config_path, load_config},
    event::EventManager,
    protocol::{registry, ProtocolVersion},
    proxy::ProxyServer,
};
use log::info;
use simple_logger::SimpleLogger;

fn main() -> anyhow::Result<()> {
    let path = config_path(env::args());
    let config = load_config(&path).with_context(|| format!("loading {}", path.display()))?;
    SimpleLogger::new().with_level(config.log_level).init()?;

    registry::init();
    info!("Supporting Minecraft {}", ProtocolVersion::version_range_string());

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    if config.worker_threads > 0 {
        runtime.worker_threads(config.worker_threads);
    }
    let runtime = runtime.enable_all().build().context("building runtime")?;

    runtime.block_on(async move {
        let proxy = ProxyServer::new(config, EventManager::new())?;
        if proxy.config().online_mode {
            proxy.key_pair()?;
        }
        proxy.run().await
    })
}
