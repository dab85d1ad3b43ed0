//! miniapp：终端预览入口
//!
//! 加载配置、初始化日志、创建后端网关与宿主桥，启动事件循环与终端界面。
//! 用法：miniapp [config.toml]；MINIAPP__HOST__EMULATE=true 时模拟宿主（F2 为主按钮）。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use sales_miniapp::{
    api::{MiniAppBackend, RequestGateway},
    config::{load_config, AppConfig},
    core::App,
    host::{HostBridge, HostSdk, SystemOpener, TerminalHost},
    observability,
    storage::FileStore,
    ui::run_app,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let (cfg, config_error) = match load_config(config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    observability::init(&cfg.app.data_dir.join(format!("{}.log", cfg.app.name)))
        .context("Failed to initialize logging")?;
    if let Some(e) = config_error {
        tracing::warn!("Config load failed ({}), using defaults", e);
    }

    let backend: Arc<dyn MiniAppBackend> = Arc::new(
        RequestGateway::new(&cfg.api.base_url).context("Invalid api.base_url")?,
    );
    let store = Arc::new(FileStore::new(cfg.app.data_dir.join("preferences.json")));

    let terminal_host = cfg
        .host
        .emulate
        .then(|| Arc::new(TerminalHost::new(cfg.host.init_data.clone())));
    let sdk = terminal_host.clone().map(|h| h as Arc<dyn HostSdk>);
    let bridge = HostBridge::new(sdk, Arc::new(SystemOpener));
    tracing::info!(
        base_url = %cfg.api.base_url,
        emulate_host = cfg.host.emulate,
        "Starting {}",
        cfg.app.name
    );

    let (app, inbox) = App::new(&cfg, bridge, backend, store);
    let events = app.events();
    let frames = app.subscribe();
    let event_loop = tokio::spawn(app.run(inbox));

    run_app(frames, events, terminal_host)
        .await
        .context("Terminal preview failed")?;

    event_loop.await.context("Event loop panicked")?;
    Ok(())
}
