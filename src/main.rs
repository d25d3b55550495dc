use anyhow::Context;
use chatrelay_lib::{logger, server, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("加载配置失败")?;

    logger::init_tracing(&config.logging).context("初始化日志失败")?;
    tracing::info!("[MAIN] chatrelay {} 启动", env!("CARGO_PKG_VERSION"));

    server::run(config).await.context("HTTP 服务异常退出")?;
    Ok(())
}
