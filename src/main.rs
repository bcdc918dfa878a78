use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let config = datadock::config::Config::from_env()?;

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "datadock",
        "datadock starting: RUST_LOG='{}', host={}, port={}, data_dir='{}', watch={}, debounce_ms={}, workers={}",
        rust_log,
        config.host,
        config.port,
        config.data_dir.display(),
        config.watch,
        config.debounce.as_millis(),
        config.workers
    );

    // Worker count comes from DATADOCK_WORKERS, so the runtime is built
    // explicitly instead of via the attribute macro.
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?
        .block_on(datadock::server::run(config))
}
