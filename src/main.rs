use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use caution_marshal::app::App;
use caution_marshal::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.args.log_level.clone()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(true)
        .init();

    info!("caution-marshal v{}", env!("CARGO_PKG_VERSION"));

    let app = App::new(config);
    app.run().await
}
