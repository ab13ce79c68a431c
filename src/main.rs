use std::time::Duration;

use tpm_insights_lib::{dashboard, state};

/// Grace period for in-flight requests once the dashboard has stopped.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        let config_path = state::config_path()?;
        log::info!("Loading config from {}", config_path.display());
        dashboard::run(config_path).await
    });

    // The stdin reader blocks on a thread of its own; don't wait on it.
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
