use metrics_collector::agent;
use metrics_collector::config::AgentConfig;
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("metrics_collector", LevelFilter::TRACE),
        ("collector_agent", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let config = AgentConfig::load();
    trace!("started with config: {config:?}");

    tokio::select! {
        result = agent::run(config) => {
            if let Err(e) = &result {
                error!("agent stopped with error: {e}");
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("agent shutting down...");
            Ok(())
        }
    }
}
