mod cli;
mod client;
mod models;
mod render;
mod repl;

use tracing_subscriber::EnvFilter;

use client::Services;
use repl::Repl;

#[tokio::main]
async fn main() {
    let config = cli::parse_config();
    init_logging(config.debug);

    let services = match Services::connect(&config.client) {
        Ok(services) => services,
        Err(err) => {
            render::failure(&err);
            std::process::exit(2);
        }
    };
    services.session.spawn_refresh();
    let restored = services.tracker.restore();
    if restored > 0 {
        render::info(&format!("restored {} job(s) from history", restored));
    }

    let mut repl = Repl::new(config, services);
    repl.run().await;
}

fn init_logging(debug: bool) {
    let fallback = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
