use rustvocalsynth::runtime;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let presets: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = runtime::start(&presets) {
        error!(%err, "synth stopped");
        std::process::exit(1);
    }
}
