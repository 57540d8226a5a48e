use tracing_subscriber::{fmt, EnvFilter};

/// Without `RUST_LOG`: the bridge and HTTP layer at info, electrum and rustls
/// chatter only from warn up.
const DEFAULT_DIRECTIVES: &str = "warn,deskwallet=info,tower_http=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// `RUST_LOG` filters; `DESKWALLET_LOG_JSON=1` switches to JSON lines on stderr.
pub fn init_logging() {
    let json = std::env::var("DESKWALLET_LOG_JSON").is_ok_and(|value| value == "1");
    let builder = fmt::Subscriber::builder().with_env_filter(env_filter()).with_writer(std::io::stderr);

    let _ = if json { builder.json().try_init() } else { builder.with_target(false).compact().try_init() };
}
