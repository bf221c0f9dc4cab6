use dotenvy::dotenv;
use std::io::IsTerminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_env_layer() -> tracing_subscriber::EnvFilter {
    // a missing .env is the normal case, stay quiet about it
    if let Ok(path) = dotenv() {
        eprintln!(".env read successfully from {}", path.display());
    }

    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
}

/// Log to stderr. Stdout is reserved for program output.
pub fn init_tracing_to_stderr() {
    let env_layer = init_env_layer();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal());

    tracing_subscriber::registry()
        .with(env_layer)
        .with(stderr_layer)
        .init();
}
