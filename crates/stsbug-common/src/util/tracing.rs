use tracing::metadata::LevelFilter;
use tracing_log::AsTrace;
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

pub type TracingHandle = reload::Handle<EnvFilter, Registry>;

fn env_filter(level: Option<log::LevelFilter>) -> EnvFilter {
    let level = level.map(|level| level.as_trace()).unwrap_or(LevelFilter::INFO);
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Installs the global fmt subscriber. `RUST_LOG` directives take
/// precedence over `level`. Returns `None` when a subscriber is already set.
pub fn setup_tracing(level: Option<log::LevelFilter>) -> Option<TracingHandle> {
    let (filter, handle) = reload::Layer::new(env_filter(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .ok()
        .map(|_| handle)
}

/// Swaps the default level of an installed subscriber, keeping `RUST_LOG`.
pub fn reload_level(handle: &TracingHandle, level: log::LevelFilter) -> Result<(), reload::Error> {
    handle.reload(env_filter(Some(level)))
}
