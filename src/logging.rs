use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Call once from `main`.
///
/// Mirrors the teacher's `eprintln!`-to-stderr convention but with
/// structured, level-filtered output: `RUST_LOG` overrides the default
/// `info` level, e.g. `RUST_LOG=medley=debug`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
