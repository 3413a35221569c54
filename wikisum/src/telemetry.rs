use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `level` wins over `RUST_LOG`, which wins over
/// `fallback` (the config file's `[logging] level`).
pub fn init_tracing<W>(level: Option<&str>, fallback: &str, format: &str, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = level
        .and_then(|l| EnvFilter::try_new(l).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .or_else(|| EnvFilter::try_new(fallback).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    if format.eq_ignore_ascii_case("json") {
        fmt().json().with_env_filter(filter).with_writer(writer).init();
    } else {
        fmt().with_env_filter(filter).with_writer(writer).init();
    }
}
