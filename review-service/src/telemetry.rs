//! Tracing subscriber setup (§4.9). The core crates only ever call
//! `tracing::{debug,info,warn,error}`; composing a subscriber is this
//! binary's job, mirroring `ai-llm-service/src/telemetry.rs`'s
//! per-crate formatting layer, simplified to a single process-wide layer
//! since this binary is the whole process.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::time::FormatTime;

/// RFC3339 UTC timer via `chrono`, matching the retrieved corpus's
/// `ChronoRfc3339Utc` formatter (no extra `tracing-subscriber` timer feature).
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        w.write_str(&now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
    }
}

/// Initializes the global subscriber. Respects `RUST_LOG` if set, otherwise
/// defaults to `info` everywhere and `debug` for this binary's own target.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,review_service=debug,review_core=debug,llm_provider=debug")
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoRfc3339Utc::default())
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(std::io::stdout().is_terminal())
        .with_span_events(FmtSpan::CLOSE)
        .init();
}
