//----------------------------------------------------------------------------------------- std lib
use std::io::Write;
use std::time::Instant;
//--------------------------------------------------------------------------------- other libraries
use env_logger::fmt::style::Style;
use log::info;
use once_cell::sync::Lazy;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan, layer::SubscriberExt as _};

// This will get initialized below.
/// Returns the init [`Instant`]
pub static INIT_INSTANT: Lazy<Instant> = Lazy::new(Instant::now);

/// Returns the seconds since [`INIT_INSTANT`].
#[cfg(not(tarpaulin_include))]
pub fn uptime() -> u64 {
    INIT_INSTANT.elapsed().as_secs()
}

/// The filter used when `RUST_LOG` is not set: everything off except the cadence crates.
fn default_filter(filter: log::LevelFilter) -> String {
    format!("off,cadence_core={filter},cadence_storage={filter}")
}

//---------------------------------------------------------------------------------------------------- Logger init function
#[allow(clippy::module_name_repetitions)]
/// Initializes the logger.
///
/// This enables console logging on all the internals of `Cadence`.
///
/// Functionality is provided by [`log`].
///
/// The levels are:
/// - ERROR
/// - WARN
/// - INFO
/// - DEBUG
/// - TRACE
///
/// # Panics
/// This must only be called _once_.
#[cfg(not(tarpaulin_include))]
pub fn init_logger(filter: log::LevelFilter) {
    use crate::format_duration;
    // Initialize timer.
    let now = Lazy::force(&INIT_INSTANT);

    let mut builder = env_logger::Builder::new();

    // `RUST_LOG` wins over the flag.
    let env = std::env::var("RUST_LOG").unwrap_or_default();
    if env.is_empty() {
        builder.parse_filters(&default_filter(filter));
    } else {
        builder.parse_filters(&env);
    }

    builder
        .format(move |buf, record| {
            let level_style = buf.default_level_style(record.level()).bold();
            let dimmed = Style::new().dimmed();
            let level = match record.level() {
                log::Level::Debug => "D",
                log::Level::Trace => "T",
                log::Level::Info => "I",
                log::Level::Warn => "W",
                log::Level::Error => "E",
            };
            writeln!(
                buf,
                // Longest PATH in the repo: `storage/src/db/schemas/cache_entry.rs` - `37` characters
                // Longest file in the repo: `core/src/playback/coordinator.rs`     - `3` digits
                //
                //      Longest PATH ---|        |--- Longest file
                //                      |        |
                //                      v        v
                "| {level_style}{level}{level_style:#} | {dimmed}{}{dimmed:#} | {dimmed}{: >37} @ {: <3}{dimmed:#} | {}",
                format_duration(&now.elapsed()),
                record.file_static().unwrap_or("???"),
                record.line().unwrap_or(0),
                record.args(),
            )
        })
        .write_style(env_logger::WriteStyle::Always)
        .init();

    if env.is_empty() {
        info!("Log Level (Flag) ... {filter}");
    } else {
        info!("Log Level (RUST_LOG) ... {env}");
    }
}

/// Initializes the tracing layer, recording the spans of the cadence crates.
#[must_use]
pub fn init_tracing() -> impl tracing::Subscriber {
    let filter = EnvFilter::builder().parse_lossy("off,cadence_core=trace,cadence_storage=trace");

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_span_events(FmtSpan::CLOSE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_str_eq;
    use rstest::rstest;

    #[rstest]
    #[case(log::LevelFilter::Info, "off,cadence_core=INFO,cadence_storage=INFO")]
    #[case(log::LevelFilter::Trace, "off,cadence_core=TRACE,cadence_storage=TRACE")]
    fn test_default_filter(#[case] filter: log::LevelFilter, #[case] expected: &str) {
        assert_str_eq!(default_filter(filter), expected);
    }

    #[test]
    fn test_tracing_records_only_cadence_spans() {
        tracing::subscriber::with_default(init_tracing(), || {
            let ours = tracing::info_span!("cadence_span");
            assert!(!ours.is_disabled());
            let _entered = ours.enter();

            let theirs = tracing::info_span!(target: "hyper::client", "foreign_span");
            assert!(theirs.is_disabled());
        });
    }
}
