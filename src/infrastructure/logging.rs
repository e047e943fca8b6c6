//! Global tracing subscriber setup

use tracing::Subscriber;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber writing to stdout; fails if one is already set
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    build_subscriber(config, std::io::stdout).try_init()?;

    tracing::info!(level = %config.level, "Logging initialized");
    Ok(())
}

/// Subscriber for `config` writing through `writer`
///
/// `RUST_LOG` overrides the configured level when set.
pub fn build_subscriber<W>(config: &LoggingConfig, writer: W) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (json, pretty) = match config.format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_writer(writer),
            ),
            None,
        ),
        LogFormat::Pretty => (
            None,
            Some(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_writer(writer),
            ),
        ),
    };

    Box::new(
        tracing_subscriber::registry()
            .with(filter)
            .with(json)
            .with(pretty),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    // Collects formatted output in memory
    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'writer> MakeWriter<'writer> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'writer self) -> Self::Writer {
            self.clone()
        }
    }

    fn config(level: &str, format: LogFormat) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            format,
        }
    }

    #[test]
    fn test_json_format_emits_structured_fields() {
        let buffer = Buffer::default();
        let subscriber = build_subscriber(&config("info", LogFormat::Json), buffer.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(experiment = "checkout", "Experiment observation");
        });

        let output = buffer.contents();
        let line: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(line["fields"]["message"], "Experiment observation");
        assert_eq!(line["fields"]["experiment"], "checkout");
    }

    #[test]
    fn test_pretty_format_emits_message() {
        let buffer = Buffer::default();
        let subscriber = build_subscriber(&config("info", LogFormat::Pretty), buffer.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("Candidate panicked");
        });

        assert!(buffer.contents().contains("Candidate panicked"));
    }

    #[test]
    fn test_level_filters_events() {
        let buffer = Buffer::default();
        let subscriber = build_subscriber(&config("warn", LogFormat::Json), buffer.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("Running experiment");
        });

        if std::env::var_os("RUST_LOG").is_none() {
            assert!(buffer.contents().is_empty());
        }
    }
}
