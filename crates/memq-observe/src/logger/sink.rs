//! Subscriber assembly: one filter, one output layer, installed globally.

use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::OffsetTime},
    layer::{Layered, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

/// Target of the queue crate's spans and events.
const QUEUE_TARGET: &str = "memq_core";

type Filtered = Layered<EnvFilter, Registry>;
type Output = Box<dyn Layer<Filtered> + Send + Sync>;

pub(super) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = filter(cfg)?;
    let output = output(cfg)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .map_err(classify)
}

/// Global directive, followed by the queue override when one is set.
fn directive(cfg: &LoggerConfig) -> String {
    match &cfg.queue_level {
        Some(queue) => format!("{},{QUEUE_TARGET}={queue}", cfg.level),
        None => cfg.level.clone(),
    }
}

fn filter(cfg: &LoggerConfig) -> Result<EnvFilter, LoggerError> {
    let directive = directive(cfg);
    EnvFilter::try_new(&directive).map_err(|_| LoggerError::InvalidLogLevel(directive))
}

fn output(cfg: &LoggerConfig) -> Result<Output, LoggerError> {
    let layer: Output = match cfg.format {
        LoggerFormat::Text => fmt::layer()
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_timer(local_rfc3339())
            .boxed(),
        // Flattened so task keys and worker ids sit next to the message.
        LoggerFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_target(cfg.with_targets)
            .with_timer(local_rfc3339())
            .boxed(),
        LoggerFormat::Journald => journald()?,
    };
    Ok(layer)
}

fn local_rfc3339() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn classify(err: TryInitError) -> LoggerError {
    let msg = err.to_string();
    if msg.contains("global default") || msg.contains("SetGlobalDefaultError") {
        LoggerError::AlreadyInitialized
    } else {
        LoggerError::InitializationFailed(msg)
    }
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald() -> Result<Output, LoggerError> {
    let layer = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?
        .with_syslog_identifier("memq".to_string());
    Ok(layer.boxed())
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald() -> Result<Output, LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::logger_init;

    #[test]
    fn queue_level_is_appended_as_a_target_directive() {
        let mut cfg = LoggerConfig {
            level: "warn".to_string(),
            ..Default::default()
        };
        assert_eq!(directive(&cfg), "warn");

        cfg.queue_level = Some("trace".to_string());
        assert_eq!(directive(&cfg), "warn,memq_core=trace");
        assert!(filter(&cfg).is_ok());
    }

    #[test]
    fn invalid_queue_level_is_rejected_before_install() {
        let cfg = LoggerConfig {
            queue_level: Some("loud".to_string()),
            ..Default::default()
        };
        let err = filter(&cfg).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidLogLevel(d) if d == "info,memq_core=loud"));
    }

    #[test]
    fn second_install_reports_already_initialized() {
        let cfg = LoggerConfig {
            format: LoggerFormat::Json,
            use_color: false,
            ..Default::default()
        };
        let first = logger_init(&cfg);
        let second = logger_init(&cfg);
        assert!(first.is_ok() || matches!(first, Err(LoggerError::AlreadyInitialized)));
        assert!(matches!(second, Err(LoggerError::AlreadyInitialized)));
    }
}
