//! Process-wide tracing setup.
//!
//! Development builds log pretty, colored output to the console. Production builds log JSON lines
//! to daily rotated files under `logs/`, each line tagged with the pipeline id.

use fullsync_config::Environment;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::io::{self, Write};
use std::panic::PanicHookInfo;
use std::sync::{Once, OnceLock};
use thiserror::Error;
use tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, InitError};
use tracing_log::{LogTracer, log_tracer::SetLoggerError};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber, Registry, fmt, layer::SubscriberExt};

/// Field added to every production log line.
const PIPELINE_ID_KEY: &str = "pipeline_id";

const LOG_DIRECTORY: &str = "logs";

const MAX_LOG_FILES: usize = 5;

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to build rolling file appender: {0}")]
    InitAppender(#[from] InitError),

    #[error("failed to init log tracer: {0}")]
    InitLogTracer(#[from] SetLoggerError),

    #[error("failed to set global default subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),

    #[error("failed to load the environment: {0}")]
    Environment(#[from] io::Error),
}

/// Keeps buffered log lines alive until dropped.
///
/// Hold it until the end of `main`, production logs written after it is dropped are lost.
#[must_use]
pub enum LogFlusher {
    Flusher(WorkerGuard),
    NullFlusher,
}

static INIT_TEST_TRACING: Once = Once::new();

/// Enables console tracing in tests when `ENABLE_TRACING` is set.
///
/// ```bash
/// ENABLE_TRACING=1 cargo test table_is_replicated
/// ```
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_ok() {
            // Production would log to files.
            Environment::Dev.set();
            let _log_flusher = init_tracing("test").expect("failed to initialize test tracing");
        }
    });
}

static PIPELINE_ID: OnceLock<u64> = OnceLock::new();

/// Sets the pipeline id tagged on production log lines. Only the first call has an effect.
pub fn set_global_pipeline_id(pipeline_id: u64) {
    let _ = PIPELINE_ID.set(pipeline_id);
}

pub fn global_pipeline_id() -> Option<u64> {
    PIPELINE_ID.get().copied()
}

/// Writer adding the pipeline id to JSON log lines that do not carry one.
struct PipelineIdWriter<W> {
    inner: W,
}

impl<W: Write> Write for PipelineIdWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match tag_line(buf) {
            Some(tagged) => {
                self.inner.write_all(tagged.as_bytes())?;
                Ok(buf.len())
            }
            None => self.inner.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Returns `buf` with the pipeline id added, or `None` when it must be written unchanged.
fn tag_line(buf: &[u8]) -> Option<String> {
    let pipeline_id = global_pipeline_id()?;
    let line = std::str::from_utf8(buf).ok()?;

    let serde_json::Value::Object(mut fields) = serde_json::from_str::<serde_json::Value>(line).ok()? else {
        return None;
    };
    if fields.contains_key(PIPELINE_ID_KEY) {
        return None;
    }

    fields.insert(PIPELINE_ID_KEY.to_string(), pipeline_id.into());
    let mut tagged = serde_json::to_string(&fields).ok()?;
    if line.ends_with('\n') {
        tagged.push('\n');
    }

    Some(tagged)
}

/// Initializes tracing for `app_name`, the prefix of production log files.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    init_tracing_with_pipeline_id(app_name, None)
}

/// Like [`init_tracing`], also tagging production log lines with `pipeline_id`.
pub fn init_tracing_with_pipeline_id(
    app_name: &str,
    pipeline_id: Option<u64>,
) -> Result<LogFlusher, TracingError> {
    if let Some(pipeline_id) = pipeline_id {
        set_global_pipeline_id(pipeline_id);
    }

    // Forwards records of crates logging through `log`, e.g. tokio-postgres.
    LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_flusher = if Environment::load()?.is_prod() {
        configure_prod_tracing(filter, app_name)?
    } else {
        configure_dev_tracing(filter)?
    };

    set_tracing_panic_hook();

    Ok(log_flusher)
}

fn configure_prod_tracing(filter: EnvFilter, app_name: &str) -> Result<LogFlusher, TracingError> {
    let file_appender = rolling::Builder::new()
        .filename_prefix(app_name)
        .filename_suffix("log")
        .rotation(rolling::Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .build(LOG_DIRECTORY)?;
    let (file_appender, guard) = tracing_appender::non_blocking(file_appender);

    let format = fmt::format()
        .with_level(true)
        .with_ansi(false)
        .with_target(false);

    let subscriber = Registry::default().with(filter).with(
        fmt::layer()
            .event_format(format)
            .with_writer(move || PipelineIdWriter {
                inner: file_appender.make_writer(),
            })
            .json()
            .with_current_span(true)
            .with_span_list(true),
    );

    set_global_default(subscriber)?;

    Ok(LogFlusher::Flusher(guard))
}

fn configure_dev_tracing(filter: EnvFilter) -> Result<LogFlusher, TracingError> {
    let format = fmt::format()
        .with_level(true)
        .with_ansi(true)
        .pretty()
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let subscriber = FmtSubscriber::builder()
        .event_format(format)
        .with_env_filter(filter)
        .finish();

    set_global_default(subscriber)?;

    Ok(LogFlusher::NullFlusher)
}

/// Logs panics through tracing before running the previous hook.
fn set_tracing_panic_hook() {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log_panic(info);
        previous_hook(info);
    }));
}

fn log_panic(info: &PanicHookInfo) {
    let backtrace = Backtrace::capture();
    let (backtrace, note) = match backtrace.status() {
        BacktraceStatus::Captured => (Some(backtrace), None),
        BacktraceStatus::Disabled => (None, Some("run with RUST_BACKTRACE=1 to capture a backtrace")),
        _ => (None, Some("backtraces are not available")),
    };

    let payload = info
        .payload()
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload");

    tracing::error!(
        panic.payload = payload,
        panic.location = info.location().map(ToString::to_string),
        panic.backtrace = backtrace.map(tracing::field::display),
        panic.note = note,
        "a panic occurred",
    );
}
