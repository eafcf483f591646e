//! Observability setup: structured logging to a JSON-lines file.
//!
//! Nothing here writes to stdout, which carries release output and the
//! `--json` report. Logs go to a file, or to stderr when no log file can be
//! opened.

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use tracing::Event;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "PKGREL_LOG_PATH";
const ENV_LOG_DIR: &str = "PKGREL_LOG_DIR";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Where and under which name logs are written.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// Service name; also the log file stem.
    pub service: String,
    /// Directory from the configuration file, if any.
    pub log_dir: Option<Utf8PathBuf>,
}

impl ObservabilityConfig {
    /// Build from the configured log directory.
    pub fn from_config(log_dir: Option<Utf8PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_dir,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogTarget {
    dir: Utf8PathBuf,
    file_name: String,
}

/// Keeps the background log writer alive; hold it until exit.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Install the global subscriber.
///
/// # Errors
///
/// Currently infallible: an unusable log location degrades to stderr.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (writer, log_guard) = match resolve_log_target(&cfg.service, cfg.log_dir.as_deref()) {
        Ok(target) => {
            let appender = tracing_appender::rolling::daily(&target.dir, &target.file_name);
            tracing_appender::non_blocking(appender)
        }
        Err(err) => {
            eprintln!("Warning: {err}. Falling back to stderr logging.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonLogLayer::new(writer))
        .init();

    tracing::debug!("observability initialized");

    Ok(ObservabilityGuard {
        _log_guard: log_guard,
    })
}

/// Build an `EnvFilter` from CLI flags and environment.
///
/// Priority: quiet flag > verbose flag > RUST_LOG env > configured level
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

// ============================================================================
// JSON Log Layer
// ============================================================================

struct JsonLogLayer<W> {
    writer: W,
}

impl<W> JsonLogLayer<W> {
    const fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<S, W> tracing_subscriber::Layer<S> for JsonLogLayer<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let mut visitor = JsonVisitor::default();
            attrs.record(&mut visitor);
            span.extensions_mut().insert(SpanFields(visitor.0));
        }
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = JsonVisitor::default();
        values.record(&mut visitor);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => fields.0.extend(visitor.0),
            None => extensions.insert(SpanFields(visitor.0)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let metadata = event.metadata();
        let mut map = Map::new();
        map.insert("timestamp".into(), Value::String(timestamp()));
        map.insert(
            "level".into(),
            Value::String(metadata.level().as_str().to_lowercase()),
        );
        map.insert("target".into(), Value::String(metadata.target().to_string()));

        // Fields of enclosing spans, outermost first, so the stage and
        // command in progress show up on every line.
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    map.extend(fields.0.clone());
                }
            }
        }

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        map.extend(visitor.0);

        let mut writer = self.writer.make_writer();
        if serde_json::to_writer(&mut writer, &Value::Object(map)).is_ok() {
            let _ = writer.write_all(b"\n");
        }
    }
}

#[derive(Clone, Debug)]
struct SpanFields(Map<String, Value>);

#[derive(Default)]
struct JsonVisitor(Map<String, Value>);

impl JsonVisitor {
    fn put(&mut self, field: &tracing::field::Field, value: Value) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl tracing::field::Visit for JsonVisitor {
    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.put(field, Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.put(field, Value::Number(value.into()));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        if let Some(number) = serde_json::Number::from_f64(value) {
            self.put(field, Value::Number(number));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}

/// RFC 3339 UTC timestamp with millisecond precision.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// Log Target Resolution
// ============================================================================

fn env_path(name: &str) -> Result<Option<Utf8PathBuf>, String> {
    std::env::var_os(name)
        .map(|value| {
            Utf8PathBuf::from_path_buf(value.into())
                .map_err(|path| format!("{name} is not valid UTF-8: {}", path.display()))
        })
        .transpose()
}

fn resolve_log_target(service: &str, config_dir: Option<&Utf8Path>) -> Result<LogTarget, String> {
    resolve_log_target_with(
        service,
        env_path(ENV_LOG_PATH)?,
        env_path(ENV_LOG_DIR)?,
        config_dir.map(Utf8Path::to_path_buf),
    )
}

/// First usable target out of: explicit path, env directory, configured
/// directory, the platform data directory, the system temp directory.
fn resolve_log_target_with(
    service: &str,
    path_override: Option<Utf8PathBuf>,
    dir_override: Option<Utf8PathBuf>,
    config_dir: Option<Utf8PathBuf>,
) -> Result<LogTarget, String> {
    if let Some(path) = path_override {
        return log_target_from_path(&path);
    }

    let file_name = format!("{service}{LOG_FILE_SUFFIX}");
    if let Some(dir) = dir_override.or(config_dir) {
        ensure_writable(&dir, &file_name)?;
        return Ok(LogTarget { dir, file_name });
    }

    let candidates = [
        pkgrel_core::config::user_data_local_dir().map(|dir| dir.join("logs")),
        Utf8PathBuf::from_path_buf(std::env::temp_dir())
            .ok()
            .map(|dir| dir.join(service)),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|dir| ensure_writable(dir, &file_name).is_ok())
        .map(|dir| LogTarget { dir, file_name })
        .ok_or_else(|| "no writable log directory found".to_string())
}

fn log_target_from_path(path: &Utf8Path) -> Result<LogTarget, String> {
    let file_name = path
        .file_name()
        .ok_or_else(|| format!("{ENV_LOG_PATH} must include a file name"))?
        .to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    ensure_writable(&dir, &file_name)?;
    Ok(LogTarget { dir, file_name })
}

fn ensure_writable(dir: &Utf8Path, file_name: &str) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("failed to create log directory {dir}: {e}"))?;

    let path = dir.join(file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("failed to open log file {path}: {e}"))?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
