//! Diagnostics for the `quotebook` binary.
//!
//! Documents and reports are printed on stdout, so log records always go
//! to stderr. They can also be appended to a file with `--log-file`.

use std::{
    fs::File,
    io::{self, IsTerminal, Write},
    path::Path,
    sync::{Mutex, MutexGuard, OnceLock, PoisonError},
};

use anyhow::{Context, Result, bail};
use chrono::Local;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{
        FmtContext, MakeWriter,
        format::{FormatEvent, FormatFields, Writer},
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
};

/// Filter used when neither `RUST_LOG` nor `--log-level` is given.
pub const DEFAULT_LEVEL: &str = "warn";

static FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();
static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);
static INSTALLING: Mutex<()> = Mutex::new(());

/// `2026-10-12 09:41:07.215  INFO quote_core::lifecycle: quote accepted number="DEV-2026-00001"`
struct RecordLine;

fn level_colour(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "\x1b[31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "\x1b[32m",
        Level::DEBUG => "\x1b[34m",
        Level::TRACE => "\x1b[35m",
    }
}

impl<S, N> FormatEvent<S, N> for RecordLine
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");

        if writer.has_ansi_escapes() {
            write!(
                writer,
                "\x1b[2m{stamp}\x1b[0m {}{:>5}\x1b[0m {}: ",
                level_colour(meta.level()),
                meta.level(),
                meta.target()
            )?;
        } else {
            write!(writer, "{stamp} {:>5} {}: ", meta.level(), meta.target())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Writes into [`LOG_FILE`], or nowhere while no file is open.
#[derive(Clone, Copy)]
struct LogFileWriter;

struct OpenLogFile(MutexGuard<'static, Option<File>>);

fn lock_log_file() -> MutexGuard<'static, Option<File>> {
    LOG_FILE.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Write for OpenLogFile {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        self.0.as_mut().map_or(Ok(buf.len()), |file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.as_mut().map_or(Ok(()), |file| file.flush())
    }
}

impl<'a> MakeWriter<'a> for LogFileWriter {
    type Writer = OpenLogFile;

    fn make_writer(&'a self) -> Self::Writer {
        OpenLogFile(lock_log_file())
    }
}

/// Parses a bare level (`info`) or EnvFilter directives
/// (`quote_core=debug,sqlx=warn`).
pub fn parse_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives).with_context(|| format!("invalid log filter '{directives}'"))
}

/// Installs the stderr and file layers.
///
/// `directives` wins over `RUST_LOG`, which wins over [`DEFAULT_LEVEL`].
/// Calling this again only swaps the filter.
pub fn init_logging(directives: Option<&str>) -> Result<()> {
    let filter = match directives {
        Some(directives) => parse_filter(directives)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL)),
    };

    let _installing = INSTALLING.lock().unwrap_or_else(PoisonError::into_inner);
    if FILTER.get().is_some() {
        return set_filter(filter);
    }

    let (filter_layer, handle) = reload::Layer::new(filter);
    let stderr = tracing_subscriber::fmt::layer()
        .event_format(RecordLine)
        .with_ansi(io::stderr().is_terminal())
        .with_writer(io::stderr);
    let file = tracing_subscriber::fmt::layer()
        .event_format(RecordLine)
        .with_ansi(false)
        .with_writer(LogFileWriter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stderr)
        .with(file)
        .try_init()
        .context("another logger is already installed")?;
    let _ = FILTER.set(handle);
    Ok(())
}

/// Swaps the active filter at runtime.
pub fn set_log_level(directives: &str) -> Result<()> {
    set_filter(parse_filter(directives)?)
}

fn set_filter(filter: EnvFilter) -> Result<()> {
    let Some(handle) = FILTER.get() else {
        bail!("logging is not initialised");
    };
    handle.reload(filter).context("cannot swap the log filter")
}

/// Appends every record to `path` as well as stderr. The parent directory
/// must exist.
pub fn enable_file_logging(path: &Path) -> Result<()> {
    if FILTER.get().is_none() {
        bail!("logging is not initialised");
    }
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file '{}'", path.display()))?;
    *lock_log_file() = Some(file);
    Ok(())
}
