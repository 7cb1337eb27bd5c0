use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

type FileLayer = fmt::Layer<Registry, DefaultFields, Format, NonBlocking>;

/// Stdout logging for every command, plus an optional plain-text log file that
/// can be pointed at a new location while running.
pub struct Logging {
    file_layer: reload::Handle<Option<FileLayer>, Registry>,
    guard: Option<WorkerGuard>,
}

impl Logging {
    pub fn init() -> Self {
        let (file_layer, handle) = reload::Layer::new(None::<FileLayer>);
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(file_layer)
            .with(env_filter)
            .with(fmt::layer())
            .init();

        Self {
            file_layer: handle,
            guard: None,
        }
    }

    /// Also writes every event to `dir/file_name`, appending. Replaces any
    /// previous log file after flushing it.
    pub fn log_to_file(&mut self, dir: &Path, file_name: &str) -> anyhow::Result<()> {
        fs::create_dir_all(dir)?;
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);

        self.file_layer
            .reload(Some(fmt::layer().with_ansi(false).with_writer(writer)))?;
        self.guard = Some(guard);
        Ok(())
    }
}
