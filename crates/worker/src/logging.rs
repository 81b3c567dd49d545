//! Tracing setup: stdout plus the run's `.log` file.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str =
    "sparza_worker=info,sparza_pipeline=info,sparza_llm=info,sparza_db=info";

/// Install the global subscriber.
///
/// The stdout layer is human-readable unless `json` is set. When `log_file`
/// is given, a second plain-text layer (no ANSI colours) appends to it.
pub fn init_tracing(log_file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let stdout_json = json.then(|| fmt::layer().json());
    let stdout_text = (!json).then(|| fmt::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_json)
        .with(stdout_text)
        .with(file_layer)
        .try_init()?;
    Ok(())
}
