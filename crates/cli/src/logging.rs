use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `verbose`. With `log_file`, every event is also
/// appended to that file without colour codes.
pub fn init_logging(verbose: u8, log_file: Option<&Path>) {
	let level = match verbose {
		0 => "info",
		1 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(format!("warn,llgate={level},llgate_server={level},llgate_runtime={level}")));

	let file_layer = log_file.and_then(|path| match OpenOptions::new().create(true).append(true).open(path) {
		Ok(file) => Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
		Err(err) => {
			eprintln!("llgate: cannot open log file {}: {err}; logging to stderr only", path.display());
			None
		}
	});

	let _ = tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer().with_writer(std::io::stderr))
		.with(file_layer)
		.try_init();
}
