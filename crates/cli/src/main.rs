use clap::Parser;
use llgate_server::{cli::Cli, logging};
use tracing::error;

#[tokio::main]
async fn main() {
	// Deployment overrides live next to the binary's working directory.
	let _ = dotenvy::from_filename_override(".env.local");

	let cli = Cli::parse();
	logging::init_logging(cli.verbose, cli.log_file.as_deref());

	let config = match cli.into_config() {
		Ok(config) => config,
		Err(err) => {
			error!(target = "llgate", error = %err, "invalid configuration");
			std::process::exit(2);
		}
	};

	if let Err(err) = llgate_server::serve(config).await {
		error!(target = "llgate", error = %format_args!("{err:#}"), "gateway failed");
		std::process::exit(1);
	}
}
