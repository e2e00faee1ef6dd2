//! sends prometheus alertmanager style webhook notifications to a test endpoint
//!
//! Features:
//! - builds the notification out of a status, a severity and a service suffix
//! - posts it once, repeatedly, or as a firing then resolved pair
//! - ships a local webhook endpoint which logs whatever it receives

use std::process::ExitCode;

use anyhow::{Context, Result};
use receiver::ReceiverSettings;
use runner::Runner;
use sender::Sender;
use settings::{Mode, Settings};

mod alert;
mod builder;
mod log;
mod metrics;
mod receiver;
mod runner;
mod sender;
mod settings;
#[cfg(test)]
mod testing;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<ExitCode> {
	setup_panic_handler();

	let settings = Settings::init().context("failed to load config and command line arguments")?;

	log::setup_logging().context("could not setup logging")?;

	if settings.mode == Mode::Receive {
		receiver::run(ReceiverSettings::global())
			.await
			.context("webhook receiver failed to start or crashed")?;

		return Ok(ExitCode::SUCCESS);
	}

	let sender = Sender::new(&settings.sender).context("failed to construct sender")?;
	let runner = Runner::new(&sender, &settings.url, &settings.runner);

	let report = match settings.mode {
		Mode::Lifecycle => runner.lifecycle(&settings.payload).await,
		_ => runner.send(&settings.payload).await,
	};

	tracing::info!(
		delivered = report.delivered,
		rejected = report.rejected,
		failed = report.failed,
		"sent {} notifications to {}",
		report.total(),
		settings.url
	);

	Ok(if report.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
