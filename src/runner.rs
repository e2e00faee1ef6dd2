//! Strictly sequential orchestration of the [Sender]
//!
//! Only one request is in flight at a time. A transport failure ends the run
//! unless `keep_going` is set, non 2xx answers never do.

use std::time::Duration;

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DurationSeconds};
use url::Url;

use crate::{
	alert::{Notification, Status},
	builder::PayloadConfig,
	sender::{Delivery, SendError, Sender},
};

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSettings {
	/// number of notifications posted by `send`
	pub repeat: u32,
	/// pause between two notifications of `send`
	#[serde_as(as = "DurationSeconds<f64, Flexible>")]
	pub delay: Duration,
	/// continue after a transport failure
	pub keep_going: bool,
	/// pause between the firing and the resolved notification of `lifecycle`
	#[serde_as(as = "DurationSeconds<f64, Flexible>")]
	pub resolve_after: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// tally of a run
pub struct Report {
	/// answered with 2xx
	pub delivered: u32,
	/// answered with anything else
	pub rejected: u32,
	/// no answer at all
	pub failed: u32,
}

impl Report {
	pub fn total(&self) -> u32 {
		self.delivered + self.rejected + self.failed
	}

	/// at least one notification was sent and every one of them got a 2xx
	pub fn is_success(&self) -> bool {
		self.delivered > 0 && self.delivered == self.total()
	}

	fn record(&mut self, result: &Result<Delivery, SendError>) {
		match result {
			Ok(delivery) if delivery.is_success() => self.delivered += 1,
			Ok(_) => self.rejected += 1,
			Err(_) => self.failed += 1,
		}
	}
}

pub struct Runner<'a> {
	sender: &'a Sender,
	url: &'a Url,
	settings: &'a RunnerSettings,
}

impl<'a> Runner<'a> {
	pub fn new(sender: &'a Sender, url: &'a Url, settings: &'a RunnerSettings) -> Self {
		Self { sender, url, settings }
	}

	/// post a freshly built notification `repeat` times
	pub async fn send(&self, payload: &PayloadConfig) -> Report {
		let mut report = Report::default();

		for n in 0..self.settings.repeat {
			if n > 0 && !self.settings.delay.is_zero() {
				tokio::time::sleep(self.settings.delay).await;
			}

			if !self.post(&payload.build(), &mut report).await {
				break;
			}
		}

		report
	}

	/// post the notification as firing, wait `resolve_after` and post it
	/// again as resolved
	pub async fn lifecycle(&self, payload: &PayloadConfig) -> Report {
		let mut report = Report::default();

		let firing = payload.with_status(Status::Firing).build();
		if self.post(&firing, &mut report).await {
			tracing::info!("resolving alert in {:?}", self.settings.resolve_after);
			tokio::time::sleep(self.settings.resolve_after).await;

			let resolved = payload.with_status(Status::Resolved).build();
			self.post(&resolved, &mut report).await;
		}

		report
	}

	/// returns whether the run should continue
	async fn post(&self, notification: &Notification, report: &mut Report) -> bool {
		let result = self.sender.send(self.url, notification).await;
		report.record(&result);

		match result {
			Ok(delivery) => {
				tracing::info!(
					status = %notification.status,
					response = %delivery.status,
					"posted notification to {}",
					self.url
				);
				true
			}
			Err(err) => {
				tracing::error!("{}", err);
				self.settings.keep_going
			}
		}
	}
}
