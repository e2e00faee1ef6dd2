//! Posts notifications to a webhook endpoint
//!
//! A failing request never takes the process down: transport level problems
//! (refused connection, timeout, dns) come back as [SendError], and non 2xx
//! answers are an ordinary [Delivery] the caller can inspect.

use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use http::StatusCode;
use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DurationSeconds};
use thiserror::Error;
use url::Url;

use crate::{
	alert::Notification,
	metrics::{REQUEST_DURATION, SENT_NOTIFICATIONS},
};

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct SenderSettings {
	/// time a single request may take until it counts as failed
	#[serde_as(as = "DurationSeconds<f64, Flexible>")]
	pub timeout: Duration,
	pub retry: RetrySettings,
}

#[serde_as]
#[derive(Debug, Clone, Copy, Deserialize)]
/// settings used for retrying requests which failed on the transport level
pub struct RetrySettings {
	/// `0` sends every notification exactly once
	pub max_retries: u32,
	/// duration of the first backoff interval
	#[serde_as(as = "DurationSeconds<f64, Flexible>")]
	pub starting_interval: Duration,
	/// the maximum duration of a single backoff interval
	#[serde_as(as = "DurationSeconds<f64, Flexible>")]
	pub max_interval: Duration,
	/// the factor by which to increase each next backoff interval until
	/// `max_interval` is reached
	pub multiplier: f64,
}

impl RetrySettings {
	/// construct an `ExponentialBackoff` by the configured settings
	pub fn build(&self) -> ExponentialBackoff {
		ExponentialBackoffBuilder::default()
			.with_max_elapsed_time(None)
			.with_initial_interval(self.starting_interval)
			.with_max_interval(self.max_interval)
			.with_multiplier(self.multiplier)
			.with_randomization_factor(0_f64)
			.build()
	}
}

#[derive(Debug, Error)]
pub enum SendError {
	#[error("failed to construct http client: {0}")]
	Client(reqwest::Error),
	#[error("could not post notification to {url}: {error}")]
	Transport { url: Url, error: reqwest::Error },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// answer of the webhook endpoint
pub struct Delivery {
	pub status: StatusCode,
	pub body: String,
}

impl Delivery {
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}
}

#[derive(Debug, Clone)]
pub struct Sender {
	client: reqwest::Client,
	retry: RetrySettings,
}

impl Sender {
	pub fn new(settings: &SenderSettings) -> Result<Self, SendError> {
		let client = reqwest::Client::builder()
			.timeout(settings.timeout)
			.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.build()
			.map_err(SendError::Client)?;

		Ok(Self { client, retry: settings.retry })
	}

	/// post `notification` as json to `url`, retrying transport failures as
	/// configured
	pub async fn send(&self, url: &Url, notification: &Notification) -> Result<Delivery, SendError> {
		let mut backoff = self.retry.build();
		let mut retries = 0;

		loop {
			match self.post(url, notification).await {
				Ok(delivery) => return Ok(delivery),
				Err(err) if retries < self.retry.max_retries => {
					retries += 1;
					let interval = backoff.next_backoff().unwrap_or(self.retry.max_interval);
					tracing::warn!("{}, retry {}/{} in {:?}", err, retries, self.retry.max_retries, interval);
					tokio::time::sleep(interval).await;
				}
				Err(err) => {
					SENT_NOTIFICATIONS.with_label_values(&["failed"]).inc();
					return Err(err);
				}
			}
		}
	}

	async fn post(&self, url: &Url, notification: &Notification) -> Result<Delivery, SendError> {
		let transport = |error| SendError::Transport { url: url.clone(), error };

		let timer = REQUEST_DURATION.start_timer();
		let response = self.client.post(url.clone()).json(notification).send().await.map_err(transport)?;
		let status = response.status();
		let body = response.text().await.map_err(transport)?;
		timer.observe_duration();

		let delivery = Delivery { status, body };

		if delivery.is_success() {
			SENT_NOTIFICATIONS.with_label_values(&["delivered"]).inc();
			tracing::debug!(%url, %status, group_key = %notification.group_key, "notification delivered");
		} else {
			SENT_NOTIFICATIONS.with_label_values(&["rejected"]).inc();
			tracing::warn!(%url, %status, body = %delivery.body, "webhook returned non-2xx status");
		}

		Ok(delivery)
	}
}
