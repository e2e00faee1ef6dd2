//! data structures of the alertmanager webhook payload
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// label and annotation sets keep their insertion order on the wire
pub type KV = IndexMap<String, String>;

/// `endsAt` value of an alert that is still firing
#[allow(clippy::unwrap_used)]
pub static ZERO_TIME: Lazy<DateTime<Utc>> =
	Lazy::new(|| Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
	Firing,
	Resolved,
}

impl Status {
	pub fn as_str(&self) -> &'static str {
		match self {
			Status::Firing => "firing",
			Status::Resolved => "resolved",
		}
	}
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for Status {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"firing" => Ok(Status::Firing),
			"resolved" => Ok(Status::Resolved),
			_ => Err(ValidationError::UnknownStatus(s.to_string())),
		}
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
	#[error("unknown alert status {0:?}, expected \"firing\" or \"resolved\"")]
	UnknownStatus(String),
	#[error("alert {index} is {alert} but the notification is {notification}")]
	InconsistentStatus { index: usize, alert: Status, notification: Status },
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// the webhook payload alertmanager posts to a receiver
#[allow(clippy::missing_docs_in_private_items)]
pub struct Notification {
	pub receiver: String,
	pub status: Status,
	pub alerts: Vec<Alert>,
	pub group_key: String,
	pub group_labels: KV,
	pub common_labels: KV,
	pub common_annotations: KV,
	#[serde(rename = "externalURL")]
	pub external_url: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::missing_docs_in_private_items)]
pub struct Alert {
	pub status: Status,
	pub labels: KV,
	pub annotations: KV,
	#[serde(with = "timestamp")]
	pub starts_at: DateTime<Utc>,
	#[serde(with = "timestamp")]
	pub ends_at: DateTime<Utc>,
	#[serde(rename = "generatorURL")]
	pub generator_url: String,
	pub fingerprint: String,
}

/// RFC 3339 without trailing zeros in the fraction, the way alertmanager
/// writes timestamps (`01:35:45.72Z`, `00:00:00Z`)
mod timestamp {
	use chrono::{DateTime, SecondsFormat, Utc};
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn format(time: &DateTime<Utc>) -> String {
		let nanos = time.to_rfc3339_opts(SecondsFormat::Nanos, true);
		let (fraction, _) = nanos.rsplit_once('Z').unwrap_or((nanos.as_str(), ""));
		let trimmed = fraction.trim_end_matches('0').trim_end_matches('.');
		format!("{}Z", trimmed)
	}

	pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&format(time))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
		DateTime::<Utc>::deserialize(deserializer)
	}
}

impl Alert {
	/// an alert without a known end is still firing
	pub fn is_open_ended(&self) -> bool {
		self.ends_at == *ZERO_TIME
	}
}

impl Notification {
	/// every contained alert must carry the aggregate status
	pub fn validate(&self) -> Result<(), ValidationError> {
		match self.alerts.iter().position(|alert| alert.status != self.status) {
			Some(index) => Err(ValidationError::InconsistentStatus {
				index,
				alert: self.alerts[index].status,
				notification: self.status,
			}),
			None => Ok(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const WIRE: &str = r#"{
		"receiver": "dynatrace-receiver",
		"status": "firing",
		"alerts": [
			{
				"status": "firing",
				"labels": {"alertname": "Test Alert", "cluster": "Cluster 02", "service": "Service 02"},
				"annotations": {"annotation_01": "annotation 01"},
				"startsAt": "2021-03-19T01:35:45.72Z",
				"endsAt": "0001-01-01T00:00:00Z",
				"generatorURL": "http://openshift.com",
				"fingerprint": "e425bb91067b6c9e"
			}
		],
		"groupKey": "{}:{alertname=\"Test Alert\"}",
		"groupLabels": {"alertname": "Test Alert"},
		"commonLabels": {"alertname": "Test Alert"},
		"commonAnnotations": {},
		"externalURL": "http://8598cebf58a1:9093"
	}"#;

	#[test]
	fn decodes_alertmanager_wire_names() {
		let data: Notification = serde_json::from_str(WIRE).unwrap();

		assert_eq!(data.status, Status::Firing);
		assert_eq!(data.external_url, "http://8598cebf58a1:9093");
		assert_eq!(data.alerts[0].generator_url, "http://openshift.com");
		assert_eq!(data.alerts[0].fingerprint, "e425bb91067b6c9e");
		assert!(data.alerts[0].is_open_ended());
		assert_eq!(
			data.alerts[0].labels.keys().collect::<Vec<_>>(),
			["alertname", "cluster", "service"]
		);
	}

	#[test]
	fn timestamps_keep_alertmanager_format() {
		let data: Notification = serde_json::from_str(WIRE).unwrap();
		let value = serde_json::to_value(&data.alerts[0]).unwrap();

		assert_eq!(value["startsAt"], "2021-03-19T01:35:45.72Z");
		assert_eq!(value["endsAt"], "0001-01-01T00:00:00Z");
		assert_eq!(timestamp::format(&*ZERO_TIME), "0001-01-01T00:00:00Z");
	}

	#[test]
	fn rejects_unknown_status() {
		let wire = WIRE.replacen("\"status\": \"firing\"", "\"status\": \"pending\"", 1);
		assert!(serde_json::from_str::<Notification>(&wire).is_err());
		assert_eq!(
			"pending".parse::<Status>(),
			Err(ValidationError::UnknownStatus("pending".into()))
		);
		assert_eq!("Resolved".parse::<Status>(), Ok(Status::Resolved));
	}

	#[test]
	fn validate_reports_first_inconsistent_alert() {
		let mut data: Notification = serde_json::from_str(WIRE).unwrap();
		assert_eq!(data.validate(), Ok(()));

		let mut resolved = data.alerts[0].clone();
		resolved.status = Status::Resolved;
		data.alerts.push(resolved);

		assert_eq!(
			data.validate(),
			Err(ValidationError::InconsistentStatus {
				index: 1,
				alert: Status::Resolved,
				notification: Status::Firing,
			})
		);
	}
}
