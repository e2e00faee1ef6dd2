//! assembles test notifications from a handful of configurable fields
//!
//! Everything except the status, the severity and the service suffix is
//! fixed, so two payloads built from the same [PayloadConfig] are equal.

use chrono::{DateTime, Duration, TimeZone, Utc};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::alert::{Alert, Notification, Status, KV, ZERO_TIME};

const RECEIVER: &str = "dynatrace-receiver";
const GENERATOR_URL: &str = "http://openshift.com";
const EXTERNAL_URL: &str = "http://8598cebf58a1:9093";
const FINGERPRINT: &str = "e425bb91067b6c9e";
const SERVICE_PREFIX: &str = "kubelet";
/// time between `startsAt` and `endsAt` of a resolved alert
const RESOLVED_AFTER_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// the variable part of a test notification
pub struct PayloadConfig {
	pub status: Status,
	pub severity: String,
	/// appended to the service label and the group key so runs can be told apart
	#[serde(default)]
	pub service_suffix: String,
}

impl Default for PayloadConfig {
	fn default() -> Self {
		Self { status: Status::Firing, severity: "warning".to_string(), service_suffix: String::new() }
	}
}

impl PayloadConfig {
	/// same payload identity with another status
	pub fn with_status(&self, status: Status) -> Self {
		Self { status, ..self.clone() }
	}

	pub fn build(&self) -> Notification {
		build(self)
	}
}

fn kv<const N: usize>(pairs: [(&str, &str); N]) -> KV {
	pairs.into_iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
}

#[allow(clippy::unwrap_used)]
static STARTS_AT: Lazy<DateTime<Utc>> = Lazy::new(|| {
	Utc.with_ymd_and_hms(2021, 3, 19, 1, 35, 45).unwrap() + Duration::milliseconds(720)
});

/// build a notification with a single alert out of `config`
pub fn build(config: &PayloadConfig) -> Notification {
	let PayloadConfig { status, severity, service_suffix } = config;
	let status = *status;

	let service = format!("{}{}", SERVICE_PREFIX, service_suffix);
	let starts_at = *STARTS_AT;
	let ends_at = match status {
		Status::Firing => *ZERO_TIME,
		Status::Resolved => starts_at + Duration::minutes(RESOLVED_AFTER_MINUTES),
	};

	let alert = Alert {
		status,
		labels: kv([
			("alertname", "TargetDown"),
			("job", "kubelet"),
			("namespace", "kube-system"),
			("prometheus", "kubelet"),
			("service", service.as_str()),
			("severity", severity.as_str()),
		]),
		annotations: kv([("message", "11.11% of the kubelet/kubelet targets in kube-system")]),
		starts_at,
		ends_at,
		generator_url: GENERATOR_URL.to_string(),
		fingerprint: FINGERPRINT.to_string(),
	};

	let group = kv([("alertname", "Test Alert"), ("cluster", "Cluster 02"), ("service", "Service 02")]);

	Notification {
		receiver: RECEIVER.to_string(),
		status,
		alerts: vec![alert],
		group_key: format!(
			r#"{{}}:{{alertname="Test Alert", cluster="Cluster 02", service="Service {}"}}"#,
			service_suffix
		),
		group_labels: group.clone(),
		common_labels: group,
		common_annotations: kv([
			("annotation_01", "annotation 01"),
			("annotation_02", "annotation 03"),
		]),
		external_url: EXTERNAL_URL.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config(status: Status, severity: &str, suffix: &str) -> PayloadConfig {
		PayloadConfig { status, severity: severity.into(), service_suffix: suffix.into() }
	}

	#[test]
	fn demo_suffix_lands_in_service_and_group_key() {
		let data = config(Status::Firing, "warning", "-demo-05").build();

		assert_eq!(data.alerts[0].labels["service"], "kubelet-demo-05");
		assert_eq!(data.alerts[0].labels["severity"], "warning");
		assert!(data
			.group_key
			.starts_with(r#"{}:{alertname="Test Alert", cluster="Cluster 02", service="Service -demo-05"#));
		assert_eq!(
			data.group_key,
			r#"{}:{alertname="Test Alert", cluster="Cluster 02", service="Service -demo-05"}"#
		);
	}

	#[test]
	fn service_label_is_prefix_and_suffix() {
		for suffix in ["", "-a", " spaced out ", "-ünïcode-☃", "\"quoted\"", "-demo-05"] {
			for status in [Status::Firing, Status::Resolved] {
				let data = config(status, "info", suffix).build();
				assert_eq!(data.alerts[0].labels["service"], format!("kubelet{}", suffix));
			}
		}
	}

	#[test]
	fn aggregate_status_matches_alert() {
		for status in [Status::Firing, Status::Resolved] {
			for severity in ["warning", "info", "critical"] {
				let data = config(status, severity, "-x").build();
				assert_eq!(data.status, status);
				assert_eq!(data.alerts[0].status, data.status);
				assert_eq!(data.validate(), Ok(()));
			}
		}
	}

	#[test]
	fn firing_alert_is_open_ended_and_resolved_is_not() {
		let firing = config(Status::Firing, "warning", "").build();
		assert!(firing.alerts[0].is_open_ended());

		let resolved = config(Status::Resolved, "warning", "").build();
		assert!(!resolved.alerts[0].is_open_ended());
		assert!(resolved.alerts[0].ends_at > resolved.alerts[0].starts_at);
	}

	#[test]
	fn fixed_fields() {
		let data = PayloadConfig::default().build();
		let alert = &data.alerts[0];

		assert_eq!(data.receiver, "dynatrace-receiver");
		assert_eq!(data.external_url, "http://8598cebf58a1:9093");
		assert_eq!(alert.fingerprint, "e425bb91067b6c9e");
		assert_eq!(alert.generator_url, "http://openshift.com");
		let wire = serde_json::to_value(alert).unwrap();
		assert_eq!(wire["startsAt"], "2021-03-19T01:35:45.72Z");
		assert_eq!(wire["endsAt"], "0001-01-01T00:00:00Z");
		assert_eq!(data.common_labels["cluster"], "Cluster 02");
		assert_eq!(data.group_labels, data.common_labels);
	}

	#[test]
	fn json_round_trip_is_lossless() {
		for status in [Status::Firing, Status::Resolved] {
			let data = config(status, "warning", "-demo-05").build();
			let wire = serde_json::to_string(&data).unwrap();
			let parsed: Notification = serde_json::from_str(&wire).unwrap();
			assert_eq!(parsed, data);
		}
	}

	#[test]
	fn with_status_keeps_identity() {
		let firing = config(Status::Firing, "info", "-run-7");
		let resolved = firing.with_status(Status::Resolved).build();

		assert_eq!(resolved.status, Status::Resolved);
		assert_eq!(resolved.group_key, firing.build().group_key);
		assert_eq!(resolved.alerts[0].labels, firing.build().alerts[0].labels);
	}
}
