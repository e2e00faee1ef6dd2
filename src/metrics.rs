//! prometheus meters shared by the sender and the receiver
//!
//! The meters live in the default registry, so they are registered exactly once
//! per process no matter how many senders or receivers get constructed.
#![allow(clippy::expect_used)]

use once_cell::sync::Lazy;
use prometheus::{
	exponential_buckets, histogram_opts, opts, register_histogram, register_int_counter_vec,
	Histogram, IntCounterVec,
};

/// posted notifications, labelled by `outcome`: `delivered`, `rejected` or `failed`
pub static SENT_NOTIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
	register_int_counter_vec!(
		opts!("sent_notifications", "total number of posted notifications")
			.namespace("alertpush")
			.subsystem("sender"),
		&["outcome"]
	)
	.expect("failed to register sent_notifications")
});

pub static REQUEST_DURATION: Lazy<Histogram> = Lazy::new(|| {
	register_histogram!(histogram_opts!(
		"alertpush_sender_request_duration_seconds",
		"time until the webhook endpoint answered",
		exponential_buckets(0.005, 2., 12).expect("invalid buckets")
	))
	.expect("failed to register request_duration_seconds")
});

/// notifications decoded by the receiver, labelled by their aggregate `status`
/// (or `invalid`)
pub static RECEIVED_NOTIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
	register_int_counter_vec!(
		opts!("received_notifications", "total number of notifications posted to the receiver")
			.namespace("alertpush")
			.subsystem("receiver"),
		&["status"]
	)
	.expect("failed to register received_notifications")
});
