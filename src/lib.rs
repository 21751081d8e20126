//! Lease-aware AWS credentials brokered by HashiCorp Vault: sign an STS identity proof, trade it
//! for a broker session, and hand out self-renewing credentials to any AWS client.
//!
//! # Testing
//!
//! The integration suites under `tests/` build on `_preludet`, which only exists with the
//! `test` feature. A plain `cargo test` runs the unit tests and skips those suites; run
//! `cargo test --features test` (or `--all-features`) to include them.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod aws;
pub mod bootstrap;
pub mod client;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod lease;
pub mod obs;
pub mod secret;
pub mod signer;
pub mod vault;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		aws::AwsCredentials,
		clock::ManualClock,
		http::ReqwestTransport,
		vault::VaultClient,
	};

	/// Access key used by fixtures; matches the AWS SigV4 documentation examples.
	pub const TEST_ACCESS_KEY_ID: &str = "AKIDEXAMPLE";
	/// Secret key used by fixtures; matches the AWS SigV4 documentation examples.
	pub const TEST_SECRET_ACCESS_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Builds a broker client pointed at a mock server base URL.
	pub fn build_reqwest_test_vault(base_url: &str) -> Arc<VaultClient<ReqwestTransport>> {
		let address = Url::parse(base_url).expect("Mock broker address should parse.");

		Arc::new(VaultClient::<ReqwestTransport>::new(address, test_reqwest_transport()))
	}

	/// Ambient identity used to sign fixtures.
	pub fn test_aws_credentials() -> AwsCredentials {
		AwsCredentials::from_keys(TEST_ACCESS_KEY_ID, TEST_SECRET_ACCESS_KEY, None)
	}

	/// Manual clock pinned to a fixed instant so lease arithmetic is deterministic.
	pub fn test_clock() -> Arc<ManualClock> {
		Arc::new(ManualClock::new(time::macros::datetime!(2025-01-01 00:00 UTC)))
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
