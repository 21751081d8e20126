//! Downstream credential capability consumed by AWS clients.
//!
//! Anything that can answer "give me current credentials" and "are they still valid" implements
//! [`CredentialsProvider`]. The lease provider is the main implementation; the static provider
//! covers tests and hosts with fixed keys.

// std
use std::time::SystemTime;
// self
use crate::{_prelude::*, aws::AwsCredentials, secret::Secret};

/// Boxed future returned by [`CredentialsProvider::retrieve`].
pub type CredentialsFuture<'a> = Pin<Box<dyn Future<Output = Result<Credentials>> + 'a + Send>>;

/// Opaque, refreshable source of AWS credentials.
pub trait CredentialsProvider
where
	Self: Send + Sync,
{
	/// Returns credentials that are valid right now, refreshing first if needed.
	fn retrieve(&self) -> CredentialsFuture<'_>;

	/// Returns `true` when the next [`retrieve`](CredentialsProvider::retrieve) would refresh.
	///
	/// Implementations must not perform I/O here.
	fn is_expired(&self) -> bool;
}

/// Credentials handed to a downstream client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
	/// Access key identifier.
	pub access_key_id: String,
	/// Secret access key.
	pub secret_access_key: Secret,
	/// Session token for temporary credentials.
	pub session_token: Option<Secret>,
	/// Instant after which the credentials must not be used, when known.
	pub expires_at: Option<OffsetDateTime>,
	/// Label of the provider that produced the credentials.
	pub provider_name: &'static str,
}
impl Credentials {
	/// Converts into the signing representation.
	pub fn to_aws(&self) -> AwsCredentials {
		AwsCredentials::new(
			self.access_key_id.as_str(),
			self.secret_access_key.expose(),
			self.session_token.as_ref().map(|token| token.expose().to_owned()),
			self.expires_at.map(SystemTime::from),
			self.provider_name,
		)
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("access_key_id", &self.access_key_id)
			.field("session_token_set", &self.session_token.is_some())
			.field("expires_at", &self.expires_at)
			.field("provider_name", &self.provider_name)
			.finish()
	}
}

/// Provider that always returns the same credentials and never expires.
#[derive(Clone, Debug)]
pub struct StaticCredentialsProvider {
	credentials: Credentials,
}
impl StaticCredentialsProvider {
	/// Wraps fixed credentials.
	pub fn new(credentials: AwsCredentials) -> Self {
		Self {
			credentials: Credentials {
				access_key_id: credentials.access_key_id().to_owned(),
				secret_access_key: Secret::new(credentials.secret_access_key()),
				session_token: credentials.session_token().map(Secret::new),
				expires_at: credentials.expiry().map(OffsetDateTime::from),
				provider_name: "static",
			},
		}
	}
}
impl CredentialsProvider for StaticCredentialsProvider {
	fn retrieve(&self) -> CredentialsFuture<'_> {
		let credentials = self.credentials.clone();

		Box::pin(async move { Ok(credentials) })
	}

	fn is_expired(&self) -> bool {
		false
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn static_provider_round_trips_credentials() {
		let provider = StaticCredentialsProvider::new(
			AwsCredentials::from_keys("AKIDSTATIC", "static-secret", Some("token".into())),
		);
		let credentials = provider.retrieve().await.expect("Static provider should not fail.");

		assert!(!provider.is_expired());
		assert_eq!(credentials.provider_name, "static");
		assert_eq!(credentials.to_aws().session_token(), Some("token"));
		assert!(!format!("{credentials:?}").contains("static-secret"));
	}
}
