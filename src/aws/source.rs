//! Credential sources used to sign identity proofs.
//!
//! [`AmbientSource`] delegates to the AWS SDK default provider chain (environment, shared config
//! and credentials files, SSO, `credential_process`, web identity, ECS, and instance metadata).
//! [`ProviderSource`] adapts any single SDK provider and [`StaticSource`] wraps fixed keys.
//!
//! A provider reporting that it is not configured on this host maps to `Ok(None)`; every other
//! provider failure surfaces as [`SigningError::CredentialSource`].

// crates.io
use async_lock::OnceCell;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::{
	ProvideCredentials, SharedCredentialsProvider, error::CredentialsError,
};
use aws_types::region::Region;
// self
use crate::{_prelude::*, aws::AwsCredentials, error::SigningError};

/// Boxed future returned by [`CredentialSource::resolve`].
pub type CredentialFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Option<AwsCredentials>, SigningError>> + 'a + Send>>;

/// A place AWS credentials may come from.
pub trait CredentialSource
where
	Self: Send + Sync,
{
	/// Stable label used in error messages and spans.
	fn name(&self) -> &'static str;

	/// Resolves credentials.
	///
	/// `Ok(None)` means the source is not configured on this host; errors mean it is configured
	/// but unusable.
	fn resolve(&self) -> CredentialFuture<'_>;
}

/// Credentials supplied explicitly by the caller.
#[derive(Clone, Debug)]
pub struct StaticSource(pub AwsCredentials);
impl StaticSource {
	/// Wraps long-term keys.
	pub fn from_keys(
		access_key_id: impl Into<String>,
		secret_access_key: impl Into<String>,
	) -> Self {
		Self(AwsCredentials::from_keys(access_key_id, secret_access_key, None))
	}
}
impl CredentialSource for StaticSource {
	fn name(&self) -> &'static str {
		"static"
	}

	fn resolve(&self) -> CredentialFuture<'_> {
		let credentials = self.0.clone();

		Box::pin(async move { Ok(Some(credentials)) })
	}
}

/// Adapts one AWS SDK credentials provider.
#[derive(Clone, Debug)]
pub struct ProviderSource {
	name: &'static str,
	provider: SharedCredentialsProvider,
}
impl ProviderSource {
	/// Wraps `provider`, labelling it `name` in errors and spans.
	pub fn new(name: &'static str, provider: impl 'static + ProvideCredentials) -> Self {
		Self { name, provider: SharedCredentialsProvider::new(provider) }
	}
}
impl CredentialSource for ProviderSource {
	fn name(&self) -> &'static str {
		self.name
	}

	fn resolve(&self) -> CredentialFuture<'_> {
		Box::pin(async move {
			let result = self.provider.provide_credentials().await;

			into_resolved(self.name, result)
		})
	}
}

/// Resolves credentials through the AWS SDK default provider chain.
///
/// The chain is loaded on first use and reused afterwards; the SDK caches the credentials it
/// resolves and refreshes temporary ones before they expire.
#[derive(Debug, Default)]
pub struct AmbientSource {
	region: Option<String>,
	provider: OnceCell<Option<SharedCredentialsProvider>>,
}
impl AmbientSource {
	/// Creates a source that loads the default chain lazily.
	pub fn new() -> Self {
		Self::default()
	}

	/// Pins the region used by region-aware providers (STS web identity, SSO).
	pub fn with_region(mut self, region: impl Into<String>) -> Self {
		self.region = Some(region.into()).filter(|region: &String| !region.is_empty());

		self
	}

	async fn provider(&self) -> Option<&SharedCredentialsProvider> {
		self.provider
			.get_or_init(|| async {
				let mut loader = aws_config::defaults(BehaviorVersion::latest());

				if let Some(region) = &self.region {
					loader = loader.region(Region::new(region.clone()));
				}

				loader.load().await.credentials_provider()
			})
			.await
			.as_ref()
	}
}
impl CredentialSource for AmbientSource {
	fn name(&self) -> &'static str {
		"ambient"
	}

	fn resolve(&self) -> CredentialFuture<'_> {
		Box::pin(async move {
			match self.provider().await {
				Some(provider) => into_resolved(self.name(), provider.provide_credentials().await),
				None => Ok(None),
			}
		})
	}
}

fn into_resolved(
	source_name: &'static str,
	result: Result<AwsCredentials, CredentialsError>,
) -> Result<Option<AwsCredentials>, SigningError> {
	match result {
		Ok(credentials) => Ok(Some(credentials)),
		Err(CredentialsError::CredentialsNotLoaded(_)) => Ok(None),
		Err(source) => Err(SigningError::CredentialSource { source_name, source }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn not_loaded_is_a_miss() {
		let resolved = into_resolved("env", Err(CredentialsError::not_loaded("no keys")))
			.expect("A provider that is not configured should not fail.");

		assert!(resolved.is_none());
	}

	#[test]
	fn provider_errors_name_the_source() {
		let err = into_resolved("profile", Err(CredentialsError::invalid_configuration("bad")))
			.expect_err("Invalid configuration should fail.");

		assert!(matches!(err, SigningError::CredentialSource { source_name: "profile", .. }));
	}

	#[tokio::test]
	async fn static_source_resolves_its_keys() {
		let credentials = StaticSource::from_keys("AKIDSTATIC", "secret")
			.resolve()
			.await
			.expect("Static source should not fail.")
			.expect("Static source should yield credentials.");

		assert_eq!(credentials.access_key_id(), "AKIDSTATIC");
		assert_eq!(credentials.session_token(), None);
	}

	#[test]
	fn empty_region_is_ignored() {
		assert!(AmbientSource::new().with_region("").region.is_none());
		assert_eq!(
			AmbientSource::new().with_region("eu-west-1").region.as_deref(),
			Some("eu-west-1"),
		);
	}
}
