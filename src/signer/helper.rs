// self
use crate::{
	_prelude::*,
	aws::{AmbientSource, CredentialSource},
	clock::{Clock, SystemClock},
	error::SigningError,
	signer::{
		DEFAULT_SIGNING_REGION, GLOBAL_STS_ENDPOINT, IdentitySigner, ProofFuture,
		sign_identity_request,
	},
};

/// Pre-built IAM auth helper: signs against a regional STS endpoint.
///
/// Without a region it behaves like [`DirectSigner`](crate::signer::DirectSigner). A custom
/// endpoint (VPC endpoint, FIPS endpoint, test double) overrides the derived one but keeps the
/// configured signing region.
#[derive(Clone)]
pub struct IamAuthHelper {
	source: Arc<dyn CredentialSource>,
	clock: Arc<dyn Clock>,
	region: Option<String>,
	endpoint: Option<Url>,
}
impl IamAuthHelper {
	/// Creates a helper backed by an explicit credential source.
	pub fn new(source: impl 'static + CredentialSource) -> Self {
		Self { source: Arc::new(source), clock: Arc::new(SystemClock), region: None, endpoint: None }
	}

	/// Creates a helper backed by the AWS SDK default credential chain.
	pub fn ambient() -> Self {
		Self::new(AmbientSource::new())
	}

	/// Sets the STS region.
	pub fn with_region(mut self, region: impl Into<String>) -> Self {
		self.region = Some(region.into()).filter(|region: &String| !region.is_empty());

		self
	}

	/// Pins the STS endpoint.
	pub fn with_endpoint(mut self, endpoint: Url) -> Self {
		self.endpoint = Some(endpoint);

		self
	}

	/// Overrides the clock used for signing timestamps.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Region placed in the credential scope.
	pub fn signing_region(&self) -> &str {
		self.region.as_deref().unwrap_or(DEFAULT_SIGNING_REGION)
	}

	/// Endpoint the proof targets.
	pub fn endpoint(&self) -> Result<Url, SigningError> {
		if let Some(endpoint) = &self.endpoint {
			return Ok(endpoint.clone());
		}

		let raw = match &self.region {
			Some(region) => format!("https://sts.{region}.amazonaws.com/"),
			None => GLOBAL_STS_ENDPOINT.to_owned(),
		};

		Url::parse(&raw).map_err(|_| SigningError::InvalidEndpoint { url: raw })
	}
}
impl Debug for IamAuthHelper {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IamAuthHelper")
			.field("source", &self.source.name())
			.field("region", &self.region)
			.field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
			.finish()
	}
}
impl IdentitySigner for IamAuthHelper {
	fn build_proof<'a>(
		&'a self,
		role: &'a str,
		server_id_header: Option<&'a str>,
	) -> ProofFuture<'a> {
		Box::pin(async move {
			let endpoint = self.endpoint()?;

			sign_identity_request(
				self.source.as_ref(),
				self.clock.as_ref(),
				&endpoint,
				self.signing_region(),
				role,
				server_id_header,
				"iam_helper",
			)
			.await
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::aws::StaticSource;

	fn helper() -> IamAuthHelper {
		IamAuthHelper::new(StaticSource::from_keys("AKIDHELPER", "secret"))
	}

	#[test]
	fn endpoint_follows_region() {
		assert_eq!(
			helper().with_region("eu-west-1").endpoint().expect("Regional endpoint should parse.").as_str(),
			"https://sts.eu-west-1.amazonaws.com/",
		);
		assert_eq!(
			helper().endpoint().expect("Global endpoint should parse.").as_str(),
			GLOBAL_STS_ENDPOINT,
		);
		assert_eq!(helper().with_region("").signing_region(), DEFAULT_SIGNING_REGION);
	}

	#[tokio::test]
	async fn custom_endpoint_keeps_signing_region() {
		let endpoint = Url::parse("https://sts.internal.example:8443/").expect("Fixture should parse.");
		let proof = helper()
			.with_region("ap-southeast-2")
			.with_endpoint(endpoint.clone())
			.build_proof("deploy", Some("vault.internal"))
			.await
			.expect("Helper should build a proof.");

		assert_eq!(proof.url, endpoint);
		assert_eq!(proof.header_value("host"), Some("sts.internal.example:8443"));
		assert!(
			proof
				.header_value("authorization")
				.expect("Proof should be signed.")
				.contains("/ap-southeast-2/sts/aws4_request"),
		);
	}
}
