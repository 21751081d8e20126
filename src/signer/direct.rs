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

/// Signs identity proofs against the global STS endpoint in `us-east-1`.
#[derive(Clone)]
pub struct DirectSigner {
	source: Arc<dyn CredentialSource>,
	clock: Arc<dyn Clock>,
}
impl DirectSigner {
	/// Creates a signer backed by an explicit credential source.
	pub fn new(source: impl 'static + CredentialSource) -> Self {
		Self { source: Arc::new(source), clock: Arc::new(SystemClock) }
	}

	/// Creates a signer backed by the AWS SDK default credential chain.
	pub fn ambient() -> Self {
		Self::new(AmbientSource::new())
	}

	/// Overrides the clock used for signing timestamps.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}
}
impl Debug for DirectSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DirectSigner")
			.field("source", &self.source.name())
			.field("endpoint", &GLOBAL_STS_ENDPOINT)
			.finish()
	}
}
impl IdentitySigner for DirectSigner {
	fn build_proof<'a>(
		&'a self,
		role: &'a str,
		server_id_header: Option<&'a str>,
	) -> ProofFuture<'a> {
		Box::pin(async move {
			let endpoint = Url::parse(GLOBAL_STS_ENDPOINT)
				.map_err(|_| SigningError::InvalidEndpoint { url: GLOBAL_STS_ENDPOINT.into() })?;

			sign_identity_request(
				self.source.as_ref(),
				self.clock.as_ref(),
				&endpoint,
				DEFAULT_SIGNING_REGION,
				role,
				server_id_header,
				"direct",
			)
			.await
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{aws::StaticSource, clock::ManualClock};

	#[tokio::test]
	async fn direct_signer_uses_global_scope() {
		let signer = DirectSigner::new(StaticSource::from_keys("AKIDDIRECT", "secret"))
			.with_clock(Arc::new(ManualClock::new(time::macros::datetime!(2025-03-04 05:06 UTC))));
		let proof =
			signer.build_proof("deploy", None).await.expect("Direct signer should build a proof.");

		assert_eq!(proof.role, "deploy");
		assert_eq!(proof.url.as_str(), GLOBAL_STS_ENDPOINT);
		assert!(
			proof
				.header_value("authorization")
				.expect("Proof should be signed.")
				.contains("Credential=AKIDDIRECT/20250304/us-east-1/sts/aws4_request"),
		);
	}

	#[test]
	fn ambient_signer_defers_to_sdk_chain() {
		let rendered = format!("{:?}", DirectSigner::ambient());

		assert!(rendered.contains("\"ambient\""));
		assert!(rendered.contains(GLOBAL_STS_ENDPOINT));
	}
}
