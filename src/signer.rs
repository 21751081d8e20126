//! Identity Signer capability: produce a signed STS `GetCallerIdentity` request that the broker
//! replays to learn who the caller is.
//!
//! Two interchangeable strategies share one signing path:
//! - [`DirectSigner`] signs against the global STS endpoint with the ambient credential chain.
//! - [`IamAuthHelper`] targets a regional (or custom) STS endpoint.
//!
//! A proof is never sent to STS by this crate. The broker forwards it verbatim, so every header
//! present at signing time travels in the payload and is covered by the signature, including the
//! optional server-ID header that pins the proof to one broker.

mod direct;
mod helper;

pub use direct::*;
pub use helper::*;

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	aws::{
		AwsCredentials, CredentialSource,
		sigv4::{self, SigningParams},
	},
	clock::Clock,
	error::SigningError,
	http::{HttpMethod, HttpRequest},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Header binding a proof to a specific broker instance.
pub const SERVER_ID_HEADER: &str = "X-Vault-AWS-IAM-Server-ID";
/// Form body of the identity request.
pub const STS_REQUEST_BODY: &str = "Action=GetCallerIdentity&Version=2011-06-15";
/// Content type of the identity request.
pub const STS_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
/// Global STS endpoint.
pub const GLOBAL_STS_ENDPOINT: &str = "https://sts.amazonaws.com/";
/// Signing region paired with the global STS endpoint.
pub const DEFAULT_SIGNING_REGION: &str = "us-east-1";

/// Boxed future returned by [`IdentitySigner::build_proof`].
pub type ProofFuture<'a> =
	Pin<Box<dyn Future<Output = Result<IdentityProof, SigningError>> + 'a + Send>>;

/// Builds proofs of identity from the host's ambient cloud identity.
pub trait IdentitySigner
where
	Self: Send + Sync,
{
	/// Builds and signs a fresh proof for `role`.
	///
	/// A non-empty `server_id_header` is added as a signed header before signing.
	fn build_proof<'a>(
		&'a self,
		role: &'a str,
		server_id_header: Option<&'a str>,
	) -> ProofFuture<'a>;
}

/// Signed identity request, ready to be encoded for the broker.
///
/// Proofs are single-use: the broker rejects replays outside the validity window of the
/// embedded `x-amz-date`. The role travels next to the signed request and is not itself signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityProof {
	/// Trusted role the proof is issued for.
	pub role: String,
	/// Request method.
	pub method: HttpMethod,
	/// Identity endpoint URL.
	pub url: Url,
	/// Every header sent with the request, grouped by name in signing order.
	pub headers: BTreeMap<String, Vec<String>>,
	/// Request body.
	pub body: Vec<u8>,
}
impl IdentityProof {
	/// Captures a request signed on behalf of `role`.
	pub fn from_request(role: impl Into<String>, request: HttpRequest) -> Self {
		let mut headers = BTreeMap::<String, Vec<String>>::new();

		for (name, value) in request.headers {
			headers.entry(name).or_default().push(value);
		}

		Self {
			role: role.into(),
			method: request.method,
			url: request.url,
			headers,
			body: request.body,
		}
	}

	/// Rebuilds the signed request, headers in capture order.
	pub fn to_request(&self) -> HttpRequest {
		let mut request = HttpRequest::new(self.method, self.url.clone()).body(self.body.clone());

		for (name, values) in &self.headers {
			for value in values {
				request = request.header(name.as_str(), value.as_str());
			}
		}

		request
	}

	/// Encodes the proof into the broker's login body.
	pub fn to_payload(&self) -> Result<LoginPayload, serde_json::Error> {
		let headers = serde_json::to_vec(&self.headers)?;

		Ok(LoginPayload {
			iam_http_request_method: self.method.as_str().to_owned(),
			iam_request_url: STANDARD.encode(self.url.as_str()),
			iam_request_headers: STANDARD.encode(headers),
			iam_request_body: STANDARD.encode(&self.body),
			role: self.role.clone(),
		})
	}

	/// Returns the first value recorded for `name`, ignoring case.
	pub fn header_value(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.and_then(|(_, values)| values.first())
			.map(String::as_str)
	}
}

/// Login body accepted by the broker's AWS auth method.
///
/// URL, headers, and body are base64 (standard alphabet) so the broker's schema deals only in
/// printable strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPayload {
	/// Upper-case HTTP method.
	pub iam_http_request_method: String,
	/// Base64 request URL.
	pub iam_request_url: String,
	/// Base64 JSON object mapping header names to value lists.
	pub iam_request_headers: String,
	/// Base64 request body.
	pub iam_request_body: String,
	/// Trusted role requested at login.
	pub role: String,
}

/// Resolves credentials from `source` and signs an identity request for `endpoint`.
pub(crate) async fn sign_identity_request(
	source: &dyn CredentialSource,
	clock: &dyn Clock,
	endpoint: &Url,
	region: &str,
	role: &str,
	server_id_header: Option<&str>,
	stage: &'static str,
) -> Result<IdentityProof, SigningError> {
	const KIND: FlowKind = FlowKind::SignProof;

	let span = FlowSpan::new(KIND, stage);

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

	let result = span
		.instrument(async move {
			let credentials = resolve_credentials(source).await?;
			let mut request = HttpRequest::new(HttpMethod::Post, endpoint.clone())
				.header("Content-Type", STS_CONTENT_TYPE)
				.body(STS_REQUEST_BODY);

			if let Some(server_id) = server_id_header.filter(|value| !value.is_empty()) {
				request = request.header(SERVER_ID_HEADER, server_id);
			}

			sigv4::sign(
				&mut request,
				&SigningParams { credentials: &credentials, region, service: "sts", time: clock.now() },
			)?;

			Ok(IdentityProof::from_request(role, request))
		})
		.await;

	obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

	result
}

async fn resolve_credentials(
	source: &dyn CredentialSource,
) -> Result<AwsCredentials, SigningError> {
	const KIND: FlowKind = FlowKind::ResolveCredentials;

	let span = FlowSpan::new(KIND, source.name());

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

	let result = span
		.instrument(async move {
			source
				.resolve()
				.await?
				.ok_or(SigningError::NoCredentials { source_name: source.name() })
		})
		.await;

	obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

	result
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{aws::StaticSource, clock::ManualClock};

	fn decode(field: &str) -> Vec<u8> {
		STANDARD.decode(field).expect("Payload field should be valid base64.")
	}

	async fn proof(server_id: Option<&str>) -> IdentityProof {
		let source = StaticSource::from_keys("AKIDEXAMPLE", "secret");
		let clock = ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC));
		let endpoint = Url::parse(GLOBAL_STS_ENDPOINT).expect("Global endpoint should parse.");

		sign_identity_request(
			&source,
			&clock,
			&endpoint,
			DEFAULT_SIGNING_REGION,
			"ops",
			server_id,
			"test",
		)
		.await
		.expect("Static credentials should sign.")
	}

	#[tokio::test]
	async fn payload_fields_are_base64() {
		let proof = proof(None).await;
		let payload = proof.to_payload().expect("Proof should encode.");

		assert_eq!(proof.role, "ops");
		assert_eq!(payload.iam_http_request_method, "POST");
		assert_eq!(decode(&payload.iam_request_url), GLOBAL_STS_ENDPOINT.as_bytes());
		assert_eq!(decode(&payload.iam_request_body), STS_REQUEST_BODY.as_bytes());
		assert_eq!(payload.role, "ops");

		let headers: BTreeMap<String, Vec<String>> =
			serde_json::from_slice(&decode(&payload.iam_request_headers))
				.expect("Headers should be a JSON object of lists.");

		assert_eq!(headers.get("x-amz-date"), Some(&vec!["20250101T000000Z".to_owned()]));
		assert!(headers.contains_key("authorization"));
		assert!(!headers.contains_key(SERVER_ID_HEADER));
	}

	#[tokio::test]
	async fn server_id_is_signed_when_present() {
		let proof = proof(Some("vault.example.com")).await;
		let authorization =
			proof.header_value("authorization").expect("Signed proof should carry authorization.");

		assert_eq!(proof.header_value(SERVER_ID_HEADER), Some("vault.example.com"));
		assert!(authorization.contains(
			"SignedHeaders=content-type;host;x-amz-date;x-vault-aws-iam-server-id,"
		));
	}

	#[tokio::test]
	async fn empty_server_id_is_ignored() {
		let proof = proof(Some("")).await;

		assert_eq!(proof.header_value(SERVER_ID_HEADER), None);
	}

	#[tokio::test]
	async fn captured_proof_still_verifies() {
		let request = proof(Some("vault.example.com")).await.to_request();
		let credentials = AwsCredentials::from_keys("AKIDEXAMPLE", "secret", None);

		assert!(sigv4::verify(&request, &credentials).expect("Captured proof should be checkable"));
	}
}
