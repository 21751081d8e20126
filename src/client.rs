//! Downstream Client Factory: SigV4-signed AWS API calls fed by a [`CredentialsProvider`].
//!
//! A [`SignedClient`] never stores credentials. Each [`send`](SignedClient::send) pulls them from
//! the provider, and [`send_batch`](SignedClient::send_batch) pulls them once for the whole batch.

// self
use crate::{
	_prelude::*,
	aws::sigv4::{self, SigningParams},
	clock::{Clock, SystemClock},
	credentials::CredentialsProvider,
	http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Builds per-service clients sharing one provider and transport.
pub struct ClientFactory<C>
where
	C: ?Sized + HttpTransport,
{
	provider: Arc<dyn CredentialsProvider>,
	transport: Arc<C>,
	region: String,
	clock: Arc<dyn Clock>,
}
impl<C> ClientFactory<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a factory signing for `region`.
	pub fn new(
		provider: Arc<dyn CredentialsProvider>,
		transport: impl Into<Arc<C>>,
		region: impl Into<String>,
	) -> Self {
		Self {
			provider,
			transport: transport.into(),
			region: region.into(),
			clock: Arc::new(SystemClock),
		}
	}

	/// Overrides the clock used for signing timestamps.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Region placed in every credential scope.
	pub fn region(&self) -> &str {
		&self.region
	}

	/// Builds a client for `service` (for example `sns`) rooted at `endpoint`.
	pub fn client(&self, service: impl Into<String>, endpoint: Url) -> SignedClient<C> {
		SignedClient {
			provider: self.provider.clone(),
			transport: self.transport.clone(),
			clock: self.clock.clone(),
			region: self.region.clone(),
			service: service.into(),
			endpoint,
		}
	}
}
impl<C> Debug for ClientFactory<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientFactory").field("region", &self.region).finish()
	}
}

/// Client for one AWS service endpoint.
pub struct SignedClient<C>
where
	C: ?Sized + HttpTransport,
{
	provider: Arc<dyn CredentialsProvider>,
	transport: Arc<C>,
	clock: Arc<dyn Clock>,
	region: String,
	service: String,
	endpoint: Url,
}
impl<C> SignedClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Service endpoint.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Service name used in the credential scope.
	pub fn service(&self) -> &str {
		&self.service
	}

	/// Starts a request relative to the endpoint.
	pub fn request(&self, method: HttpMethod, path: &str) -> Result<HttpRequest> {
		let url = self.endpoint.join(path).map_err(crate::error::ConfigError::from)?;

		Ok(HttpRequest::new(method, url))
	}

	/// Starts a form-encoded `POST` to the endpoint root, the shape query-protocol services
	/// (SNS, SQS, STS) expect.
	pub fn form_request(&self, params: &[(&str, &str)]) -> HttpRequest {
		let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish();

		HttpRequest::new(HttpMethod::Post, self.endpoint.clone())
			.header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
			.body(body)
	}

	/// Signs and sends one request with freshly retrieved credentials.
	///
	/// Non-2xx answers are returned as responses; only missing credentials, signing failures, and
	/// transport failures are errors.
	pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
		let mut responses = self.send_batch(vec![request]).await?;

		Ok(responses.remove(0))
	}

	/// Signs and sends requests in order, retrieving credentials once for the batch.
	///
	/// Stops at the first transport failure.
	pub async fn send_batch(&self, requests: Vec<HttpRequest>) -> Result<Vec<HttpResponse>> {
		const KIND: FlowKind = FlowKind::SignedCall;

		let span = FlowSpan::new(KIND, "send");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let credentials = self.provider.retrieve().await?.to_aws();
				let mut responses = Vec::with_capacity(requests.len());

				for mut request in requests {
					sigv4::sign(
						&mut request,
						&SigningParams {
							credentials: &credentials,
							region: &self.region,
							service: &self.service,
							time: self.clock.now(),
						},
					)?;
					responses.push(self.transport.execute(request).await?);
				}

				Ok(responses)
			})
			.await;

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}
}
impl<C> Debug for SignedClient<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignedClient")
			.field("service", &self.service)
			.field("region", &self.region)
			.field("endpoint", &self.endpoint.as_str())
			.finish()
	}
}
