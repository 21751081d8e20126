//! Minimal broker client: logical reads and writes against `/v1/{path}`.
//!
//! The client carries the session token installed by a successful login and an optional
//! namespace. Bodies are decoded through `serde_path_to_error` so a malformed answer names the
//! offending field instead of panicking.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	error::{BrokerError, TransportError},
	http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport},
	secret::Secret,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Broker client specialized for the default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestVaultClient = VaultClient<ReqwestTransport>;

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// HTTP client for the secrets broker.
pub struct VaultClient<C>
where
	C: ?Sized + HttpTransport,
{
	address: Url,
	namespace: Option<String>,
	token: RwLock<Option<Secret>>,
	transport: Arc<C>,
}
impl<C> VaultClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a client for the broker at `address`.
	pub fn new(mut address: Url, transport: impl Into<Arc<C>>) -> Self {
		if !address.path().ends_with('/') {
			let path = format!("{}/", address.path());

			address.set_path(&path);
		}

		Self { address, namespace: None, token: RwLock::new(None), transport: transport.into() }
	}

	/// Sends every request inside `namespace`.
	pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
		self.namespace = Some(namespace.into()).filter(|namespace: &String| !namespace.is_empty());

		self
	}

	/// Broker base address.
	pub fn address(&self) -> &Url {
		&self.address
	}

	/// Namespace attached to every request, if any.
	pub fn namespace(&self) -> Option<&str> {
		self.namespace.as_deref()
	}

	/// Shared transport handle.
	pub fn transport(&self) -> &Arc<C> {
		&self.transport
	}

	/// Installs the session token used to authorize subsequent calls.
	pub fn set_token(&self, token: Secret) {
		*self.token.write() = Some(token);
	}

	/// Returns a copy of the current session token.
	pub fn token(&self) -> Option<Secret> {
		self.token.read().clone()
	}

	/// Reads a logical path. A 404 without error detail yields `Ok(None)`.
	pub async fn read(&self, path: &str) -> Result<Option<SecretResponse>, BrokerError> {
		let request = self.request(HttpMethod::Get, path)?;

		self.send(request).await
	}

	/// Writes `body` to a logical path.
	pub async fn write(
		&self,
		path: &str,
		body: &Value,
	) -> Result<Option<SecretResponse>, BrokerError> {
		let request = self
			.request(HttpMethod::Post, path)?
			.header("Content-Type", "application/json")
			.body(body.to_string());

		self.send(request).await
	}

	fn request(&self, method: HttpMethod, path: &str) -> Result<HttpRequest, BrokerError> {
		let relative = format!("v1/{}", path.trim_start_matches('/'));
		let url = self
			.address
			.join(&relative)
			.map_err(|e| TransportError::network(relative.clone(), e))?;
		let mut request = HttpRequest::new(method, url).header("X-Vault-Request", "true");

		if let Some(token) = self.token.read().as_ref() {
			request = request.header(TOKEN_HEADER, token.expose());
		}
		if let Some(namespace) = &self.namespace {
			request = request.header(NAMESPACE_HEADER, namespace.as_str());
		}

		Ok(request)
	}

	async fn send(&self, request: HttpRequest) -> Result<Option<SecretResponse>, BrokerError> {
		let response = self.transport.execute(request).await?;

		decode_response(response)
	}
}
impl<C> Debug for VaultClient<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VaultClient")
			.field("address", &self.address.as_str())
			.field("namespace", &self.namespace)
			.field("token_set", &self.token.read().is_some())
			.finish()
	}
}

/// Envelope returned by logical reads, writes, and logins.
#[derive(Clone, Default, Deserialize)]
pub struct SecretResponse {
	/// Broker request identifier.
	#[serde(default)]
	pub request_id: String,
	/// Lease identifier for dynamic secrets.
	#[serde(default)]
	pub lease_id: String,
	/// Lease duration in whole seconds.
	#[serde(default)]
	pub lease_duration: u64,
	/// Whether the lease can be renewed.
	#[serde(default)]
	pub renewable: bool,
	/// Secret payload.
	#[serde(default)]
	pub data: Option<Map<String, Value>>,
	/// Authentication block returned by login endpoints.
	#[serde(default)]
	pub auth: Option<SecretAuth>,
	/// Non-fatal warnings.
	#[serde(default)]
	pub warnings: Option<Vec<String>>,
}
impl Debug for SecretResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SecretResponse")
			.field("request_id", &self.request_id)
			.field("lease_id", &self.lease_id)
			.field("lease_duration", &self.lease_duration)
			.field("renewable", &self.renewable)
			.field("data_keys", &self.data.as_ref().map(|data| data.keys().collect::<Vec<_>>()))
			.field("auth", &self.auth)
			.field("warnings", &self.warnings)
			.finish()
	}
}

/// Authentication block of a login response.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SecretAuth {
	/// Session token.
	#[serde(default)]
	pub client_token: Option<Secret>,
	/// Token accessor.
	#[serde(default)]
	pub accessor: String,
	/// Policies attached to the token.
	#[serde(default)]
	pub policies: Option<Vec<String>>,
	/// Token metadata.
	#[serde(default)]
	pub metadata: Option<BTreeMap<String, Value>>,
	/// Token TTL in seconds.
	#[serde(default)]
	pub lease_duration: u64,
	/// Whether the token can be renewed.
	#[serde(default)]
	pub renewable: bool,
}

#[derive(Default, Deserialize)]
struct ErrorBody {
	#[serde(default)]
	errors: Vec<String>,
}

fn decode_response(response: HttpResponse) -> Result<Option<SecretResponse>, BrokerError> {
	let status = response.status();

	if !response.is_success() {
		let errors =
			serde_json::from_slice::<ErrorBody>(&response.body).unwrap_or_default().errors;

		if status == 404 && errors.is_empty() {
			return Ok(None);
		}

		return Err(BrokerError::Api { status, errors, retry_after: response.metadata.retry_after });
	}
	if response.body.iter().all(u8::is_ascii_whitespace) {
		return Ok(None);
	}

	let de = &mut serde_json::Deserializer::from_slice(&response.body);

	serde_path_to_error::deserialize(de)
		.map(Some)
		.map_err(|source| BrokerError::Parse { source, status })
}
