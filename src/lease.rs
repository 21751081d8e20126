//! Lease-Aware Credential Provider.
//!
//! [`VaultLeaseProvider`] caches at most one [`LeasedCredential`] and serves it while
//! `now < fetched_at + lease_duration - renewal_window`. Once the renewal window is entered the
//! next [`retrieve`](VaultLeaseProvider::retrieve) fetches a replacement from
//! `{engine_path}/creds/{role}`. Refresh is lazy and pull-based; nothing runs in the background.
//!
//! All reads and writes of the cached lease happen inside one async critical section per
//! provider, so concurrent callers that find the lease stale wait for a single broker fetch and
//! then observe its result. A failed fetch leaves the previous lease in place and propagates the
//! error; a lease past its renewal window is never handed out.

mod metrics;

pub use metrics::*;

// crates.io
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	credentials::{Credentials, CredentialsFuture, CredentialsProvider},
	error::LeaseError,
	http::HttpTransport,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	secret::Secret,
	vault::{SecretResponse, VaultClient},
};

/// How the provider asks the secrets engine for credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LeaseRequest {
	/// Plain read (`GET`).
	#[default]
	Read,
	/// Parameterized write (`POST`) carrying an optional `ttl` duration string.
	Write {
		/// Requested TTL such as `30m`.
		ttl: Option<String>,
	},
}
impl LeaseRequest {
	/// Write-style request with a TTL.
	pub fn write(ttl: impl Into<String>) -> Self {
		Self::Write { ttl: Some(ttl.into()) }
	}

	fn body(&self) -> Option<Value> {
		match self {
			Self::Read => None,
			Self::Write { ttl: Some(ttl) } => Some(json!({ "ttl": ttl })),
			Self::Write { ttl: None } => Some(json!({})),
		}
	}
}

/// AWS credentials leased from the broker.
///
/// Replaced wholesale on refresh, never patched in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeasedCredential {
	/// Access key identifier.
	pub access_key_id: String,
	/// Secret access key.
	pub secret_key: Secret,
	/// Session token (absent for IAM-user credentials).
	pub session_token: Option<Secret>,
	/// Lease duration reported by the broker, in whole seconds.
	pub lease_duration_secs: u32,
	/// Instant the fetch was issued.
	pub fetched_at: OffsetDateTime,
	/// Broker lease identifier.
	pub lease_id: String,
	/// Whether the broker marked the lease renewable.
	pub renewable: bool,
}
impl LeasedCredential {
	/// Builds a lease from a broker response received for a fetch issued at `fetched_at`.
	pub fn from_response(
		response: SecretResponse,
		fetched_at: OffsetDateTime,
	) -> Result<Self, LeaseError> {
		let data = response.data.map(Value::Object).unwrap_or(Value::Null);
		let secret: LeaseData = serde_path_to_error::deserialize(data)
			.map_err(|source| LeaseError::MalformedSecret { source })?;
		let lease_duration_secs = u32::try_from(response.lease_duration)
			.map_err(|_| LeaseError::LeaseDurationOutOfRange { value: response.lease_duration })?;

		Ok(Self {
			access_key_id: secret.access_key,
			secret_key: Secret::new(secret.secret_key),
			session_token: secret.security_token.filter(|token| !token.is_empty()).map(Secret::new),
			lease_duration_secs,
			fetched_at,
			lease_id: response.lease_id,
			renewable: response.renewable,
		})
	}

	/// `fetched_at + lease_duration`.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.fetched_at.saturating_add(Duration::seconds(i64::from(self.lease_duration_secs)))
	}

	/// Instant from which the lease must be replaced before use.
	///
	/// Saturates at the earliest representable instant, so a window too large to subtract makes
	/// the lease due immediately.
	pub fn refresh_at(&self, renewal_window: Duration) -> OffsetDateTime {
		self.expires_at().saturating_sub(renewal_window)
	}

	/// Returns `true` while the lease may be served as-is.
	pub fn is_valid_at(&self, now: OffsetDateTime, renewal_window: Duration) -> bool {
		now < self.refresh_at(renewal_window)
	}

	/// Converts into the downstream credential shape.
	pub fn to_credentials(&self) -> Credentials {
		Credentials {
			access_key_id: self.access_key_id.clone(),
			secret_access_key: self.secret_key.clone(),
			session_token: self.session_token.clone(),
			expires_at: Some(self.expires_at()),
			provider_name: "vault_lease",
		}
	}
}

/// Credential provider backed by broker leases.
pub struct VaultLeaseProvider<C>
where
	C: ?Sized + HttpTransport,
{
	vault: Arc<VaultClient<C>>,
	path: String,
	request: LeaseRequest,
	renewal_window: Duration,
	clock: Arc<dyn Clock>,
	state: AsyncMutex<Option<LeasedCredential>>,
	refresh_at: Mutex<Option<OffsetDateTime>>,
	metrics: Arc<LeaseMetrics>,
}
impl<C> VaultLeaseProvider<C>
where
	C: ?Sized + HttpTransport,
{
	/// Renewal window used unless overridden.
	pub const DEFAULT_RENEWAL_WINDOW: Duration = Duration::seconds(10);

	/// Creates a provider leasing `{engine_path}/creds/{role}` through an authenticated client.
	pub fn new(vault: Arc<VaultClient<C>>, engine_path: &str, role: &str) -> Self {
		Self {
			vault,
			path: format!("{}/creds/{}", engine_path.trim_matches('/'), role.trim_matches('/')),
			request: LeaseRequest::Read,
			renewal_window: Self::DEFAULT_RENEWAL_WINDOW,
			clock: Arc::new(SystemClock),
			state: AsyncMutex::new(None),
			refresh_at: Mutex::new(None),
			metrics: Default::default(),
		}
	}

	/// Selects read- or write-style fetches.
	pub fn with_lease_request(mut self, request: LeaseRequest) -> Self {
		self.request = request;

		self
	}

	/// Overrides the renewal window. Negative values clamp to zero.
	pub fn with_renewal_window(mut self, window: Duration) -> Self {
		self.renewal_window = if window.is_negative() { Duration::ZERO } else { window };

		self
	}

	/// Overrides the clock used for lease arithmetic.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Broker path the provider leases from.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Active renewal window.
	pub fn renewal_window(&self) -> Duration {
		self.renewal_window
	}

	/// Counters describing cache behavior.
	pub fn metrics(&self) -> &Arc<LeaseMetrics> {
		&self.metrics
	}

	/// Returns a lease valid right now, fetching one when none is cached or the cached one has
	/// entered the renewal window.
	pub async fn retrieve(&self) -> Result<LeasedCredential> {
		self.retrieve_lease().await
	}

	/// Returns `true` when no lease is cached or the cached lease has entered the renewal window.
	///
	/// Pure function of the clock and the recorded expiry; never touches the broker.
	pub fn is_expired(&self) -> bool {
		self.expired_at(self.clock.now())
	}

	async fn retrieve_lease(&self) -> Result<LeasedCredential> {
		self.metrics.record_retrieval();

		let mut state = self.state.lock().await;
		let now = self.clock.now();

		if let Some(current) =
			state.as_ref().filter(|lease| lease.is_valid_at(now, self.renewal_window))
		{
			self.metrics.record_cache_hit();

			return Ok(current.clone());
		}

		let fresh = self.fetch(now).await?;

		*self.refresh_at.lock() = Some(fresh.refresh_at(self.renewal_window));
		*state = Some(fresh.clone());

		Ok(fresh)
	}

	fn expired_at(&self, now: OffsetDateTime) -> bool {
		match *self.refresh_at.lock() {
			Some(refresh_at) => now >= refresh_at,
			None => true,
		}
	}

	async fn fetch(&self, now: OffsetDateTime) -> Result<LeasedCredential> {
		const KIND: FlowKind = FlowKind::LeaseFetch;

		let span = FlowSpan::new(KIND, "retrieve");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_fetch();

		let result = span.instrument(self.fetch_inner(now)).await;

		if result.is_err() {
			self.metrics.record_failure();
		}

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	async fn fetch_inner(&self, now: OffsetDateTime) -> Result<LeasedCredential> {
		let response = match self.request.body() {
			None => self.vault.read(&self.path).await,
			Some(body) => self.vault.write(&self.path, &body).await,
		}
		.map_err(LeaseError::Broker)?
		.ok_or_else(|| LeaseError::NotFound { path: self.path.clone() })?;
		let lease = LeasedCredential::from_response(response, now)?;

		#[cfg(feature = "tracing")]
		{
			if Duration::seconds(i64::from(lease.lease_duration_secs)) <= self.renewal_window {
				tracing::warn!(
					path = self.path.as_str(),
					lease_secs = lease.lease_duration_secs,
					window_secs = self.renewal_window.whole_seconds(),
					"lease shorter than renewal window; every retrieve will refetch"
				);
			}

			tracing::info!(
				path = self.path.as_str(),
				lease_id = lease.lease_id.as_str(),
				lease_secs = lease.lease_duration_secs,
				"lease refreshed"
			);
		}

		Ok(lease)
	}
}
impl<C> Debug for VaultLeaseProvider<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VaultLeaseProvider")
			.field("path", &self.path)
			.field("request", &self.request)
			.field("renewal_window", &self.renewal_window)
			.field("refresh_at", &*self.refresh_at.lock())
			.finish()
	}
}
impl<C> CredentialsProvider for VaultLeaseProvider<C>
where
	C: ?Sized + HttpTransport,
{
	fn retrieve(&self) -> CredentialsFuture<'_> {
		Box::pin(async move { Ok(self.retrieve_lease().await?.to_credentials()) })
	}

	fn is_expired(&self) -> bool {
		self.expired_at(self.clock.now())
	}
}

#[derive(Deserialize)]
struct LeaseData {
	access_key: String,
	secret_key: String,
	#[serde(default)]
	security_token: Option<String>,
}
