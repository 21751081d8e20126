//! Broker Authenticator: trade a signed identity proof for a broker session bound to a role.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	error::AuthError,
	http::HttpTransport,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	secret::Secret,
	signer::IdentitySigner,
	vault::VaultClient,
};

/// Session issued by the broker after a successful login.
///
/// Sessions are not renewed in the background; a new process (or an explicit second login)
/// derives a new one.
#[derive(Clone, Debug)]
pub struct BrokerSession {
	/// Opaque session token.
	pub token: Secret,
	/// Token accessor, usable for lookups without exposing the token.
	pub accessor: String,
	/// Policies granted to the session.
	pub policies: Vec<String>,
	/// Broker-supplied metadata (account, role ARN, and similar).
	pub metadata: BTreeMap<String, Value>,
	/// Session TTL as reported by the broker.
	pub lease_duration: Duration,
	/// Whether the broker allows renewing the session.
	pub renewable: bool,
}

/// Logs in with proofs produced by an [`IdentitySigner`].
pub struct BrokerAuthenticator<C>
where
	C: ?Sized + HttpTransport,
{
	vault: Arc<VaultClient<C>>,
	signer: Arc<dyn IdentitySigner>,
}
impl<C> BrokerAuthenticator<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates an authenticator that installs sessions on `vault`.
	pub fn new(vault: Arc<VaultClient<C>>, signer: Arc<dyn IdentitySigner>) -> Self {
		Self { vault, signer }
	}

	/// Broker client the session is installed on.
	pub fn vault(&self) -> &Arc<VaultClient<C>> {
		&self.vault
	}

	/// Signs a proof, posts it to `auth/{auth_mount}/login` for `role`, and installs the returned
	/// token as the broker client's active credential.
	///
	/// Nothing is retried here. [`Error::is_retryable`] tells the caller whether a fresh login
	/// attempt is worthwhile.
	pub async fn login(
		&self,
		auth_mount: &str,
		role: &str,
		server_id_header: Option<&str>,
	) -> Result<BrokerSession> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.login_inner(auth_mount, role, server_id_header)).await;

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	async fn login_inner(
		&self,
		auth_mount: &str,
		role: &str,
		server_id_header: Option<&str>,
	) -> Result<BrokerSession> {
		let proof = self.signer.build_proof(role, server_id_header).await?;
		let payload = proof.to_payload().map_err(AuthError::PayloadEncoding)?;
		let body = serde_json::to_value(&payload).map_err(AuthError::PayloadEncoding)?;
		let path = format!("auth/{}/login", auth_mount.trim_matches('/'));
		let response = self
			.vault
			.write(&path, &body)
			.await
			.map_err(AuthError::Broker)?
			.ok_or(AuthError::EmptyResponse)?;
		let auth = response.auth.ok_or(AuthError::MissingToken)?;
		let token =
			auth.client_token.filter(|token| !token.is_empty()).ok_or(AuthError::MissingToken)?;

		self.vault.set_token(token.clone());

		#[cfg(feature = "tracing")]
		tracing::info!(
			mount = auth_mount,
			role,
			accessor = auth.accessor.as_str(),
			ttl_secs = auth.lease_duration,
			"broker session established"
		);

		Ok(BrokerSession {
			token,
			accessor: auth.accessor,
			policies: auth.policies.unwrap_or_default(),
			metadata: auth.metadata.unwrap_or_default(),
			lease_duration: Duration::seconds(
				i64::try_from(auth.lease_duration).unwrap_or(i64::MAX),
			),
			renewable: auth.renewable,
		})
	}
}
impl<C> Debug for BrokerAuthenticator<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BrokerAuthenticator").field("vault", &self.vault).finish()
	}
}
