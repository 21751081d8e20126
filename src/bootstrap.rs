//! One-call wiring: config → signer → login → lease provider.

// self
use crate::{
	_prelude::*,
	auth::{BrokerAuthenticator, BrokerSession},
	aws::AmbientSource,
	client::ClientFactory,
	config::{BrokerConfig, SignerKind},
	http::HttpTransport,
	lease::VaultLeaseProvider,
	signer::{DirectSigner, IamAuthHelper, IdentitySigner},
	vault::VaultClient,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Result of a successful [`connect`].
pub struct Connected<C>
where
	C: ?Sized + HttpTransport,
{
	/// Session established at login.
	pub session: BrokerSession,
	/// Authenticated broker client.
	pub vault: Arc<VaultClient<C>>,
	/// Lease provider to hand to downstream clients.
	pub provider: Arc<VaultLeaseProvider<C>>,
}
impl<C> Connected<C>
where
	C: ?Sized + HttpTransport,
{
	/// Builds a client factory fed by the lease provider over the broker's transport.
	pub fn client_factory(&self, region: impl Into<String>) -> ClientFactory<C> {
		ClientFactory::<C>::new(self.provider.clone(), self.vault.transport().clone(), region)
	}
}
impl<C> Debug for Connected<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Connected")
			.field("session", &self.session)
			.field("provider", &self.provider)
			.finish()
	}
}

/// Builds the Identity Signer selected by `config.signer`, resolving credentials through the AWS
/// SDK default chain.
pub fn build_signer(config: &BrokerConfig) -> Arc<dyn IdentitySigner> {
	let region = config.region.as_deref().unwrap_or_default();
	let source = AmbientSource::new().with_region(region);

	match config.signer {
		SignerKind::Direct => Arc::new(DirectSigner::new(source)),
		SignerKind::IamHelper => Arc::new(IamAuthHelper::new(source).with_region(region)),
	}
}

/// Validates `config`, logs in with the configured signer, and returns a ready provider.
pub async fn connect<C>(config: &BrokerConfig, transport: impl Into<Arc<C>>) -> Result<Connected<C>>
where
	C: ?Sized + HttpTransport,
{
	connect_with_signer::<C>(config, transport, build_signer(config)).await
}

/// Same as [`connect`] with an explicit signer.
pub async fn connect_with_signer<C>(
	config: &BrokerConfig,
	transport: impl Into<Arc<C>>,
	signer: Arc<dyn IdentitySigner>,
) -> Result<Connected<C>>
where
	C: ?Sized + HttpTransport,
{
	config.validate()?;

	let mut vault = VaultClient::<C>::new(config.address_url()?, transport);

	if let Some(namespace) = &config.namespace {
		vault = vault.with_namespace(namespace.as_str());
	}

	let vault = Arc::new(vault);
	let session = BrokerAuthenticator::new(vault.clone(), signer)
		.login(&config.auth_mount, &config.auth_role, config.server_id_header.as_deref())
		.await?;
	let provider =
		VaultLeaseProvider::new(vault.clone(), &config.engine_path, &config.credential_role)
			.with_lease_request(config.lease_request())
			.with_renewal_window(config.renewal_window());

	Ok(Connected { session, vault, provider: Arc::new(provider) })
}

/// [`connect`] over a reqwest transport honoring `request_timeout_secs`.
#[cfg(feature = "reqwest")]
pub async fn connect_reqwest(config: &BrokerConfig) -> Result<Connected<ReqwestTransport>> {
	let transport = ReqwestTransport::with_timeout(config.request_timeout())?;

	connect::<ReqwestTransport>(config, transport).await
}
