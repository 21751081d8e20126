//! Startup configuration for the login and lease pipeline.
//!
//! [`BrokerConfig::figment`] documents the resolution order, lowest to highest:
//! 1. programmatic defaults ([`BrokerConfig::default`]);
//! 2. an optional YAML file;
//! 3. the conventional `VAULT_ADDR` and `VAULT_NAMESPACE` variables;
//! 4. `VAULT_AWS_LEASE_*` variables (for example `VAULT_AWS_LEASE_AUTH_ROLE`).
//!
//! The resolved value is built once and threaded through constructors; nothing else in the crate
//! reads the environment for broker settings.

// std
use std::path::Path;
// crates.io
use figment::{
	Figment,
	providers::{Env, Format, Serialized, Yaml},
};
// self
use crate::{_prelude::*, error::ConfigError, lease::LeaseRequest};

/// How credentials are requested from the secrets engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseMode {
	/// Plain read.
	#[default]
	Read,
	/// Write carrying a `ttl`.
	Write,
}

/// Identity Signer strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerKind {
	/// Global STS endpoint with the ambient credential chain.
	#[default]
	Direct,
	/// Regional STS endpoint chosen by `region`.
	IamHelper,
}

/// Everything the core needs to log in and lease credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
	/// Broker base URL.
	pub address: String,
	/// Broker namespace.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
	/// Value bound into proofs through the server-ID header.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub server_id_header: Option<String>,
	/// Auth mount; login goes to `auth/{auth_mount}/login`.
	pub auth_mount: String,
	/// Trusted role requested at login.
	pub auth_role: String,
	/// Secrets engine mount.
	pub engine_path: String,
	/// Role leased from `{engine_path}/creds/{credential_role}`.
	pub credential_role: String,
	/// Read or write style fetches.
	pub lease_request: LeaseMode,
	/// TTL sent with write-style fetches.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ttl: Option<String>,
	/// Renewal window in seconds.
	pub renewal_window_secs: u64,
	/// Identity Signer strategy.
	pub signer: SignerKind,
	/// STS region for the IAM helper.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub region: Option<String>,
	/// Transport timeout in seconds.
	pub request_timeout_secs: u64,
}
impl BrokerConfig {
	/// Prefix of crate-specific environment variables.
	pub const ENV_PREFIX: &str = "VAULT_AWS_LEASE_";
	/// TTL requested by write-style fetches when none is configured.
	pub const DEFAULT_WRITE_TTL: &str = "30m";
	/// Largest accepted renewal window; no lease outlives `u32::MAX` seconds.
	pub const MAX_RENEWAL_WINDOW_SECS: u64 = u32::MAX as u64;

	/// Layered providers in resolution order.
	pub fn figment(path: Option<&Path>) -> Figment {
		let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

		if let Some(path) = path {
			figment = figment.merge(Yaml::file(path));
		}

		figment
			.merge(Env::raw().only(&["VAULT_ADDR", "VAULT_NAMESPACE"]).map(|key| {
				if key.as_str().eq_ignore_ascii_case("VAULT_ADDR") {
					"address".into()
				} else {
					"namespace".into()
				}
			}))
			.merge(Env::prefixed(Self::ENV_PREFIX))
	}

	/// Resolves and validates the configuration.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		Self::from_figment(&Self::figment(path))
	}

	/// Extracts and validates from a caller-assembled figment.
	pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
		let config: Self = figment.extract()?;

		config.validate()?;

		Ok(config)
	}

	/// Rejects values the pipeline cannot work with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.address_url()?;

		for (field, value) in [
			("auth_mount", &self.auth_mount),
			("auth_role", &self.auth_role),
			("engine_path", &self.engine_path),
			("credential_role", &self.credential_role),
		] {
			if value.trim().is_empty() {
				return Err(ConfigError::Empty { field });
			}
		}

		if self.renewal_window_secs > Self::MAX_RENEWAL_WINDOW_SECS {
			return Err(ConfigError::OutOfRange {
				field: "renewal_window_secs",
				value: self.renewal_window_secs,
				max: Self::MAX_RENEWAL_WINDOW_SECS,
			});
		}

		Ok(())
	}

	/// Parsed broker address.
	pub fn address_url(&self) -> Result<Url, ConfigError> {
		let url = Url::parse(&self.address)?;

		match url.scheme() {
			"http" | "https" => Ok(url),
			_ => Err(ConfigError::InvalidAddress { address: self.address.clone() }),
		}
	}

	/// Renewal window as a duration.
	pub fn renewal_window(&self) -> Duration {
		Duration::seconds(i64::try_from(self.renewal_window_secs).unwrap_or(i64::MAX))
	}

	/// Transport timeout.
	pub fn request_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.request_timeout_secs)
	}

	/// Fetch style handed to the lease provider.
	pub fn lease_request(&self) -> LeaseRequest {
		match self.lease_request {
			LeaseMode::Read => LeaseRequest::Read,
			LeaseMode::Write => LeaseRequest::write(
				self.ttl.clone().unwrap_or_else(|| Self::DEFAULT_WRITE_TTL.to_owned()),
			),
		}
	}
}
impl Default for BrokerConfig {
	fn default() -> Self {
		Self {
			address: "https://127.0.0.1:8200".into(),
			namespace: None,
			server_id_header: None,
			auth_mount: "aws".into(),
			auth_role: String::new(),
			engine_path: "aws".into(),
			credential_role: String::new(),
			lease_request: LeaseMode::Read,
			ttl: None,
			renewal_window_secs: 10,
			signer: SignerKind::Direct,
			region: None,
			request_timeout_secs: 30,
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use figment::Jail;
	// self
	use super::*;

	#[test]
	fn defaults_need_roles() {
		let config = BrokerConfig::default();

		assert!(matches!(config.validate(), Err(ConfigError::Empty { field: "auth_role" })));
		assert_eq!(config.renewal_window(), Duration::seconds(10));
		assert_eq!(config.lease_request(), LeaseRequest::Read);
	}

	#[test]
	fn yaml_then_vault_env_then_prefixed_env() {
		Jail::expect_with(|jail| {
			jail.create_file(
				"broker.yaml",
				r#"
address: "https://vault.from-file:8200"
auth_role: "file-role"
credential_role: "deploy"
lease_request: "write"
renewal_window_secs: 30
"#,
			)?;
			jail.set_env("VAULT_ADDR", "https://vault.from-env:8200");
			jail.set_env("VAULT_NAMESPACE", "team-a");
			jail.set_env("VAULT_AWS_LEASE_AUTH_ROLE", "env-role");
			jail.set_env("VAULT_AWS_LEASE_SIGNER", "iam_helper");
			jail.set_env("VAULT_AWS_LEASE_REGION", "eu-central-1");

			let config = BrokerConfig::load(Some(Path::new("broker.yaml")))
				.expect("Layered configuration should resolve.");

			assert_eq!(config.address, "https://vault.from-env:8200");
			assert_eq!(config.namespace.as_deref(), Some("team-a"));
			assert_eq!(config.auth_role, "env-role");
			assert_eq!(config.credential_role, "deploy");
			assert_eq!(config.renewal_window(), Duration::seconds(30));
			assert_eq!(config.signer, SignerKind::IamHelper);
			assert_eq!(config.region.as_deref(), Some("eu-central-1"));
			assert_eq!(config.lease_request(), LeaseRequest::write("30m"));

			jail.set_env("VAULT_AWS_LEASE_ADDRESS", "https://vault.prefixed:8200");

			let config =
				BrokerConfig::load(Some(Path::new("broker.yaml"))).expect("Override should resolve.");

			assert_eq!(config.address, "https://vault.prefixed:8200");

			Ok(())
		});
	}

	#[test]
	fn oversized_renewal_window_is_rejected() {
		let config = BrokerConfig {
			auth_role: "ops".into(),
			credential_role: "deploy".into(),
			renewal_window_secs: u64::MAX,
			..Default::default()
		};

		assert!(matches!(
			config.validate(),
			Err(ConfigError::OutOfRange { field: "renewal_window_secs", value: u64::MAX, .. })
		));

		let config = BrokerConfig {
			renewal_window_secs: BrokerConfig::MAX_RENEWAL_WINDOW_SECS,
			..config
		};

		assert!(config.validate().is_ok());
		assert_eq!(config.renewal_window(), Duration::seconds(i64::from(u32::MAX)));
	}

	#[test]
	fn non_http_address_is_rejected() {
		let config = BrokerConfig {
			address: "unix:///var/run/vault.sock".into(),
			auth_role: "ops".into(),
			credential_role: "deploy".into(),
			..Default::default()
		};

		assert!(matches!(config.validate(), Err(ConfigError::InvalidAddress { .. })));
	}

	#[test]
	fn missing_file_falls_back_to_defaults() {
		Jail::expect_with(|jail| {
			jail.set_env("VAULT_AWS_LEASE_AUTH_ROLE", "ops");
			jail.set_env("VAULT_AWS_LEASE_CREDENTIAL_ROLE", "deploy");

			let config = BrokerConfig::load(Some(Path::new("absent.yaml")))
				.expect("Absent file should be skipped.");

			assert_eq!(config.auth_mount, "aws");
			assert_eq!(config.engine_path, "aws");
			assert_eq!(config.request_timeout(), std::time::Duration::from_secs(30));

			Ok(())
		});
	}
}
