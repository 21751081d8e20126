//! Crate-level error taxonomy shared by the signer, authenticator, and lease provider.
//!
//! Each stage owns one error family so callers can tell which step failed:
//! [`SigningError`] (no proof of identity could be produced), [`AuthError`] (the broker refused or
//! could not be reached during login), and [`LeaseError`] (the broker refused or could not be
//! reached during a credential fetch). [`Error::is_retryable`] tells callers whether a retry with
//! backoff is worth attempting; nothing inside the crate retries on its own.

// crates.io
use aws_credential_types::provider::error::CredentialsError;
// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Proof of identity could not be produced.
	#[error(transparent)]
	Signing(#[from] SigningError),
	/// Broker login failed.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Credential lease fetch failed.
	#[error(transparent)]
	Lease(#[from] LeaseError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Downstream request could not be delivered.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl Error {
	/// Returns `true` when retrying the failed operation with backoff may succeed.
	///
	/// Authorization failures (the broker rejecting a role/identity pairing), schema violations,
	/// and signing failures are never retryable.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Auth(AuthError::Broker(err)) | Self::Lease(LeaseError::Broker(err)) =>
				err.is_transient(),
			Self::Transport(_) => true,
			_ => false,
		}
	}
}

/// Failures raised while building a proof of identity.
#[derive(Debug, ThisError)]
pub enum SigningError {
	/// The credential source is not configured on this host.
	#[error("No AWS credentials are available from `{source_name}`.")]
	NoCredentials {
		/// Label of the source that was tried.
		source_name: &'static str,
	},
	/// A credential provider is configured but failed to produce credentials.
	#[error("Credential source `{source_name}` failed.")]
	CredentialSource {
		/// Label of the failing source.
		source_name: &'static str,
		/// Provider failure reported by the AWS SDK.
		#[source]
		source: CredentialsError,
	},
	/// Header value cannot be carried by an HTTP request.
	#[error("Header `{name}` contains characters that cannot be signed.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},
	/// Identity endpoint URL is unusable for signing.
	#[error("Identity endpoint `{url}` has no host.")]
	InvalidEndpoint {
		/// Endpoint that failed validation.
		url: String,
	},
	/// The SigV4 signer refused the request or its parameters.
	#[error("Request could not be signed.")]
	Sign {
		/// Signer failure.
		#[source]
		source: BoxError,
	},
}
impl SigningError {
	/// Wraps a SigV4 signer failure.
	pub fn sign(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Sign { source: Box::new(src) }
	}
}

/// Failures raised while exchanging a proof of identity for a broker session.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Broker was unreachable or rejected the login.
	#[error("Broker login failed.")]
	Broker(#[source] BrokerError),
	/// Broker answered without a usable body.
	#[error("Broker login returned an empty response.")]
	EmptyResponse,
	/// Broker answered but carried no session token.
	#[error("Broker login response did not contain a session token.")]
	MissingToken,
	/// Proof payload could not be serialized.
	#[error("Identity proof could not be encoded for the broker.")]
	PayloadEncoding(#[source] serde_json::Error),
}

/// Failures raised while fetching a credential lease.
#[derive(Debug, ThisError)]
pub enum LeaseError {
	/// Broker was unreachable or rejected the read.
	#[error("Broker credential fetch failed.")]
	Broker(#[source] BrokerError),
	/// Broker holds nothing at the requested path.
	#[error("Broker returned no secret at `{path}`.")]
	NotFound {
		/// Logical path that was requested.
		path: String,
	},
	/// Secret is missing a field or a field has the wrong shape.
	#[error("Broker secret does not match the expected credential schema.")]
	MalformedSecret {
		/// Structured failure naming the offending field.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Reported lease duration cannot be represented.
	#[error("Lease duration {value} exceeds the supported range.")]
	LeaseDurationOutOfRange {
		/// Raw value reported by the broker.
		value: u64,
	},
}

/// Errors produced by the broker HTTP client.
#[derive(Debug, ThisError)]
pub enum BrokerError {
	/// Network-level failure.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Broker answered with a non-success status.
	#[error("Broker returned HTTP {status}: {}.", display_errors(.errors))]
	Api {
		/// HTTP status code.
		status: u16,
		/// Broker-supplied `errors` entries.
		errors: Vec<String>,
		/// Retry-After hint, when supplied.
		retry_after: Option<Duration>,
	},
	/// Broker answered with malformed JSON.
	#[error("Broker returned malformed JSON.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code.
		status: u16,
	},
}
impl BrokerError {
	/// Returns the HTTP status associated with the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Transport(_) => None,
			Self::Api { status, .. } | Self::Parse { status, .. } => Some(*status),
		}
	}

	/// Returns `true` for failures worth retrying: network errors, throttling, and 5xx.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Transport(_) => true,
			Self::Api { status, .. } => *status == 429 || *status >= 500,
			Self::Parse { .. } => false,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling `{url}`.")]
	Network {
		/// Request URL.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { url: url.into(), source: Box::new(src) }
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Configuration sources could not be merged or extracted.
	#[error("Configuration could not be loaded.")]
	Load(#[source] Box<figment::Error>),
	/// A required value is empty.
	#[error("Configuration value `{field}` must not be empty.")]
	Empty {
		/// Offending field.
		field: &'static str,
	},
	/// A numeric value exceeds its supported range.
	#[error("Configuration value `{field}` is {value}, above the maximum of {max}.")]
	OutOfRange {
		/// Offending field.
		field: &'static str,
		/// Configured value.
		value: u64,
		/// Largest accepted value.
		max: u64,
	},
	/// Broker address is not an HTTP(S) URL.
	#[error("Broker address `{address}` must use http or https.")]
	InvalidAddress {
		/// Address that failed validation.
		address: String,
	},
	/// URL could not be joined or parsed.
	#[error("URL is invalid.")]
	InvalidUrl(#[from] url::ParseError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<figment::Error> for ConfigError {
	fn from(e: figment::Error) -> Self {
		Self::Load(Box::new(e))
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

fn display_errors(errors: &[String]) -> String {
	if errors.is_empty() { "no error detail".into() } else { errors.join("; ") }
}
