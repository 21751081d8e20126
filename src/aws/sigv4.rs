//! AWS Signature Version 4 over crate-owned requests, backed by `aws-sigv4`.
//!
//! [`sign`] stamps `host` onto a request when it is missing and then appends the headers the
//! signer produces: `x-amz-date`, `x-amz-security-token` for temporary credentials, and
//! `authorization`. Every header present at signing time is signed, which is what lets a verifier
//! rebuild the exact canonical request from the headers it receives. [`verify`] does that rebuild.

// std
use std::time::SystemTime;
// crates.io
use aws_sigv4::{
	http_request::{self, SignableBody, SignableRequest, SigningSettings},
	sign::v4,
};
use time::{PrimitiveDateTime, format_description::BorrowedFormatItem, macros::format_description};
// self
use crate::{_prelude::*, aws::AwsCredentials, error::SigningError, http::HttpRequest};

/// Algorithm label placed in the authorization header.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

const AMZ_DATE: &[BorrowedFormatItem<'_>] =
	format_description!("[year][month][day]T[hour][minute][second]Z");
// Regenerated by every signature.
const SIGNER_HEADERS: [&str; 3] = ["authorization", "x-amz-date", "x-amz-security-token"];

/// Inputs that scope a signature.
#[derive(Clone, Copy, Debug)]
pub struct SigningParams<'a> {
	/// Credentials used to derive the signing key.
	pub credentials: &'a AwsCredentials,
	/// Region component of the credential scope.
	pub region: &'a str,
	/// Service component of the credential scope.
	pub service: &'a str,
	/// Signing instant.
	pub time: OffsetDateTime,
}

/// Signs `request` in place.
pub fn sign(request: &mut HttpRequest, params: &SigningParams) -> Result<(), SigningError> {
	request.headers.retain(|(name, _)| !is_signer_header(name));

	if request.header_value("host").is_none() {
		let host = host_header(&request.url)?;

		request.headers.push(("host".into(), host));
	}

	for (name, value) in &request.headers {
		if value.chars().any(|c| c.is_control() && c != '\t') {
			return Err(SigningError::InvalidHeader { name: name.clone() });
		}
	}

	let identity = params.credentials.clone().into();
	let signing_params = v4::SigningParams::builder()
		.identity(&identity)
		.region(params.region)
		.name(params.service)
		.time(SystemTime::from(params.time))
		.settings(SigningSettings::default())
		.build()
		.map_err(SigningError::sign)?
		.into();
	let signable = SignableRequest::new(
		request.method.as_str(),
		request.url.as_str(),
		request.headers.iter().map(|(name, value)| (name.as_str(), value.as_str())),
		SignableBody::Bytes(&request.body),
	)
	.map_err(SigningError::sign)?;
	let (instructions, _) =
		http_request::sign(signable, &signing_params).map_err(SigningError::sign)?.into_parts();
	let signed = instructions
		.headers()
		.map(|(name, value)| (name.to_owned(), value.to_owned()))
		.collect::<Vec<_>>();

	request.headers.extend(signed);

	Ok(())
}

/// Recomputes the signature carried by `request` and compares it with its `authorization` header.
///
/// Only the headers named in `SignedHeaders` take part, and the signing instant comes from
/// `x-amz-date`. A request that is unsigned, malformed, or signed by another access key yields
/// `Ok(false)`.
pub fn verify(request: &HttpRequest, credentials: &AwsCredentials) -> Result<bool, SigningError> {
	let Some(authorization) = request.header_value("authorization") else {
		return Ok(false);
	};
	let Some(parts) = AuthorizationParts::parse(authorization) else {
		return Ok(false);
	};

	if parts.access_key_id != credentials.access_key_id() {
		return Ok(false);
	}

	let Some(time) = request
		.header_value("x-amz-date")
		.and_then(|raw| PrimitiveDateTime::parse(raw, AMZ_DATE).ok())
		.map(PrimitiveDateTime::assume_utc)
	else {
		return Ok(false);
	};
	let signed = parts.signed_headers.split(';').collect::<Vec<_>>();
	let mut rebuilt =
		HttpRequest::new(request.method, request.url.clone()).body(request.body.clone());

	for (name, value) in &request.headers {
		let lower = name.to_ascii_lowercase();

		if signed.contains(&lower.as_str()) && !is_signer_header(&lower) {
			rebuilt = rebuilt.header(name.as_str(), value.as_str());
		}
	}

	sign(
		&mut rebuilt,
		&SigningParams { credentials, region: parts.region, service: parts.service, time },
	)?;

	Ok(rebuilt.header_value("authorization") == Some(authorization))
}

struct AuthorizationParts<'a> {
	access_key_id: &'a str,
	region: &'a str,
	service: &'a str,
	signed_headers: &'a str,
}
impl<'a> AuthorizationParts<'a> {
	fn parse(value: &'a str) -> Option<Self> {
		let rest = value.strip_prefix(ALGORITHM)?.trim_start();
		let mut credential = None;
		let mut signed_headers = None;

		for part in rest.split(',').map(str::trim) {
			match part.split_once('=') {
				Some(("Credential", v)) => credential = Some(v),
				Some(("SignedHeaders", v)) => signed_headers = Some(v),
				Some(("Signature", _)) => (),
				_ => return None,
			}
		}

		let mut scope = credential?.split('/');
		let access_key_id = scope.next()?;
		let _date = scope.next()?;
		let region = scope.next()?;
		let service = scope.next()?;

		Some(Self { access_key_id, region, service, signed_headers: signed_headers? })
	}
}

fn is_signer_header(name: &str) -> bool {
	SIGNER_HEADERS.iter().any(|header| name.eq_ignore_ascii_case(header))
}

fn host_header(url: &Url) -> Result<String, SigningError> {
	let host =
		url.host_str().ok_or_else(|| SigningError::InvalidEndpoint { url: url.to_string() })?;

	Ok(match url.port() {
		Some(port) => format!("{host}:{port}"),
		None => host.to_owned(),
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::http::HttpMethod;

	const SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

	fn vanilla_request() -> HttpRequest {
		HttpRequest::new(
			HttpMethod::Get,
			Url::parse("https://example.amazonaws.com/").expect("Fixture URL should parse."),
		)
	}

	fn sign_at(request: &mut HttpRequest, credentials: &AwsCredentials, service: &str) {
		sign(
			request,
			&SigningParams {
				credentials,
				region: "us-east-1",
				service,
				time: macros::datetime!(2015-08-30 12:36:00 UTC),
			},
		)
		.expect("Fixture request should sign.");
	}

	#[test]
	fn get_vanilla_matches_test_suite() {
		let credentials = AwsCredentials::from_keys("AKIDEXAMPLE", SECRET, None);
		let mut request = vanilla_request();

		sign_at(&mut request, &credentials, "service");

		assert_eq!(request.header_value("host"), Some("example.amazonaws.com"));
		assert_eq!(request.header_value("x-amz-date"), Some("20150830T123600Z"));
		assert_eq!(
			request.header_value("authorization"),
			Some(
				"AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
				 SignedHeaders=host;x-amz-date, \
				 Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
			),
		);
	}

	#[test]
	fn session_token_is_signed() {
		let credentials = AwsCredentials::from_keys("AKIDEXAMPLE", SECRET, Some("session".into()));
		let mut request = vanilla_request();

		sign_at(&mut request, &credentials, "sts");

		assert_eq!(request.header_value("x-amz-security-token"), Some("session"));
		assert!(
			request
				.header_value("authorization")
				.expect("Authorization header should be present.")
				.contains("SignedHeaders=host;x-amz-date;x-amz-security-token,"),
		);
	}

	#[test]
	fn resigning_replaces_previous_signature() {
		let credentials = AwsCredentials::from_keys("AKIDEXAMPLE", SECRET, None);
		let mut request = vanilla_request();

		sign_at(&mut request, &credentials, "service");
		sign_at(&mut request, &credentials, "service");

		assert_eq!(request.headers.iter().filter(|(name, _)| name == "authorization").count(), 1);
		assert_eq!(request.headers.iter().filter(|(name, _)| name == "x-amz-date").count(), 1);
	}

	#[test]
	fn control_characters_are_rejected() {
		let credentials = AwsCredentials::from_keys("AKIDEXAMPLE", SECRET, None);
		let mut request = vanilla_request().header("X-Vault-AWS-IAM-Server-ID", "vault\r\nevil");
		let err = sign(
			&mut request,
			&SigningParams {
				credentials: &credentials,
				region: "us-east-1",
				service: "sts",
				time: macros::datetime!(2015-08-30 12:36:00 UTC),
			},
		)
		.expect_err("Header injection should be refused.");

		assert!(matches!(err, SigningError::InvalidHeader { .. }));
	}

	#[test]
	fn verify_detects_tampering() {
		let credentials = AwsCredentials::from_keys("AKIDEXAMPLE", SECRET, None);
		let mut request = HttpRequest::new(
			HttpMethod::Post,
			Url::parse("https://sts.amazonaws.com/").expect("Fixture URL should parse."),
		)
		.header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
		.body("Action=GetCallerIdentity&Version=2011-06-15");

		sign_at(&mut request, &credentials, "sts");

		assert!(verify(&request, &credentials).expect("Signed request should verify."));

		let mut tampered = request.clone();

		tampered.body = b"Action=GetCallerIdentity&Version=2099-01-01".to_vec();

		assert!(!verify(&tampered, &credentials).expect("Tampered request should be checked."));

		let other = AwsCredentials::from_keys("AKIDEXAMPLE", "another-secret", None);

		assert!(!verify(&request, &other).expect("Foreign key should be checked."));
		assert!(!verify(&vanilla_request(), &credentials).expect("Unsigned request is not valid."));
	}
}
