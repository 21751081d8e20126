//! AWS-side building blocks: credential sources backed by the AWS SDK provider chain and SigV4
//! signing over crate-owned requests.

pub mod sigv4;
pub mod source;

pub use aws_credential_types::Credentials as AwsCredentials;
pub use source::*;

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn debug_output_hides_secret_material() {
		let credentials =
			AwsCredentials::from_keys("AKIDEXAMPLE", "very-secret", Some("session-value".into()));
		let rendered = format!("{credentials:?}");

		assert!(rendered.contains("AKIDEXAMPLE"));
		assert!(!rendered.contains("very-secret"));
		assert!(!rendered.contains("session-value"));
	}
}
