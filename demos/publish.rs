//! Demonstrates the whole pipeline against a local mock broker: sign an identity proof, log in,
//! lease credentials, and publish to an SNS-shaped endpoint with a signed client.
//!
//! Point `VAULT_ADDR` and the `VAULT_AWS_LEASE_*` variables at a real broker and swap the static
//! source for [`bootstrap::connect_reqwest`] to run the same flow for real.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use vault_aws_lease::{
	aws::StaticSource,
	bootstrap,
	config::BrokerConfig,
	http::ReqwestTransport,
	reqwest::Client,
	signer::{DirectSigner, IdentitySigner},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/auth/aws/login");
			then.status(200).header("content-type", "application/json").body(
				r#"{"auth":{"client_token":"hvs.demo","accessor":"demo","policies":["deploy"],"lease_duration":3600,"renewable":true}}"#,
			);
		})
		.await;
	let lease = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/aws/creds/deploy").header("x-vault-token", "hvs.demo");
			then.status(200).header("content-type", "application/json").body(
				r#"{"lease_id":"aws/creds/deploy/demo","lease_duration":900,"renewable":true,"data":{"access_key":"ASIADEMO","secret_key":"demo-secret","security_token":"demo-token"}}"#,
			);
		})
		.await;
	let publish = server
		.mock_async(|when, then| {
			when.method(POST).path("/sns/").header("x-amz-security-token", "demo-token");
			then.status(200).body("<PublishResponse/>");
		})
		.await;
	let config = BrokerConfig {
		address: server.base_url(),
		auth_role: "deploy".into(),
		credential_role: "deploy".into(),
		..Default::default()
	};
	let signer: Arc<dyn IdentitySigner> = Arc::new(DirectSigner::new(StaticSource::from_keys(
		"AKIDEXAMPLE",
		"wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
	)));
	let transport = ReqwestTransport::with_client(Client::builder().build()?);
	let connected =
		bootstrap::connect_with_signer::<ReqwestTransport>(&config, transport, signer).await?;

	println!("Logged in with policies {:?}.", connected.session.policies);

	let client = connected
		.client_factory("us-east-1")
		.client("sns", Url::parse(&server.url("/sns/"))?);

	for message in ["build started", "build finished"] {
		let response = client
			.send(client.form_request(&[
				("Action", "Publish"),
				("TopicArn", "arn:aws:sns:us-east-1:123456789012:deploys"),
				("Message", message),
			]))
			.await?;

		println!("Published {message:?}: HTTP {}.", response.status());
	}

	println!("Lease metrics: {:?}.", connected.provider.metrics());

	login.assert_async().await;
	lease.assert_async().await;
	publish.assert_calls_async(2).await;

	Ok(())
}
