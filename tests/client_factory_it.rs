// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use httpmock::prelude::*;
// self
use vault_aws_lease::{
	_preludet::*,
	aws::sigv4,
	client::ClientFactory,
	credentials::{CredentialsFuture, CredentialsProvider, StaticCredentialsProvider},
	http::{
		HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportFuture,
	},
	lease::VaultLeaseProvider,
	secret::Secret,
};

const LEASE_BODY: &str = r#"{"lease_id":"aws/creds/deploy/1","lease_duration":900,"renewable":true,"data":{"access_key":"ASIALEASED","secret_key":"leased-secret","security_token":"leased-token"}}"#;

#[derive(Default)]
struct RecordingTransport {
	requests: Mutex<Vec<HttpRequest>>,
}
impl HttpTransport for RecordingTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		self.requests.lock().push(request);

		Box::pin(async { Ok(HttpResponse::new(200, "<PublishResponse/>")) })
	}
}

struct CountingProvider {
	inner: StaticCredentialsProvider,
	calls: AtomicUsize,
}
impl CredentialsProvider for CountingProvider {
	fn retrieve(&self) -> CredentialsFuture<'_> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		self.inner.retrieve()
	}

	fn is_expired(&self) -> bool {
		false
	}
}

fn counting_provider() -> Arc<CountingProvider> {
	Arc::new(CountingProvider {
		inner: StaticCredentialsProvider::new(test_aws_credentials()),
		calls: AtomicUsize::new(0),
	})
}

fn sns_endpoint() -> Url {
	Url::parse("https://sns.us-east-1.amazonaws.com/").expect("SNS endpoint should parse.")
}

#[tokio::test]
async fn signed_call_uses_service_scope() {
	let transport = Arc::new(RecordingTransport::default());
	let factory = ClientFactory::<RecordingTransport>::new(
		counting_provider(),
		transport.clone(),
		"us-east-1",
	)
	.with_clock(test_clock());
	let client = factory.client("sns", sns_endpoint());
	let request = client.form_request(&[
		("Action", "Publish"),
		("TopicArn", "arn:aws:sns:us-east-1:123456789012:deploys"),
		("Message", "hello world"),
	]);
	let response = client.send(request).await.expect("Signed publish should be delivered.");

	assert!(response.is_success());

	let requests = transport.requests.lock();
	let sent = &requests[0];

	assert_eq!(requests.len(), 1);
	assert_eq!(
		String::from_utf8_lossy(&sent.body),
		"Action=Publish&TopicArn=arn%3Aaws%3Asns%3Aus-east-1%3A123456789012%3Adeploys&Message=hello+world",
	);
	assert_eq!(sent.header_value("x-amz-date"), Some("20250101T000000Z"));
	assert_eq!(sent.header_value("host"), Some("sns.us-east-1.amazonaws.com"));
	assert!(
		sent.header_value("authorization")
			.expect("Signed request should carry authorization.")
			.contains("Credential=AKIDEXAMPLE/20250101/us-east-1/sns/aws4_request"),
	);
	assert!(sigv4::verify(sent, &test_aws_credentials()).expect("Signed publish should verify."));
}

#[tokio::test]
async fn each_send_retrieves_and_batches_retrieve_once() {
	let transport = Arc::new(RecordingTransport::default());
	let provider = counting_provider();
	let client = ClientFactory::<RecordingTransport>::new(
		provider.clone(),
		transport.clone(),
		"eu-west-1",
	)
	.with_clock(test_clock())
	.client("sqs", Url::parse("https://sqs.eu-west-1.amazonaws.com/").expect("URL should parse."));

	for _ in 0..2 {
		let request = client.form_request(&[("Action", "ListQueues")]);

		client.send(request).await.expect("Single send should succeed.");
	}

	assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

	let batch = (0..3)
		.map(|i| {
			let name = format!("q{i}");

			client.form_request(&[("Action", "GetQueueUrl"), ("QueueName", name.as_str())])
		})
		.collect::<Vec<_>>();
	let responses = client.send_batch(batch).await.expect("Batch send should succeed.");

	assert_eq!(responses.len(), 3);
	assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
	assert_eq!(transport.requests.lock().len(), 5);
}

#[test]
fn request_resolves_paths_against_endpoint() {
	let client = ClientFactory::<RecordingTransport>::new(
		counting_provider(),
		RecordingTransport::default(),
		"us-east-1",
	)
	.client("s3", Url::parse("https://s3.us-east-1.amazonaws.com/").expect("URL should parse."));
	let request = client
		.request(HttpMethod::Get, "bucket/key?versionId=2")
		.expect("Relative path should resolve.");

	assert_eq!(client.service(), "s3");
	assert_eq!(request.url.as_str(), "https://s3.us-east-1.amazonaws.com/bucket/key?versionId=2");
}

#[tokio::test]
async fn leased_credentials_sign_downstream_calls() {
	let server = MockServer::start_async().await;
	let lease = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/aws/creds/deploy");
			then.status(200).header("content-type", "application/json").body(LEASE_BODY);
		})
		.await;
	let publish = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/")
				.header("x-amz-security-token", "leased-token")
				.header_exists("authorization");
			then.status(200).body("<PublishResponse/>");
		})
		.await;
	let vault = build_reqwest_test_vault(&server.base_url());

	vault.set_token(Secret::new("hvs.session"));

	let provider =
		Arc::new(VaultLeaseProvider::new(vault, "aws", "deploy").with_clock(test_clock()));
	let client = ClientFactory::<ReqwestTransport>::new(
		provider.clone(),
		test_reqwest_transport(),
		"us-east-1",
	)
	.with_clock(test_clock())
	.client("sns", Url::parse(&server.base_url()).expect("Mock endpoint should parse."));

	for _ in 0..3 {
		let response = client
			.send(client.form_request(&[("Action", "Publish"), ("Message", "deployed")]))
			.await
			.expect("Publish should reach the mock endpoint.");

		assert_eq!(response.status(), 200);
	}

	assert_eq!(provider.metrics().fetches(), 1);
	assert_eq!(provider.metrics().cache_hits(), 2);

	lease.assert_calls_async(1).await;
	publish.assert_calls_async(3).await;
}
