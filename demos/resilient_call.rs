//! Runs a client-credentials client against a local mock API that rate-limits the first call.
//!
//! ```sh
//! cargo run --example resilient_call
//! ```

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_courier::{
	config::ClientConfig,
	executor::{RequestDescriptor, RequestExecutor},
	reqwest::{Client as ReqwestClient, redirect::Policy},
	retry::RetryOptions,
	store::MemoryStore,
	transport::ReqwestTransport,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"demo-token","expires_in":3600}"#);
		})
		.await;

	let limited = server
		.mock_async(|when, then| {
			when.method(GET).path("/reports");
			then.status(429).header("retry-after", "1").header("x-ratelimit-remaining", "0");
		})
		.await;
	let config = ClientConfig::builder(Url::parse(&server.base_url())?, "demo-client")
		.client_secret("demo-secret")
		.retry_options(RetryOptions::default().with_max_attempts(2))
		.build()?;
	// The mock server presents a self-signed certificate.
	let client = ReqwestClient::builder()
		.redirect(Policy::none())
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()?;
	let executor = RequestExecutor::from_config(
		&config,
		Arc::new(MemoryStore::default()),
		Arc::new(ReqwestTransport::with_client(client)),
	);

	match executor.execute(&RequestDescriptor::get("reports")).await {
		Ok(response) => println!("Unexpected success: {}.", response.status),
		Err(e) => println!("Gave up after retrying: {e} ({:?}).", e.kind()),
	}

	limited.delete_async().await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/reports");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"reports":["daily","weekly"]}"#);
		})
		.await;

	let reports: serde_json::Value =
		executor.execute_json(&RequestDescriptor::get("reports")).await?;

	println!("Reports: {reports}.");

	Ok(())
}
