//! Demonstrates logging in, transparently refreshing an expired access credential, and logging
//! out against a mock console backend with the default reqwest transport.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::Value;
// self
use console_api_client::{
	auth::LoginRequest,
	client::ReqwestApiClient,
	config::ClientConfig,
	nav::RecordingNavigator,
	resources::PageQuery,
	store::MemoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/user/login");
			then.status(200).header("content-type", "application/json").body(
				r#"{"code":200,"msg":"ok","data":{"access_token":"A1","refresh_token":"R1"}}"#,
			);
		})
		.await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/biz/search").header("x-access-token", "A1");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"code":401,"msg":"token expired"}"#);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/user/refresh_token");
			then.status(200).header("content-type", "application/json").body(
				r#"{"code":200,"msg":"ok","data":{"access_token":"A2","refresh_token":"R2"}}"#,
			);
		})
		.await;
	let search = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/biz/search").header("x-access-token", "A2");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"code":200,"msg":"ok","data":{"total":2,"records":["acme","globex"]}}"#);
		})
		.await;
	let logout = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/user/logout");
			then.status(200).header("content-type", "application/json").body(r#"{"code":200}"#);
		})
		.await;
	let store = Arc::new(MemoryStore::default());
	let navigator = Arc::new(RecordingNavigator::default());
	let config = ClientConfig::builder(format!("http://{}", server.address())).build()?;
	let client = ReqwestApiClient::new(config, store.clone())?.with_navigator(navigator.clone());
	let session = client.login(&LoginRequest::new("ops", "secret")).await;

	println!("login: {} (status {})", session.message(), session.status_code());

	let page = client.search_businesses::<Value>(PageQuery::page(1, 20), None).await;

	println!("search: {:?}", page.into_result());
	println!("stored access credential: {:?}", store.peek("access-token"));
	println!(
		"refresh attempts: {}, replays: {}",
		client.refresh.metrics.attempts(),
		client.refresh.metrics.replays()
	);

	client.logout().await;

	println!("logged in after logout: {}", client.is_logged_in().await);
	println!("redirects: {:?}", navigator.history());

	login.assert_async().await;
	expired.assert_async().await;
	refresh.assert_async().await;
	search.assert_async().await;
	logout.assert_async().await;

	Ok(())
}
