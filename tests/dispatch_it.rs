// std
use std::{net::TcpListener, time::Duration};
// crates.io
use httpmock::prelude::*;
use serde::Deserialize;
use serde_json::json;
// self
use spotify_dispatch::{
	dispatch::{Dispatcher, Page, RequestSpec},
	error::{Error, TransportError},
	params::QueryParams,
	provider::StaticToken,
	service::ServiceDescriptor,
	transport::RetryPolicy,
};

fn build_descriptor(server: &MockServer) -> ServiceDescriptor {
	ServiceDescriptor::builder()
		.authorization_endpoint_str(&server.url("/authorize"))
		.and_then(|builder| builder.token_endpoint_str(&server.url("/api/token")))
		.and_then(|builder| builder.api_base_str(&server.url("/v1")))
		.and_then(|builder| builder.build())
		.expect("Loopback descriptor should build.")
}

fn build_dispatcher(server: &MockServer, policy: RetryPolicy) -> Dispatcher {
	Dispatcher::builder(StaticToken::new("static-token"))
		.descriptor(build_descriptor(server))
		.retry_policy(policy)
		.build()
		.expect("Dispatcher should build.")
}

#[tokio::test]
async fn get_encodes_query_and_sends_bearer_header() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let dispatcher = build_dispatcher(&server, RetryPolicy::none());
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1/albums")
				.header("authorization", "Bearer static-token")
				.query_param("ids", "a,b")
				.query_param("market", "SE");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "albums": [{ "id": "a" }, { "id": "b" }] }));
		})
		.await;
	let query = QueryParams::new()
		.with("ids", vec![Some("a"), None, Some("b")])
		.with("market", "SE")
		.with("limit", None::<u32>);
	let payload = dispatcher.get("/albums", query).await?.expect("Albums payload should be present.");

	assert_eq!(payload["albums"][1]["id"], "b");

	mock.assert_calls_async(1).await;

	Ok(())
}

#[tokio::test]
async fn post_sends_json_body() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let dispatcher = build_dispatcher(&server, RetryPolicy::none());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v1/playlists/p1/tracks")
				.json_body(json!({ "uris": ["spotify:track:t1"] }));
			then.status(201)
				.header("content-type", "application/json")
				.json_body(json!({ "snapshot_id": "snap" }));
		})
		.await;
	let payload = dispatcher
		.post(
			"playlists/p1/tracks",
			QueryParams::new(),
			Some(json!({ "uris": ["spotify:track:t1"] })),
		)
		.await?;

	assert_eq!(payload, Some(json!({ "snapshot_id": "snap" })));

	mock.assert_calls_async(1).await;

	Ok(())
}

#[tokio::test]
async fn not_found_surfaces_api_message() {
	let server = MockServer::start_async().await;
	let dispatcher = build_dispatcher(&server, RetryPolicy::none());

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/tracks/missing");
			then.status(404)
				.header("content-type", "application/json")
				.json_body(json!({ "error": { "status": 404, "message": "Non existing id" } }));
		})
		.await;

	let err = dispatcher
		.get("tracks/missing", QueryParams::new())
		.await
		.expect_err("404 should surface as an error.");

	assert!(matches!(
		err,
		Error::Request { status: 404, ref message } if message == "Non existing id"
	));
}

#[tokio::test]
async fn device_errors_map_to_device_not_found() {
	let server = MockServer::start_async().await;
	let dispatcher = build_dispatcher(&server, RetryPolicy::none());

	server
		.mock_async(|when, then| {
			when.method(PUT).path("/v1/me/player/play").query_param("device_id", "gone");
			then.status(404)
				.header("content-type", "application/json")
				.json_body(json!({ "error": { "status": 404, "message": "Device not found" } }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(PUT).path("/v1/me/player/pause");
			then.status(403).header("content-type", "application/json").json_body(json!({
				"error": {
					"status": 403,
					"message": "Player command failed: No active device found",
					"reason": "NO_ACTIVE_DEVICE"
				}
			}));
		})
		.await;

	let err = dispatcher
		.put("me/player/play", QueryParams::new().with("device_id", "gone"), None)
		.await
		.expect_err("Unknown device should fail.");

	assert!(matches!(err, Error::DeviceNotFound { ref message } if message == "Device not found"));

	let err = dispatcher
		.put("me/player/pause", QueryParams::new(), None)
		.await
		.expect_err("Inactive device should fail.");

	assert!(matches!(err, Error::DeviceNotFound { .. }));
}

#[tokio::test]
async fn rate_limit_retries_until_exhausted() {
	let server = MockServer::start_async().await;
	let dispatcher = build_dispatcher(&server, RetryPolicy::none().with_max_retries(2));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/me");
			then.status(429).header("retry-after", "7");
		})
		.await;
	let err = dispatcher.get("me", QueryParams::new()).await.expect_err("429 should surface.");

	match err {
		Error::RateLimitReached { retry_after } =>
			assert_eq!(retry_after.map(|delay| delay.whole_seconds()), Some(7)),
		other => panic!("Unexpected error: {other:?}."),
	}

	mock.assert_calls_async(3).await;
}

#[tokio::test]
async fn server_errors_and_empty_client_errors_are_not_retried() {
	let server = MockServer::start_async().await;
	let dispatcher = build_dispatcher(&server, RetryPolicy::none().with_max_retries(3));
	let unavailable = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/browse/categories");
			then.status(503).body("upstream unavailable");
		})
		.await;
	let bad_request = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/v1/me/tracks");
			then.status(400);
		})
		.await;
	let err = dispatcher
		.get("browse/categories", QueryParams::new())
		.await
		.expect_err("503 should surface.");

	assert!(matches!(err, Error::Server { status: 503 }));

	let err = dispatcher
		.delete("me/tracks", QueryParams::new(), None)
		.await
		.expect_err("400 should surface.");

	assert!(matches!(err, Error::Request { status: 400, ref message } if message.is_empty()));

	unavailable.assert_calls_async(1).await;
	bad_request.assert_calls_async(1).await;
}

#[tokio::test]
async fn no_content_returns_none() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let dispatcher = build_dispatcher(&server, RetryPolicy::none());

	server
		.mock_async(|when, then| {
			when.method(PUT).path("/v1/me/player/volume").query_param("volume_percent", "40");
			then.status(204);
		})
		.await;

	let payload = dispatcher
		.execute(RequestSpec::put("me/player/volume").with_param("volume_percent", 40_u8))
		.await?;

	assert_eq!(payload, None);

	Ok(())
}

#[tokio::test]
async fn pagination_follows_absolute_links() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let dispatcher = build_dispatcher(&server, RetryPolicy::none());
	let next_url = server.url("/v1/me/playlists?offset=2&limit=2");

	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1/me/playlists")
				.query_param("limit", "2")
				.query_param("offset", "0");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"href": "first",
				"items": [{ "id": "p1" }, { "id": "p2" }],
				"limit": 2,
				"offset": 0,
				"total": 3,
				"next": next_url,
				"previous": null
			}));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/me/playlists").query_param("offset", "2");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"href": "second",
				"items": [{ "id": "p3" }],
				"limit": 2,
				"offset": 2,
				"total": 3,
				"next": null,
				"previous": null
			}));
		})
		.await;

	let first = dispatcher
		.get("me/playlists", QueryParams::new().with("limit", 2_u32).with("offset", 0_u32))
		.await?
		.expect("First page should be present.");
	let second = dispatcher.next_page(&first).await?.expect("Second page should be present.");

	assert_eq!(second["items"][0]["id"], "p3");
	assert_eq!(dispatcher.next_page(&second).await?, None);
	assert_eq!(dispatcher.previous_page(&first).await?, None);

	#[derive(Debug, Deserialize)]
	struct Playlist {
		id: String,
	}

	let typed: Page<Playlist> = dispatcher
		.execute_as(
			RequestSpec::get("me/playlists").with_param("limit", 2_u32).with_param("offset", 0_u32),
		)
		.await?
		.expect("Typed first page should be present.");

	assert_eq!(typed.total, Some(3));
	assert_eq!(typed.items.len(), 2);

	let typed_next =
		dispatcher.next_page_as(&typed).await?.expect("Typed second page should be present.");

	assert_eq!(typed_next.items[0].id, "p3");
	assert!(dispatcher.next_page_as(&typed_next).await?.is_none());

	Ok(())
}

#[tokio::test]
async fn typed_decode_failure_reports_path() {
	let server = MockServer::start_async().await;
	let dispatcher = build_dispatcher(&server, RetryPolicy::none());

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/me");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "id": 42 }));
		})
		.await;

	#[derive(Debug, Deserialize)]
	struct Profile {
		#[allow(dead_code)]
		id: String,
	}

	let err = dispatcher
		.execute_as::<Profile>(RequestSpec::get("me"))
		.await
		.expect_err("Numeric id should not decode into a string.");

	match err {
		Error::Decode { status, source } => {
			assert_eq!(status, 200);
			assert_eq!(source.path().to_string(), "id");
		},
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[tokio::test]
async fn timed_out_request_is_classified_and_not_retried() {
	let server = MockServer::start_async().await;
	let dispatcher = Dispatcher::builder(StaticToken::new("static-token"))
		.descriptor(build_descriptor(&server))
		.timeout(Duration::from_millis(100))
		.retry_policy(RetryPolicy::none().with_max_retries(2))
		.build()
		.expect("Dispatcher should build.");
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/me");
			then.status(200)
				.header("content-type", "application/json")
				.delay(Duration::from_millis(500))
				.json_body(json!({ "id": "late" }));
		})
		.await;
	let err = dispatcher
		.get("/me", QueryParams::new())
		.await
		.expect_err("Slow response should time out.");

	assert!(matches!(err, Error::Transport(TransportError::Timeout { .. })));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn unreachable_api_exhausts_connect_retries_as_network_error() {
	let port = {
		let listener = TcpListener::bind("127.0.0.1:0").expect("Ephemeral port should bind.");

		listener.local_addr().expect("Bound listener has an address.").port()
	};
	let descriptor = ServiceDescriptor::builder()
		.authorization_endpoint_str(&format!("http://127.0.0.1:{port}/authorize"))
		.and_then(|builder| builder.token_endpoint_str(&format!("http://127.0.0.1:{port}/api/token")))
		.and_then(|builder| builder.api_base_str(&format!("http://127.0.0.1:{port}/v1")))
		.and_then(|builder| builder.build())
		.expect("Loopback descriptor should build.");
	let dispatcher = Dispatcher::builder(StaticToken::new("static-token"))
		.descriptor(descriptor)
		.retry_policy(RetryPolicy::none().with_max_retries(2))
		.build()
		.expect("Dispatcher should build.");
	let err = dispatcher
		.get("/me", QueryParams::new())
		.await
		.expect_err("Closed port should refuse the connection.");

	assert!(matches!(err, Error::Transport(TransportError::Network { .. })));
}
