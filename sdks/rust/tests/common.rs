//! Common test utilities

use mockito::{Server, ServerGuard};
use serde_json::{Value, json};
use trackboard_sdk::{TrackboardClient, TrackboardConfig};

pub const TEST_TOKEN: &str = "test-token";

/// Create a mock Trackboard server for testing
#[allow(dead_code)] // Used by other test modules
pub async fn create_mock_server() -> ServerGuard {
    Server::new_async().await
}

/// Setup a test client pointing to a mock server
#[allow(dead_code)] // Used by other test modules
pub async fn setup_test_client() -> (TrackboardClient, ServerGuard) {
    let server = create_mock_server().await;
    let config = TrackboardConfig::new(server.url())
        .with_timeout(std::time::Duration::from_secs(5))
        .with_auth_token(TEST_TOKEN);
    let client = TrackboardClient::new(config).unwrap();
    (client, server)
}

/// Chart body as the server renders it
#[allow(dead_code)] // Used by other test modules
pub fn chart_body(title: &str) -> Value {
    json!([
        {
            "rank": 1,
            "rankDelta": {"kind": "up", "places": 2},
            "title": title,
            "link": "https://open.spotify.com/track/abc",
            "id": "abc",
            "contributors": [{"name": "Artist", "link": "https://open.spotify.com/artist/x"}],
            "images": [{"url": "https://i.scdn.co/image/1", "width": 640, "height": 640}],
            "streams": 6000000,
            "totalStreams": 900000000
        }
    ])
}
