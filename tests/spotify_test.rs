use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::Utc;
use sporlstats::{
    config::SpotifyConfig,
    management::TokenManager,
    spotify::{SpotifyClient, SpotifyError, features, player, top},
    types::{TimeRange, Token},
};
use tempfile::TempDir;

// Serves `router` on a free local port and returns its base url
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}")
}

fn client(api_url: &str, dir: &TempDir) -> SpotifyClient {
    let config = SpotifyConfig::from_lookup(|key| match key {
        "SPOTIFY_API_AUTH_CLIENT_ID" => Some("client".to_string()),
        "SPOTIFY_API_URL" => Some(api_url.to_string()),
        _ => None,
    })
    .unwrap();
    let token = Token {
        access_token: "access".into(),
        refresh_token: "refresh".into(),
        scope: String::new(),
        expires_in: 3600,
        obtained_at: Utc::now().timestamp() as u64,
    };

    SpotifyClient::new(config, TokenManager::new(token, dir.path().join("token.json")))
}

async fn rate_limited(State(hits): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "0")])
}

#[tokio::test]
async fn test_rate_limit_retries_are_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/me/top/tracks", get(rate_limited))
        .with_state(Arc::clone(&hits));
    let mut client = client(&serve(router).await, &dir);

    let result = top::top_tracks(&mut client, TimeRange::ShortTerm, 10).await;

    assert!(matches!(result, Err(SpotifyError::RateLimited(0))));
    // First request plus five retries
    assert_eq!(hits.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_long_retry_after_is_not_waited_for() {
    let dir = tempfile::tempdir().unwrap();
    let router = Router::new().route(
        "/me/top/artists",
        get(|| async { (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "3600")]) }),
    );
    let mut client = client(&serve(router).await, &dir);

    let result = top::top_artists(&mut client, TimeRange::LongTerm, 10).await;

    assert!(matches!(result, Err(SpotifyError::RateLimited(3600))));
}

#[tokio::test]
async fn test_nothing_playing() {
    let dir = tempfile::tempdir().unwrap();
    let router = Router::new().route(
        "/me/player/currently-playing",
        get(|| async { StatusCode::NO_CONTENT }),
    );
    let mut client = client(&serve(router).await, &dir);

    assert!(player::currently_playing(&mut client).await.unwrap().is_none());
}

#[tokio::test]
async fn test_denied_audio_features_mean_no_features() {
    let dir = tempfile::tempdir().unwrap();
    let router = Router::new().route("/audio-features", get(|| async { StatusCode::FORBIDDEN }));
    let mut client = client(&serve(router).await, &dir);

    let features = features::audio_features(&mut client, &["t1".to_string()])
        .await
        .unwrap();

    assert!(features.is_empty());
}

#[tokio::test]
async fn test_other_errors_surface_as_status() {
    let dir = tempfile::tempdir().unwrap();
    let router = Router::new().route(
        "/me/top/tracks",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let mut client = client(&serve(router).await, &dir);

    let result = top::top_tracks(&mut client, TimeRange::MediumTerm, 5).await;

    assert!(matches!(
        result,
        Err(SpotifyError::Status(status)) if status.as_u16() == 500
    ));
}
