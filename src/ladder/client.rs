use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header::HeaderMap};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    LadderApi,
    models::{
        Distributions, LadderResponse, MatchDetails, PlayerMatch, PlayerProfile, RateLimitQuota,
        WinLoss,
    },
};

const REMAINING_MINUTE_HEADER: &str = "x-rate-limit-remaining-minute";
const REMAINING_DAY_HEADER: &str = "x-rate-limit-remaining-day";
const IP_ADDRESS_HEADER: &str = "x-ip-address";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure to set up the ladder client. Request failures are reported through [`LadderResponse`] instead.
#[derive(Debug, Error)]
pub enum LadderError {
    /// The reqwest client could not be built.
    #[error("failed to build ladder HTTP client: {source}")]
    ClientBuilder {
        /// Underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

/// Thin OpenDota client. No caching and no retries; callers decide what to do
/// with a rate-limited response.
#[derive(Clone)]
pub struct OpenDotaClient {
    client: Client,
    base_url: Arc<str>,
}

impl OpenDotaClient {
    /// Client for the API rooted at `base_url`, e.g. `https://api.opendota.com/api`.
    pub fn new(base_url: &str) -> Result<Self, LadderError> {
        let client = Client::builder()
            .user_agent(concat!("ascendia-back/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| LadderError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    /// Send and sort the response into rate limited, failed or usable.
    async fn dispatch<T>(
        builder: RequestBuilder,
        path: &str,
    ) -> Result<(Response, RateLimitQuota), LadderResponse<T>> {
        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(path, error = %err, "ladder request failed");
                return Err(LadderResponse::failed(RateLimitQuota::default()));
            }
        };

        let quota = parse_quota(response.headers());
        match response.status() {
            StatusCode::OK => Ok((response, quota)),
            StatusCode::TOO_MANY_REQUESTS => {
                debug!(path, remaining_day = ?quota.remaining_day, "ladder rate limit hit");
                Err(LadderResponse::limited(quota))
            }
            status => {
                warn!(path, %status, "ladder returned unexpected status");
                Err(LadderResponse::failed(quota))
            }
        }
    }

    async fn get_json<T>(self, path: String, query: Option<(&'static str, String)>) -> LadderResponse<T>
    where
        T: DeserializeOwned,
    {
        let mut builder = self.request(Method::GET, &path);
        if let Some((key, value)) = query {
            builder = builder.query(&[(key, value)]);
        }

        let (response, quota) = match Self::dispatch(builder, &path).await {
            Ok(ok) => ok,
            Err(outcome) => return outcome,
        };

        match response.json::<T>().await {
            Ok(value) => LadderResponse::success(value, quota),
            Err(err) => {
                warn!(path, error = %err, "failed to decode ladder response");
                LadderResponse::failed(quota)
            }
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_quota(headers: &HeaderMap) -> RateLimitQuota {
    RateLimitQuota {
        remaining_minute: header_value(headers, REMAINING_MINUTE_HEADER)
            .and_then(|value| value.parse().ok()),
        remaining_day: header_value(headers, REMAINING_DAY_HEADER)
            .and_then(|value| value.parse().ok()),
        ip: header_value(headers, IP_ADDRESS_HEADER).map(str::to_string),
    }
}

fn normalize_account_id(account_id: &str) -> Option<String> {
    let trimmed = account_id.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl LadderApi for OpenDotaClient {
    fn refresh_player(&self, account_id: &str) -> BoxFuture<'static, LadderResponse<()>> {
        let client = self.clone();
        let account_id = normalize_account_id(account_id);
        Box::pin(async move {
            let Some(account_id) = account_id else {
                return LadderResponse::invalid();
            };
            let path = format!("/players/{account_id}/refresh");
            let builder = client.request(Method::POST, &path);
            // The body is a queue acknowledgement; only the status matters.
            match Self::dispatch(builder, &path).await {
                Ok((_, quota)) => LadderResponse::success((), quota),
                Err(outcome) => outcome,
            }
        })
    }

    fn player(&self, account_id: &str) -> BoxFuture<'static, LadderResponse<PlayerProfile>> {
        let client = self.clone();
        let account_id = normalize_account_id(account_id);
        Box::pin(async move {
            match account_id {
                Some(id) => client.get_json(format!("/players/{id}"), None).await,
                None => LadderResponse::invalid(),
            }
        })
    }

    fn win_loss(&self, account_id: &str) -> BoxFuture<'static, LadderResponse<WinLoss>> {
        let client = self.clone();
        let account_id = normalize_account_id(account_id);
        Box::pin(async move {
            match account_id {
                Some(id) => client.get_json(format!("/players/{id}/wl"), None).await,
                None => LadderResponse::invalid(),
            }
        })
    }

    fn player_matches(
        &self,
        account_id: &str,
        limit: u32,
    ) -> BoxFuture<'static, LadderResponse<Vec<PlayerMatch>>> {
        let client = self.clone();
        let account_id = normalize_account_id(account_id);
        Box::pin(async move {
            match account_id {
                Some(id) if limit > 0 => {
                    client
                        .get_json(
                            format!("/players/{id}/matches"),
                            Some(("limit", limit.to_string())),
                        )
                        .await
                }
                _ => LadderResponse::invalid(),
            }
        })
    }

    fn match_details(&self, match_id: i64) -> BoxFuture<'static, LadderResponse<MatchDetails>> {
        let client = self.clone();
        Box::pin(async move {
            if match_id <= 0 {
                return LadderResponse::invalid();
            }
            client.get_json(format!("/matches/{match_id}"), None).await
        })
    }

    fn distributions(&self) -> BoxFuture<'static, LadderResponse<Distributions>> {
        let client = self.clone();
        Box::pin(async move { client.get_json("/distributions".to_string(), None).await })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::{get, post},
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    #[derive(Clone, Default)]
    struct FakeLadder {
        hits: Arc<AtomicUsize>,
    }

    const QUOTA_HEADERS: [(&str, &str); 3] = [
        ("X-Rate-Limit-Remaining-Minute", "55"),
        ("X-Rate-Limit-Remaining-Day", "1999"),
        ("X-IP-Address", "10.0.0.7"),
    ];

    async fn refresh(State(fake): State<FakeLadder>, Path(id): Path<String>) -> Response {
        fake.hits.fetch_add(1, Ordering::SeqCst);
        match id.as_str() {
            "429" => (
                StatusCode::TOO_MANY_REQUESTS,
                [("X-Rate-Limit-Remaining-Minute", "0")],
                "slow down",
            )
                .into_response(),
            "500" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            _ => (QUOTA_HEADERS, Json(json!({ "length": 3 }))).into_response(),
        }
    }

    async fn player(State(fake): State<FakeLadder>, Path(id): Path<String>) -> Response {
        fake.hits.fetch_add(1, Ordering::SeqCst);
        (
            QUOTA_HEADERS,
            Json(json!({
                "competitive_rank": null,
                "leaderboard_rank": 812,
                "rank_tier": 80,
                "profile": { "account_id": id.parse::<u64>().unwrap_or(0), "personaname": "Ana" }
            })),
        )
            .into_response()
    }

    async fn win_loss(State(fake): State<FakeLadder>, Path(id): Path<String>) -> Response {
        fake.hits.fetch_add(1, Ordering::SeqCst);
        if id == "garbled" {
            return "not json".into_response();
        }
        Json(json!({ "win": 7, "lose": 3 })).into_response()
    }

    async fn matches(
        Path(_id): Path<String>,
        Query(query): Query<Vec<(String, String)>>,
    ) -> Json<serde_json::Value> {
        let limit = query
            .iter()
            .find(|(key, _)| key == "limit")
            .and_then(|(_, value)| value.parse::<i64>().ok())
            .unwrap_or(0);
        Json(json!((1..=limit).map(|id| json!({ "match_id": id })).collect::<Vec<_>>()))
    }

    async fn match_details(Path(id): Path<i64>) -> Json<serde_json::Value> {
        Json(json!({ "match_id": id, "region": 3 }))
    }

    async fn distributions() -> Json<serde_json::Value> {
        Json(json!({ "ranks": { "rows": [], "sum": { "count": 123456 } } }))
    }

    async fn spawn_fake() -> (OpenDotaClient, FakeLadder) {
        let fake = FakeLadder::default();
        let app = Router::new()
            .route("/api/players/{id}/refresh", post(refresh))
            .route("/api/players/{id}", get(player))
            .route("/api/players/{id}/wl", get(win_loss))
            .route("/api/players/{id}/matches", get(matches))
            .route("/api/matches/{id}", get(match_details))
            .route("/api/distributions", get(distributions))
            .with_state(fake.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let client = OpenDotaClient::new(&format!("http://{addr}/api/")).unwrap();
        (client, fake)
    }

    #[tokio::test]
    async fn successful_calls_carry_quota_headers() {
        let (client, _) = spawn_fake().await;

        let refreshed = client.refresh_player("42").await;
        assert!(refreshed.valid);
        assert!(!refreshed.rate_limited);
        assert_eq!(refreshed.quota.remaining_minute, Some(55));
        assert_eq!(refreshed.quota.remaining_day, Some(1999));
        assert_eq!(refreshed.quota.ip.as_deref(), Some("10.0.0.7"));

        let profile = client.player(" 42 ").await;
        let profile = profile.value.unwrap();
        assert_eq!(profile.rank_tier, Some(80));
        assert_eq!(profile.leaderboard_rank, Some(812));
        assert_eq!(profile.competitive_rank, None);
        assert_eq!(profile.persona_name(), Some("Ana"));

        let record = client.win_loss("42").await.value.unwrap();
        assert_eq!((record.win, record.lose), (7, 3));
    }

    #[tokio::test]
    async fn too_many_requests_is_the_only_rate_limited_status() {
        let (client, _) = spawn_fake().await;

        let limited = client.refresh_player("429").await;
        assert!(limited.rate_limited);
        assert!(!limited.valid);
        assert_eq!(limited.quota.remaining_minute, Some(0));

        let failed = client.refresh_player("500").await;
        assert!(!failed.rate_limited);
        assert!(!failed.valid);
    }

    #[tokio::test]
    async fn undecodable_body_is_an_ordinary_failure() {
        let (client, _) = spawn_fake().await;

        let response = client.win_loss("garbled").await;
        assert!(!response.valid);
        assert!(!response.rate_limited);
        assert!(response.value.is_none());
    }

    #[tokio::test]
    async fn blank_ids_short_circuit_without_a_request() {
        let (client, fake) = spawn_fake().await;

        assert_eq!(client.refresh_player("  ").await, LadderResponse::invalid());
        assert_eq!(client.player("").await, LadderResponse::invalid());
        assert_eq!(client.win_loss("\t").await, LadderResponse::invalid());
        assert!(!client.match_details(0).await.valid);
        assert_eq!(fake.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn match_history_and_distributions_decode() {
        let (client, _) = spawn_fake().await;

        let recent = client.player_matches("42", 4).await.value.unwrap();
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].match_id, 1);

        let details = client.match_details(99).await.value.unwrap();
        assert_eq!(details.region, Some(3));

        let totals = client.distributions().await.value.unwrap();
        assert_eq!(totals.ranked_players(), 123456);
    }

    #[tokio::test]
    async fn transport_error_is_an_ordinary_failure() {
        let client = OpenDotaClient::new("http://127.0.0.1:9/api").unwrap();

        let response = client.player("42").await;
        assert!(!response.valid);
        assert!(!response.rate_limited);
    }
}
