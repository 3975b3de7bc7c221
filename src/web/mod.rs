//! Web server module

mod middleware;
mod routes;
mod sse;

use anyhow::Result;
use axum::{
    http::{header, HeaderName, HeaderValue},
    routing::{get, post},
    Router,
};
use cached::TimedCache;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::config::Config;
use crate::events::EventBus;
use crate::stats::{LoginReport, LoginStats};

/// How long a built report is served before the store is read again
const REPORT_CACHE_SECS: u64 = 30;

pub struct AppState {
    pub stats: LoginStats,
    pub event_bus: EventBus,
    /// Holding any one of these grants access to the report
    pub report_capabilities: Vec<String>,
    report_cache: Mutex<TimedCache<NaiveDate, LoginReport>>,
}

impl AppState {
    pub fn new(stats: LoginStats, event_bus: EventBus, report_capabilities: Vec<String>) -> Self {
        Self {
            stats,
            event_bus,
            report_capabilities,
            report_cache: Mutex::new(TimedCache::with_lifespan(REPORT_CACHE_SECS)),
        }
    }
}

pub fn router(state: Arc<AppState>, capabilities_header: HeaderName) -> Router {
    Router::new()
        // Login notifications from the host
        .route("/api/logins", post(routes::record_login))
        // Admin endpoints
        .route("/api/report", get(routes::api_report))
        .route("/api/metrics", get(routes::api_metrics))
        .route("/events", get(sse::events_handler))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(middleware::CallerLayer::new(capabilities_header))
        .with_state(state)
}

pub async fn start_server(config: &Config, state: Arc<AppState>) -> Result<()> {
    let capabilities_header = HeaderName::from_bytes(config.stats.capabilities_header.as_bytes())?;
    let app = router(state, capabilities_header);

    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    info!("Web server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedDayClock;
    use crate::db::memory::MemoryStore;
    use crate::stats::UserRecord;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use serde_json::Value;
    use tower::ServiceExt;

    const CAPS: &str = "x-user-capabilities";

    fn app(store: &MemoryStore, today: &str) -> Router {
        let today = NaiveDate::parse_from_str(today, "%Y-%m-%d").unwrap();
        let shared = Arc::new(store.clone());
        let event_bus = EventBus::with_capacity(16);
        let stats = LoginStats::new(
            shared.clone(),
            shared.clone(),
            shared,
            Arc::new(FixedDayClock::new(today)),
            "customer",
        )
        .with_event_bus(event_bus.clone());
        let capabilities = vec!["manage_woocommerce".to_string(), "manage_options".to_string()];
        let state = Arc::new(AppState::new(stats, event_bus, capabilities));
        router(state, HeaderName::from_static(CAPS))
    }

    fn login(body: &str) -> Request<Body> {
        Request::post("/api/logins")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn report(capabilities: Option<&str>) -> Request<Body> {
        let mut request = Request::get("/api/report");
        if let Some(caps) = capabilities {
            request = request.header(CAPS, caps);
        }
        request.body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn logins_then_report() {
        let store = MemoryStore::new();
        store.add_user("alice", UserRecord::new("1", &["customer"])).await;
        let app = app(&store, "2023-07-15");

        for body in [
            r#"{"login":"alice"}"#,
            r#"{"login":"alice"}"#,
            r#"{"login":"alice"}"#,
            r#"{"login":"bob","user":{"id":"2","roles":["customer"]}}"#,
            r#"{"login":"nobody"}"#,
        ] {
            let response = app.clone().oneshot(login(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
        }

        let response = app.clone().oneshot(report(Some("read,manage_options"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

        let body = json(response).await;
        assert_eq!(body["total_logins"], 4);
        assert_eq!(body["total_unique_logins"], 2);
        assert_eq!(body["days"].as_array().unwrap().len(), 30);
        assert_eq!(body["labels"][29], "2023-07-15");
        assert_eq!(body["labels"][0], "2023-06-16");
        assert_eq!(body["logins"][29], 4);
        assert_eq!(body["unique_logins"][29], 2);
        assert_eq!(body["days"][29]["day"], "2023-07-15");
        let avg = body["avg_logins"].as_f64().unwrap();
        assert!((avg - 4.0 / 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn report_requires_capability() {
        let store = MemoryStore::new();
        let app = app(&store, "2023-08-01");

        for caps in [None, Some("read, edit_posts")] {
            let response = app.clone().oneshot(report(caps)).await.unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&bytes[..], routes::ACCESS_DENIED.as_bytes());
        }

        let response = app.oneshot(report(Some("manage_woocommerce"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn store_failure_does_not_fail_login_but_fails_report() {
        let store = MemoryStore::new();
        store.add_user("alice", UserRecord::new("1", &["customer"])).await;
        let app = app(&store, "2023-09-09");
        store.set_failing(true);

        let response = app.clone().oneshot(login(r#"{"login":"alice"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = app.clone().oneshot(report(Some("manage_options"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = app
            .clone()
            .oneshot(Request::get("/api/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(
                Request::get("/api/metrics")
                    .header(CAPS, "manage_options")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json(response).await;
        assert_eq!(body["store_failures"], 1);
        assert_eq!(body["counted"], 0);
    }

    #[tokio::test]
    async fn apps_keep_separate_report_caches() {
        let busy = MemoryStore::new();
        busy.add_user("alice", UserRecord::new("1", &["customer"])).await;
        let quiet = MemoryStore::new();
        let busy_app = app(&busy, "2030-01-01");
        let quiet_app = app(&quiet, "2030-01-01");

        for _ in 0..7 {
            let response = busy_app.clone().oneshot(login(r#"{"login":"alice"}"#)).await.unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
        }

        let busy_report = busy_app.oneshot(report(Some("manage_options"))).await.unwrap();
        assert_eq!(json(busy_report).await["total_logins"], 7);

        let quiet_report = quiet_app.oneshot(report(Some("manage_options"))).await.unwrap();
        assert_eq!(json(quiet_report).await["total_logins"], 0);
    }
}
