use crate::controller::{health_check_controller, stream_controller, ApiResponse};
use crate::{params, sse::handler::stream_handler, AppState};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use log::*;
use tower_http::cors::CorsLayer;

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Stream Hub API"
        ),
        paths(
            health_check_controller::health_check,
            stream_controller::history,
        ),
        components(
            schemas(
                ApiResponse,
                params::history::HistoryParams,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "stream_hub", description = "Marking-filtered live event stream")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Stream tokens are accepted either as a bearer token or in a cookie.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "stream_token",
                    "Stream token; the cookie name is configurable",
                ))),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config.allowed_origins);

    Router::new()
        .merge(stream_routes(app_state.clone()))
        .merge(history_routes(app_state).layer(cors.clone()))
        .merge(health_routes().layer(cors))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

// `/stream` answers any origin itself, so it stays outside the CORS layer.
fn stream_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/stream", get(stream_handler))
        .with_state(app_state)
}

fn history_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/stream/history", post(stream_controller::history))
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid allowed origin '{origin}': {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{Duration as ChronoDuration, Utc};
    use clap::Parser;
    use domain::jwt::{JwtAuthenticator, StreamClaims};
    use events::MemoryEventLog;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use service::config::Config;
    use sse::Hub;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "router-test-secret";

    struct TestServer {
        app: Router,
        log: Arc<MemoryEventLog>,
        hub: Arc<Hub>,
        tokens: JwtAuthenticator,
    }

    impl TestServer {
        async fn start() -> Self {
            let log = Arc::new(MemoryEventLog::new());
            let hub = Arc::new(
                Hub::start(log.clone(), Duration::from_secs(20))
                    .await
                    .unwrap(),
            );
            let app_state = AppState::new(
                Config::try_parse_from(["stream_hub"]).unwrap(),
                Arc::clone(&hub),
                Arc::new(JwtAuthenticator::new(SECRET)),
            );

            Self {
                app: define_routes(app_state),
                log,
                hub,
                tokens: JwtAuthenticator::new(SECRET),
            }
        }

        fn token(&self, id: &str, markings: &[&str]) -> String {
            self.tokens
                .issue(&StreamClaims {
                    sub: id.to_string(),
                    exp: (Utc::now() + ChronoDuration::hours(1)).timestamp(),
                    allowed_markings: markings.iter().map(|m| m.to_string()).collect(),
                    capabilities: vec![],
                })
                .unwrap()
        }

        async fn send(&self, request: Request<Body>) -> axum::response::Response {
            self.app.clone().oneshot(request).await.unwrap()
        }
    }

    fn history_request(token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/stream/history")
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Reads body chunks until `count` complete frames have arrived.
    async fn read_frames(body: &mut Body, count: usize) -> Vec<String> {
        let mut buffer = String::new();
        while buffer.matches("\n\n").count() < count {
            let frame = body.frame().await.unwrap().unwrap();
            if let Ok(data) = frame.into_data() {
                buffer.push_str(std::str::from_utf8(&data).unwrap());
            }
        }
        buffer
            .split("\n\n")
            .filter(|frame| !frame.is_empty())
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn health_check_responds() {
        let server = TestServer::start().await;
        let response = server
            .send(Request::get("/health").body(Body::empty()).unwrap())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stream_without_token_is_unauthorized() {
        let server = TestServer::start().await;
        let response = server
            .send(Request::get("/stream").body(Body::empty()).unwrap())
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await, json!({"status": "unauthorized"}));
        assert_eq!(server.hub.registry().count_live(), 0);
    }

    #[tokio::test]
    async fn stream_with_a_bad_token_is_unauthorized() {
        let server = TestServer::start().await;
        let forged = JwtAuthenticator::new("another-secret")
            .issue(&StreamClaims {
                sub: "mallory".to_string(),
                exp: (Utc::now() + ChronoDuration::hours(1)).timestamp(),
                allowed_markings: vec![],
                capabilities: vec!["BYPASS".to_string()],
            })
            .unwrap();

        let response = server
            .send(
                Request::get("/stream")
                    .header("Authorization", format!("Bearer {forged}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn stream_opens_with_headers_connected_and_heartbeat() {
        let server = TestServer::start().await;
        let token = server.token("analyst", &["TLP:GREEN"]);

        let response = server
            .send(
                Request::get("/stream")
                    .header("Cookie", format!("stream_token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["content-type"], "text/event-stream; charset=utf-8");
        assert_eq!(headers["cache-control"], "no-cache, no-transform");
        assert_eq!(headers["connection"], "keep-alive");
        assert_eq!(headers["access-control-allow-origin"], "*");

        let mut body = response.into_body();
        let frames = read_frames(&mut body, 2).await;
        assert!(frames[0].starts_with("event: connected\ndata: "));
        assert!(frames[0].contains("\"clients\":1"));
        assert!(frames[1].starts_with("event: heartbeat\ndata: "));
        assert_eq!(server.hub.registry().count_live(), 1);

        // The client hanging up removes its session.
        drop(body);
        assert_eq!(server.hub.registry().count_live(), 0);
    }

    #[tokio::test]
    async fn live_events_are_filtered_on_the_wire() {
        let server = TestServer::start().await;
        let token = server.token("analyst", &["TLP:GREEN"]);
        let response = server
            .send(
                Request::get("/stream")
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        let mut body = response.into_body();
        read_frames(&mut body, 2).await;

        server
            .log
            .append("create", json!({"type": "report"}), vec!["TLP:RED".to_string()]);

        let frames = read_frames(&mut body, 1).await;
        assert!(frames[0].starts_with("id: 1\ndata: "));
        assert!(frames[0].contains("\"granted\":false"));
        assert!(!frames[0].contains("report"));
    }

    #[tokio::test]
    async fn history_without_token_is_unauthorized() {
        let server = TestServer::start().await;
        let response = server
            .send(
                Request::post("/stream/history")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await, json!({"status": "unauthorized"}));
    }

    #[tokio::test]
    async fn history_without_an_open_stream_is_rejected() {
        let server = TestServer::start().await;
        let token = server.token("analyst", &["TLP:GREEN"]);

        let response = server.send(history_request(&token, json!({}))).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "error": "stream not connected"})
        );
    }

    #[tokio::test]
    async fn history_replays_into_the_open_stream() {
        let server = TestServer::start().await;
        for n in 0..3 {
            server
                .log
                .append("create", json!({"n": n}), vec!["TLP:GREEN".to_string()]);
        }
        let token = server.token("analyst", &["TLP:GREEN"]);
        let stream = server
            .send(
                Request::get("/stream")
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        let mut body = stream.into_body();
        read_frames(&mut body, 2).await;

        let response = server
            .send(history_request(&token, json!({"from": "2", "size": 5})))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"success": true}));

        let frames = read_frames(&mut body, 2).await;
        assert!(frames[0].starts_with("id: 2\nevent: create\n"));
        assert!(frames[1].starts_with("id: 3\nevent: create\n"));
    }

    #[tokio::test]
    async fn history_with_a_bad_cursor_is_a_bad_request() {
        let server = TestServer::start().await;
        let token = server.token("analyst", &[]);

        let response = server
            .send(history_request(&token, json!({"from": "yesterday"})))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], json!(false));
    }
}
