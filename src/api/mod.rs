pub mod auth;
pub mod error;
mod events;
pub mod validation;

use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        // Auth routes
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout))
        // Legacy REST read endpoint
        .route("/events", get(events::list_events))
        // Query/mutation protocol
        .route("/graphql", post(graphql_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let mut cors = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match config.server.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!(
            "Invalid CORS origin {:?}, cross-origin requests will be refused",
            config.server.cors_origin
        ),
    }

    cors
}

/// GraphQL entry point. The caller identity is resolved from the cookie here
/// and handed to the resolvers; an invalid or missing token simply yields an
/// anonymous request.
async fn graphql_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let caller = auth::authenticate(&state.config.auth, &jar);
    state.schema.execute(req.into_inner().data(caller)).await.into()
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let config = Config {
            auth: crate::config::AuthConfig {
                jwt_secret: "test-secret".to_string(),
                token_ttl_secs: 3600,
                dev_mode: true,
            },
            ..Config::default()
        };
        let db = crate::db::init_test().await;
        create_router(Arc::new(AppState::new(config, db)))
    }

    fn json_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Extract the `token=...` pair from a Set-Cookie header.
    fn cookie_pair(response: &axum::response::Response) -> Option<String> {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.to_string())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    const SIGNUP_BODY: &str =
        r#"{"email":"Ada@Example.com","password":"s3cret","firstname":"Ada"}"#;

    async fn signup(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(json_post("/signup", SIGNUP_BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        cookie_pair(&response).expect("signup must set the token cookie")
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_signup_sets_cookie_and_normalizes_email() {
        let app = test_app().await;
        let cookie = signup(&app).await;
        assert!(cookie.starts_with("token="));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["user"]["email"], "ada@example.com");
        assert_eq!(body["user"]["firstname"], "Ada");
        assert!(body["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_signup_conflicts_and_keeps_original_password() {
        let app = test_app().await;
        signup(&app).await;

        let response = app
            .clone()
            .oneshot(json_post(
                "/signup",
                r#"{"email":"ada@example.com","password":"other"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        // The original credentials still work
        let response = app
            .oneshot(json_post(
                "/login",
                r#"{"email":"ada@example.com","password":"s3cret"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(cookie_pair(&response).is_some());
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_sets_no_cookie() {
        let app = test_app().await;
        signup(&app).await;

        let response = app
            .oneshot(json_post(
                "/login",
                r#"{"email":"ada@example.com","password":"wrong"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(cookie_pair(&response).is_none());
    }

    #[tokio::test]
    async fn test_login_unknown_email_is_unauthorized() {
        let app = test_app().await;
        let response = app
            .oneshot(json_post(
                "/login",
                r#"{"email":"nobody@example.com","password":"x"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signup_validation_is_bad_request() {
        let app = test_app().await;
        let response = app
            .oneshot(json_post("/signup", r#"{"email":"not-an-email","password":"x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_rest_events_auth_statuses() {
        let app = test_app().await;

        // Missing cookie
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Present but invalid cookie
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/events")
                    .header(header::COOKIE, "token=garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // Valid cookie
        let cookie = signup(&app).await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/events")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_me_without_cookie_is_unauthorized() {
        let app = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_for_vanished_user_is_not_found() {
        let app = test_app().await;

        // Token verifies but no such user row exists
        let config = crate::config::AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_ttl_secs: 3600,
            dev_mode: true,
        };
        let token = auth::mint_token(&config, "ghost", "ghost@example.com").unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header(header::COOKIE, format!("token={}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let app = test_app().await;
        let cookie = signup(&app).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/logout")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cleared = cookie_pair(&response).unwrap();
        assert_eq!(cleared, "token=");
    }

    #[tokio::test]
    async fn test_graphql_unauthorized_rides_in_error_list_with_http_200() {
        let app = test_app().await;

        let response = app
            .oneshot(json_post("/graphql", r#"{"query":"{ events { id } }"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["message"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_graphql_create_with_cookie_identity() {
        let app = test_app().await;
        let cookie = signup(&app).await;

        let query = r#"{"query":"mutation { createEvent(name: \"Test Festival 2025\", dateFrom: \"20250717\", dateTo: \"20250720\", location: [46.2276, 7.3606], artists: [{ name: \"Test Artist\" }]) { id name createdBy } }"}"#;

        let mut request = json_post("/graphql", query);
        request
            .headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert!(body.get("errors").is_none(), "{}", body);
        assert_eq!(body["data"]["createEvent"]["name"], "Test Festival 2025");

        // Visible through the REST listing as well
        let cookie = signup_cookie_reuse(&app).await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/events")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let events = body_json(response).await;
        assert_eq!(events.as_array().unwrap().len(), 1);
        assert_eq!(events[0]["name"], "Test Festival 2025");
    }

    /// Log the already-registered test user back in to get a fresh cookie.
    async fn signup_cookie_reuse(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(json_post(
                "/login",
                r#"{"email":"ada@example.com","password":"s3cret"}"#,
            ))
            .await
            .unwrap();
        cookie_pair(&response).unwrap()
    }
}
