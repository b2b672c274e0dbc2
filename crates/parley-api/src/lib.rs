pub mod error;
pub mod messages;
pub mod middleware;
pub mod presence;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::get,
};

pub use state::{AppState, AppStateInner};

/// REST routes: `/health` is open, everything else needs a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(presence::health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/conversations", get(messages::list_conversations))
        .route(
            "/conversations/{peer_id}/messages",
            get(messages::get_conversation).post(messages::send_direct_message),
        )
        .route("/presence", get(presence::get_presence))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use parley_db::Database;
    use parley_gateway::{Hub, HubSettings};
    use parley_types::api::Claims;
    use parley_types::models::UserId;

    use super::*;

    const SECRET: &str = "test-secret";

    fn app() -> (Router, AppState) {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: SECRET.into(),
            hub: Hub::new(HubSettings::default()),
        });
        (router(state.clone()), state)
    }

    fn bearer(user: &str) -> String {
        let claims = Claims {
            sub: UserId::parse(user).unwrap(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        format!("Bearer {}", token)
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post(user: &str, uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::AUTHORIZATION, bearer(user))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(user: &str, uri: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::AUTHORIZATION, bearer(user))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let (app, _) = app();
        let req = Request::get("/conversations").body(Body::empty()).unwrap();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "unauthorized"}));
    }

    #[tokio::test]
    async fn send_then_read_conversation() {
        let (app, _) = app();

        let (status, sent) = call(
            &app,
            post("alice", "/conversations/bob/messages", json!({"content": "hi bob"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sent["sender_id"], "alice");
        assert_eq!(sent["recipient_id"], "bob");
        assert_eq!(sent["kind"], "text");

        let (status, page) = call(&app, get("bob", "/conversations/alice/messages")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page.as_array().unwrap().len(), 1);
        assert_eq!(page[0]["content"], "hi bob");
        assert_eq!(page[0]["id"], sent["id"]);

        let (status, list) = call(&app, get("bob", "/conversations")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["peer_id"], "alice");
        assert_eq!(list[0]["last_message"]["content"], "hi bob");
    }

    #[tokio::test]
    async fn invalid_messages_are_rejected() {
        let (app, _) = app();

        let (status, body) = call(
            &app,
            post("alice", "/conversations/alice/messages", json!({"content": "me"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "cannot message yourself");

        let (status, _) = call(
            &app,
            post("alice", "/conversations/bob/messages", json!({"content": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let long = "x".repeat(messages::MAX_CONTENT_CHARS + 1);
        let (status, _) = call(
            &app,
            post("alice", "/conversations/bob/messages", json!({"content": long})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn history_pages_with_timestamp_and_id() {
        let (app, _) = app();
        for content in ["one", "two", "three"] {
            let (status, _) = call(
                &app,
                post("alice", "/conversations/bob/messages", json!({"content": content})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, page) = call(&app, get("bob", "/conversations/alice/messages?limit=2")).await;
        assert_eq!(page.as_array().unwrap().len(), 2);
        let oldest = &page[1];

        let uri = format!(
            "/conversations/alice/messages?before={}&before_id={}",
            oldest["created_at"].as_str().unwrap().replace('+', "%2B"),
            oldest["id"].as_str().unwrap()
        );
        let (status, rest) = call(&app, get("bob", &uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rest.as_array().unwrap().len(), 1);
        assert_ne!(rest[0]["id"], page[0]["id"]);
        assert_ne!(rest[0]["id"], page[1]["id"]);

        let uri = format!("/conversations/alice/messages?before_id={}", oldest["id"].as_str().unwrap());
        let (status, body) = call(&app, get("bob", &uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "before_id requires before");
    }

    #[tokio::test]
    async fn presence_reflects_registry() {
        let (app, state) = app();
        let (_, _rx) = state.hub.registry().register(UserId::parse("carol").unwrap()).await;

        let (status, body) = call(&app, get("alice", "/presence")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"online": ["carol"]}));

        let req = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connections"], 1);
    }
}
