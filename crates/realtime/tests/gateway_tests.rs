use http_body_util::BodyExt;

use axum::{
    body::Body,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, CONTENT_TYPE, ORIGIN,
        },
        Method, Request, StatusCode,
    },
    Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

use grapevine_config::DatabaseConfig;
use grapevine_database::{initialize_database, CreateUserRequest, MessageKind, User};
use grapevine_notifications::{NotificationKind, NotifyRequest};
use grapevine_realtime::{build_router, AppState};

type TestResult<T = ()> = anyhow::Result<T>;

const USER_ID_HEADER: &str = "x-user-id";

struct TestContext {
    _temp_dir: TempDir,
    pool: SqlitePool,
    state: AppState,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("gateway.sqlite");

        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 2,
        };
        let pool = initialize_database(&config).await?;
        let state = AppState::new(pool.clone());

        Ok(Self {
            _temp_dir: temp_dir,
            pool,
            state,
        })
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn seed_user(&self, username: &str) -> TestResult<User> {
        let user = self
            .state
            .users()
            .create(&CreateUserRequest {
                username: username.to_string(),
                avatar_url: None,
            })
            .await?;
        Ok(user)
    }

    async fn seed_chat_with_messages(
        &self,
        sender: &User,
        receiver: &User,
        bodies: &[&str],
    ) -> TestResult<String> {
        let chat = self
            .state
            .conversations()
            .open_chat(&sender.public_id, &receiver.public_id)
            .await?;
        for body in bodies {
            self.state
                .conversations()
                .append_message(&chat.public_id, &sender.public_id, body, MessageKind::Text)
                .await?;
        }
        Ok(chat.public_id)
    }
}

fn get(uri: &str, user_id: Option<&str>) -> TestResult<Request<Body>> {
    let mut builder = Request::builder().uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header(USER_ID_HEADER, user_id);
    }
    Ok(builder.body(Body::empty())?)
}

fn post_json(uri: &str, user_id: &str, payload: &Value) -> TestResult<Request<Body>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(USER_ID_HEADER, user_id)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(payload)?))?)
}

async fn read_json(response: axum::response::Response) -> TestResult<Value> {
    let body = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&body)?)
}

mod router_tests {
    use super::*;

    #[tokio::test]
    async fn health_endpoint_responds() -> TestResult {
        let ctx = TestContext::new().await?;
        let response = ctx.router().oneshot(get("/api/health", None)?).await?;

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await?;
        assert_eq!(payload["status"], "ok");

        Ok(())
    }

    #[tokio::test]
    async fn openapi_document_is_served() -> TestResult {
        let ctx = TestContext::new().await?;
        let response = ctx
            .router()
            .oneshot(get("/docs/openapi.json", None)?)
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await?;
        assert!(payload["paths"]["/api/chats"].is_object());
        assert!(payload["paths"]["/ws"].is_object());

        Ok(())
    }

    #[tokio::test]
    async fn websocket_route_is_mounted() -> TestResult {
        let ctx = TestContext::new().await?;
        let response = ctx.router().oneshot(get("/ws", None)?).await?;

        // Rejected as a non-upgrade request, but the route exists.
        assert_ne!(response.status(), StatusCode::NOT_FOUND);

        Ok(())
    }

    #[tokio::test]
    async fn cors_preflight_allows_the_identity_header() -> TestResult {
        let ctx = TestContext::new().await?;
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/chats")
            .header(ORIGIN, "https://example.com")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(ACCESS_CONTROL_REQUEST_HEADERS, "x-user-id, content-type")
            .body(Body::empty())?;

        let response = ctx.router().oneshot(request).await?;
        let status = response.status();
        assert!(
            matches!(status, StatusCode::NO_CONTENT | StatusCode::OK),
            "expected CORS preflight to return 204 or 200, got {status}"
        );
        assert!(response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
        assert!(response
            .headers()
            .contains_key(ACCESS_CONTROL_ALLOW_METHODS));

        Ok(())
    }
}

mod identity_tests {
    use super::*;

    #[tokio::test]
    async fn requests_without_identity_are_unauthorized() -> TestResult {
        let ctx = TestContext::new().await?;
        let response = ctx.router().oneshot(get("/api/chats", None)?).await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let payload = read_json(response).await?;
        assert!(payload["error"]
            .as_str()
            .unwrap_or_default()
            .contains("x-user-id"));

        Ok(())
    }

    #[tokio::test]
    async fn unknown_callers_are_not_found() -> TestResult {
        let ctx = TestContext::new().await?;
        let response = ctx
            .router()
            .oneshot(get("/api/chats", Some("nobody"))?)
            .await?;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        Ok(())
    }
}

mod chat_api_tests {
    use super::*;

    #[tokio::test]
    async fn opening_a_chat_is_idempotent() -> TestResult {
        let ctx = TestContext::new().await?;
        let ada = ctx.seed_user("ada").await?;
        let brian = ctx.seed_user("brian").await?;

        let response = ctx
            .router()
            .oneshot(post_json(
                "/api/chats",
                &ada.public_id,
                &json!({ "peerId": brian.public_id }),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await?;
        let chat_id = payload["chat"]["id"].as_str().unwrap_or_default().to_owned();
        assert!(!chat_id.is_empty());
        assert_eq!(payload["chat"]["members"][0], ada.public_id);
        assert_eq!(payload["chat"]["members"][1], brian.public_id);

        // Opening from the other side lands in the same chat.
        let response = ctx
            .router()
            .oneshot(post_json(
                "/api/chats",
                &brian.public_id,
                &json!({ "peerId": ada.public_id }),
            )?)
            .await?;
        let payload = read_json(response).await?;
        assert_eq!(payload["chat"]["id"], chat_id);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats")
            .fetch_one(ctx.pool())
            .await?;
        assert_eq!(count.0, 1);

        Ok(())
    }

    #[tokio::test]
    async fn a_chat_with_oneself_is_rejected() -> TestResult {
        let ctx = TestContext::new().await?;
        let ada = ctx.seed_user("ada").await?;

        let response = ctx
            .router()
            .oneshot(post_json(
                "/api/chats",
                &ada.public_id,
                &json!({ "peerId": ada.public_id }),
            )?)
            .await?;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        Ok(())
    }

    #[tokio::test]
    async fn chat_list_reports_previews_and_unread_counts() -> TestResult {
        let ctx = TestContext::new().await?;
        let ada = ctx.seed_user("ada").await?;
        let brian = ctx.seed_user("brian").await?;
        let chat_id = ctx
            .seed_chat_with_messages(&brian, &ada, &["hi", "you there?"])
            .await?;

        let response = ctx
            .router()
            .oneshot(get("/api/chats", Some(&ada.public_id))?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await?;

        let chats = payload["chats"].as_array().expect("chats array");
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0]["chatId"], chat_id);
        assert_eq!(chats[0]["peerUsername"], "brian");
        assert_eq!(chats[0]["unreadCount"], 2);
        assert_eq!(chats[0]["lastMessageText"], "you there?");

        Ok(())
    }

    #[tokio::test]
    async fn history_pages_newest_first() -> TestResult {
        let ctx = TestContext::new().await?;
        let ada = ctx.seed_user("ada").await?;
        let brian = ctx.seed_user("brian").await?;
        let chat_id = ctx
            .seed_chat_with_messages(&brian, &ada, &["m0", "m1", "m2", "m3", "m4"])
            .await?;

        let response = ctx
            .router()
            .oneshot(get(
                &format!("/api/chats/{chat_id}/messages?page=1&limit=2"),
                Some(&ada.public_id),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await?;

        let messages = payload["messages"].as_array().expect("messages array");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["text"], "m4");
        assert_eq!(messages[1]["text"], "m3");
        assert_eq!(payload["hasMore"], true);

        let response = ctx
            .router()
            .oneshot(get(
                &format!("/api/chats/{chat_id}/messages?page=3&limit=2"),
                Some(&ada.public_id),
            )?)
            .await?;
        let payload = read_json(response).await?;
        assert_eq!(payload["messages"][0]["text"], "m0");
        assert_eq!(payload["hasMore"], false);

        Ok(())
    }

    #[tokio::test]
    async fn history_is_members_only() -> TestResult {
        let ctx = TestContext::new().await?;
        let ada = ctx.seed_user("ada").await?;
        let brian = ctx.seed_user("brian").await?;
        let clara = ctx.seed_user("clara").await?;
        let chat_id = ctx.seed_chat_with_messages(&brian, &ada, &["secret"]).await?;

        let response = ctx
            .router()
            .oneshot(get(
                &format!("/api/chats/{chat_id}/messages"),
                Some(&clara.public_id),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = ctx
            .router()
            .oneshot(get(
                "/api/chats/missing-chat/messages",
                Some(&ada.public_id),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        Ok(())
    }
}

mod notification_api_tests {
    use super::*;

    async fn seed_notification(
        ctx: &TestContext,
        recipient: &User,
        actor: &User,
        kind: NotificationKind,
    ) -> TestResult {
        let (post_id, message) = match kind {
            NotificationKind::Follow => (None, "started following you"),
            NotificationKind::Like => (Some("post-1".to_string()), "liked your post"),
            NotificationKind::Comment => (Some("post-1".to_string()), "commented on your post"),
        };
        ctx.state
            .notifications()
            .notify(
                &recipient.public_id,
                &actor.public_id,
                NotifyRequest {
                    kind,
                    post_id,
                    message: message.to_string(),
                    preview_image_url: None,
                },
            )
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn list_includes_unread_count_and_enrichment() -> TestResult {
        let ctx = TestContext::new().await?;
        let ada = ctx.seed_user("ada").await?;
        let brian = ctx.seed_user("brian").await?;
        seed_notification(&ctx, &ada, &brian, NotificationKind::Like).await?;
        seed_notification(&ctx, &ada, &brian, NotificationKind::Follow).await?;

        let response = ctx
            .router()
            .oneshot(get("/api/notifications", Some(&ada.public_id))?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await?;

        let notifications = payload["notifications"].as_array().expect("array");
        assert_eq!(notifications.len(), 2);
        assert_eq!(payload["unreadCount"], 2);

        // Newest first: the follow arrived last.
        assert_eq!(notifications[0]["kind"], "follow");
        assert_eq!(notifications[0]["actorUsername"], "brian");
        assert!(notifications[0]["isActorFollowingRecipient"].is_boolean());
        // Like notifications carry no relationship flags.
        assert_eq!(notifications[1]["kind"], "like");
        assert!(notifications[1].get("isActorFollowingRecipient").is_none());
        assert_eq!(notifications[1]["targetPostId"], "post-1");

        Ok(())
    }

    #[tokio::test]
    async fn marking_read_flips_everything_once() -> TestResult {
        let ctx = TestContext::new().await?;
        let ada = ctx.seed_user("ada").await?;
        let brian = ctx.seed_user("brian").await?;
        seed_notification(&ctx, &ada, &brian, NotificationKind::Like).await?;
        seed_notification(&ctx, &ada, &brian, NotificationKind::Comment).await?;

        let response = ctx
            .router()
            .oneshot(post_json(
                "/api/notifications/read",
                &ada.public_id,
                &json!({}),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await?;
        assert_eq!(payload["updated"], 2);

        let response = ctx
            .router()
            .oneshot(get("/api/notifications", Some(&ada.public_id))?)
            .await?;
        let payload = read_json(response).await?;
        assert_eq!(payload["unreadCount"], 0);
        assert_eq!(payload["notifications"][0]["isRead"], true);

        // Nothing left to flip.
        let response = ctx
            .router()
            .oneshot(post_json(
                "/api/notifications/read",
                &ada.public_id,
                &json!({}),
            )?)
            .await?;
        let payload = read_json(response).await?;
        assert_eq!(payload["updated"], 0);

        Ok(())
    }
}
