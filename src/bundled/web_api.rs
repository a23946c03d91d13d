//! JSON endpoints for inspecting and nudging a running agent.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use reverie_core::{error::ReverieError, traits::Api, traits::Plugin};
use reverie_plugins::HostContext;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

type ApiError = (StatusCode, Json<Value>);

pub struct WebApi {
    name: String,
    ctx: HostContext,
}

impl WebApi {
    pub fn new(ctx: HostContext, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ctx,
        }
    }

    pub fn create(ctx: &HostContext, name: &str) -> Result<Arc<dyn Plugin>, ReverieError> {
        Ok(Arc::new(Self::new(ctx.clone(), name)))
    }
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    message: String,
    room_id: String,
    user_id: Option<String>,
}

fn api_error(e: ReverieError) -> ApiError {
    let status = match e {
        ReverieError::NoCapablePlugin(_) | ReverieError::HostUnavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::BAD_GATEWAY,
    };
    warn!("web api: {e}");
    (status, Json(json!({"error": e.to_string()})))
}

/// `GET /api/plugins`
async fn plugins(State(ctx): State<HostContext>) -> Result<Json<Value>, ApiError> {
    let host = ctx.host().map_err(api_error)?;
    let list: Vec<Value> = host
        .registry()
        .iter()
        .map(|p| {
            let capabilities: Vec<&str> = p.capabilities.iter().map(|c| c.as_str()).collect();
            json!({
                "id": p.id,
                "type": p.plugin_type,
                "name": p.name,
                "capabilities": capabilities,
            })
        })
        .collect();
    Ok(Json(json!({ "plugins": list })))
}

/// `GET /api/schedule`
async fn schedule(State(ctx): State<HostContext>) -> Json<Value> {
    let scheduler = ctx.scheduler();
    Json(json!({
        "schedule": scheduler.schedule(),
        "fired": scheduler.fired_schedule(),
        "phase": scheduler.phase(),
        "dreaming": scheduler.is_dreaming(),
    }))
}

/// `GET /api/rooms`
async fn rooms(State(ctx): State<HostContext>) -> Result<Json<Value>, ApiError> {
    let host = ctx.host().map_err(api_error)?;
    let list = host.get_rooms_list().await.map_err(api_error)?;
    Ok(Json(json!(list)))
}

/// `POST /api/messages`
async fn send(
    State(ctx): State<HostContext>,
    Json(req): Json<SendRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.message.trim().is_empty() || req.room_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "message and room_id are required"})),
        ));
    }
    let host = ctx.host().map_err(api_error)?;
    info!("web api: sending message to {}", req.room_id);
    let resp = host
        .send_message(&req.message, &req.room_id, req.user_id.as_deref())
        .await
        .map_err(api_error)?;
    Ok(Json(json!(resp)))
}

impl Api for WebApi {
    fn routes(&self) -> Router {
        info!("{}: serving /api/plugins, /api/schedule, /api/rooms, /api/messages", self.name);
        Router::new()
            .route("/api/plugins", get(plugins))
            .route("/api/schedule", get(schedule))
            .route("/api/rooms", get(rooms))
            .route("/api/messages", post(send))
            .with_state(self.ctx.clone())
    }
}

impl Plugin for WebApi {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_api(&self) -> Option<&dyn Api> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use reverie_core::{config::Config, message::SendMessageResponse, traits::SendMessage};
    use reverie_plugins::{PluginHost, PluginRegistry, WakeScheduler};
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(String, String, Option<String>)>>,
    }

    #[async_trait]
    impl SendMessage for Outbox {
        async fn send_message(
            &self,
            text: &str,
            room_id: &str,
            user_id: Option<&str>,
        ) -> Result<SendMessageResponse, ReverieError> {
            self.sent.lock().unwrap().push((
                text.to_string(),
                room_id.to_string(),
                user_id.map(str::to_string),
            ));
            Ok(SendMessageResponse::sent())
        }
    }

    impl Plugin for Outbox {
        fn name(&self) -> &str {
            "outbox"
        }

        fn as_send_message(&self) -> Option<&dyn SendMessage> {
            Some(self)
        }
    }

    struct Fixture {
        router: Router,
        outbox: Arc<Outbox>,
        _host: Arc<PluginHost>,
    }

    fn fixture() -> Fixture {
        let config = Config::default();
        let scheduler = Arc::new(WakeScheduler::from_config(&config.agent));
        let ctx = HostContext::new(Arc::new(config), scheduler, true);
        let outbox = Arc::new(Outbox::default());

        let mut registry = PluginRegistry::new();
        registry
            .register("user_interfaces", "web_api", Arc::new(WebApi::new(ctx.clone(), "web_api")))
            .unwrap();
        registry.register("chat_interfaces", "outbox", outbox.clone()).unwrap();
        let host = Arc::new(PluginHost::new(registry));
        ctx.bind_host(&host);

        Fixture {
            router: host.mount_routes(Router::new()),
            outbox,
            _host: host,
        }
    }

    async fn call(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_plugins_lists_capabilities() {
        let fx = fixture();
        let (status, json) = call(&fx.router, get_req("/api/plugins")).await;
        assert_eq!(status, StatusCode::OK);
        let plugins = json["plugins"].as_array().unwrap();
        assert_eq!(plugins.len(), 2);
        assert_eq!(plugins[0]["id"], "user_interfaces_web_api");
        assert_eq!(plugins[1]["type"], "chat_interfaces");
        assert_eq!(plugins[1]["capabilities"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_schedule_reports_boot_state() {
        let fx = fixture();
        let (status, json) = call(&fx.router, get_req("/api/schedule")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["schedule"]["kind"], "planned");
        assert_eq!(json["phase"], "waking");
        assert_eq!(json["dreaming"], false);
        assert!(json["fired"].is_null());
    }

    #[tokio::test]
    async fn test_send_message_goes_to_chat_backend() {
        let fx = fixture();
        let body = json!({"message": "hello", "room_id": "!lobby:example.org"});
        let (status, json) = call(&fx.router, post_json("/api/messages", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(
            *fx.outbox.sent.lock().unwrap(),
            vec![("hello".to_string(), "!lobby:example.org".to_string(), None)]
        );
    }

    #[tokio::test]
    async fn test_send_message_requires_fields() {
        let fx = fixture();
        let body = json!({"message": "  ", "room_id": "!lobby:example.org"});
        let (status, _) = call(&fx.router, post_json("/api/messages", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(fx.outbox.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rooms_without_backend_is_unavailable() {
        let fx = fixture();
        let (status, json) = call(&fx.router, get_req("/api/rooms")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json["error"].as_str().unwrap().contains("no plugin implements"));
    }
}
