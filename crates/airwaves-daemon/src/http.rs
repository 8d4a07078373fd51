use airwaves_core::{PluginHandle, UiSnapshot};
use airwaves_proto::protocol::{Broadcast, CustomStationFields, UiCommand};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct ApiError {
    error: String,
}

pub fn start_server(
    bind_address: String,
    port: u16,
    handle: PluginHandle,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(handle);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

pub fn router(handle: PluginHandle) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/events", get(events))
        .route("/api/open", post(open))
        .route("/api/close", post(close))
        .route("/api/home", post(home))
        .route("/api/back", post(back))
        .route("/api/add", post(show_add))
        .route("/api/region/:id", post(open_region))
        .route("/api/country/:code", post(open_country))
        .route("/api/tag/:name", post(open_tag))
        .route("/api/search", post(search))
        .route("/api/favorites/:id", post(toggle_favorite))
        .route("/api/play/:id", post(play))
        .route("/api/custom", post(add_custom))
        .route("/api/custom/:id", delete(delete_custom))
        .layer(CorsLayer::permissive())
        .with_state(handle)
}

async fn get_state(State(handle): State<PluginHandle>) -> Json<UiSnapshot> {
    Json(handle.snapshot())
}

/// Toasts and forwarded log lines as server-sent events.
async fn events(
    State(handle): State<PluginHandle>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = stream::unfold(handle.subscribe(), |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(msg) => return Some((broadcast_event(&msg), rx)),
                // Not warn!: WARN lines are themselves broadcast.
                Err(RecvError::Lagged(n)) => debug!("http: events listener skipped {} message(s)", n),
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn broadcast_event(msg: &Broadcast) -> Result<Event, axum::Error> {
    let name = match msg {
        Broadcast::Toast { .. } => "toast",
        Broadcast::Log { .. } => "log",
    };
    Event::default().event(name).json_data(msg)
}

async fn dispatch(handle: &PluginHandle, cmd: UiCommand) -> StatusCode {
    if handle.send(cmd).await {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn open(State(handle): State<PluginHandle>) -> StatusCode {
    dispatch(&handle, UiCommand::Open).await
}

async fn close(State(handle): State<PluginHandle>) -> StatusCode {
    dispatch(&handle, UiCommand::Close).await
}

async fn home(State(handle): State<PluginHandle>) -> StatusCode {
    dispatch(&handle, UiCommand::Home).await
}

async fn back(State(handle): State<PluginHandle>) -> StatusCode {
    dispatch(&handle, UiCommand::Back).await
}

async fn show_add(State(handle): State<PluginHandle>) -> StatusCode {
    dispatch(&handle, UiCommand::ShowAddStation).await
}

async fn open_region(State(handle): State<PluginHandle>, Path(id): Path<String>) -> StatusCode {
    dispatch(&handle, UiCommand::OpenRegion { id }).await
}

async fn open_country(State(handle): State<PluginHandle>, Path(code): Path<String>) -> StatusCode {
    dispatch(&handle, UiCommand::OpenCountry { code, name: None }).await
}

async fn open_tag(State(handle): State<PluginHandle>, Path(name): Path<String>) -> StatusCode {
    dispatch(&handle, UiCommand::OpenTag { name }).await
}

async fn search(
    State(handle): State<PluginHandle>,
    Query(params): Query<SearchParams>,
) -> StatusCode {
    dispatch(&handle, UiCommand::SearchInput { text: params.q }).await
}

async fn toggle_favorite(State(handle): State<PluginHandle>, Path(id): Path<String>) -> StatusCode {
    dispatch(&handle, UiCommand::ToggleFavorite { id }).await
}

async fn play(State(handle): State<PluginHandle>, Path(id): Path<String>) -> StatusCode {
    dispatch(&handle, UiCommand::Play { id }).await
}

async fn add_custom(
    State(handle): State<PluginHandle>,
    Json(fields): Json<CustomStationFields>,
) -> Response {
    match handle.add_custom_station(fields).await {
        Some(Ok(station)) => (StatusCode::CREATED, Json(station)).into_response(),
        Some(Err(e)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError {
                error: e.to_string(),
            }),
        )
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn delete_custom(State(handle): State<PluginHandle>, Path(id): Path<String>) -> StatusCode {
    dispatch(&handle, UiCommand::DeleteCustomStation { id }).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use airwaves_core::host::HostApi;
    use airwaves_core::PluginCore;
    use airwaves_proto::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use futures_util::StreamExt;
    use std::time::Duration;
    use tokio::sync::{broadcast, mpsc};
    use tower::ServiceExt;

    async fn app() -> (Router, PluginHandle) {
        let mut config = Config::default();
        config.directory.mirrors.clear();
        let (event_tx, event_rx) = mpsc::channel(16);
        let (broadcast_tx, _) = broadcast::channel(16);
        let core = PluginCore::init(&config, HostApi::default(), broadcast_tx, event_tx)
            .await
            .unwrap();
        let handle = core.handle();
        tokio::spawn(core.run(event_rx));
        (router(handle.clone()), handle)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_state_is_json_snapshot() {
        let (app, _) = app().await;
        let resp = app
            .oneshot(Request::get("/api/state").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["isOpen"], false);
        assert_eq!(value["view"]["kind"], "home");
        assert_eq!(value["header"]["showBack"], false);
    }

    #[tokio::test]
    async fn test_add_custom_created_and_rejected() {
        let (app, handle) = app().await;

        let resp = app
            .clone()
            .oneshot(post_json("/api/custom", r#"{"name":"","url":"https://x.example"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Please enter a station name.");

        let resp = app
            .oneshot(post_json(
                "/api/custom",
                r#"{"name":"Mine","url":"https://x.example/live"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(handle.snapshot().custom.len(), 1);
    }

    #[tokio::test]
    async fn test_commands_are_accepted() {
        let (app, handle) = app().await;
        let resp = app
            .oneshot(Request::post("/api/open").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let mut rx = handle.watch();
        let open = rx.wait_for(|s| s.is_open).await.unwrap().is_open;
        assert!(open);
    }

    #[tokio::test]
    async fn test_events_stream_carries_toasts() {
        let (app, handle) = app().await;
        let resp = app
            .oneshot(Request::get("/api/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "text/event-stream");

        let fields = CustomStationFields {
            name: "Mine".into(),
            url: "https://x.example/live".into(),
            genre: None,
            country: None,
        };
        assert!(matches!(handle.add_custom_station(fields).await, Some(Ok(_))));

        let mut body = resp.into_body().into_data_stream();
        let mut received = String::new();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !received.contains("Added: Mine") {
                let chunk = body.next().await.unwrap().unwrap();
                received.push_str(&String::from_utf8_lossy(&chunk));
            }
        })
        .await
        .unwrap();
        assert!(received.contains("event: toast"), "{}", received);
        assert!(received.contains(r#""is_error":false"#), "{}", received);
    }
}
