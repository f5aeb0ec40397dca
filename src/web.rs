use crate::affordances;
use crate::config::AppConfig;
use crate::detail::DetailSource;
use crate::feed::{EntryView, FeedController};
use crate::page::EVENT_IMAGE_ID;
use crate::ui;
use anyhow::Result;
use axum::extract::ws::{Message, WebSocket};
use axum::{
    Json, Router,
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
    routing::get,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState<S> {
    pub config: Arc<AppConfig>,
    pub controller: FeedController<S>,
}

pub fn router<S: DetailSource>(state: AppState<S>) -> Router {
    Router::new()
        .route("/", get(index::<S>))
        .route("/monitoramento/event/:id", get(event_detail::<S>))
        .route("/relatorios/export", get(export_report::<S>))
        .route("/api/feed", get(feed_snapshot::<S>))
        .route("/ws/feed", get(ws_feed::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<S: DetailSource>(state: AppState<S>) -> Result<()> {
    let addr: SocketAddr = state.config.http_bind.parse()?;
    let router = router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Dashboard listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(graceful_shutdown())
        .await?;

    Ok(())
}

async fn graceful_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down http server");
}

fn page_view<S: DetailSource>(state: &AppState<S>) -> ui::PageView {
    let entries = state.controller.entries();
    let doc = state.controller.document().read();
    ui::PageView::from_document(&doc, entries)
}

async fn index<S: DetailSource>(State(state): State<AppState<S>>) -> impl IntoResponse {
    Html(ui::render_page(
        &state.config.backend_origin,
        page_view(&state),
    ))
}

async fn event_detail<S: DetailSource>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.controller.activate(&id).await {
        Ok(Some(body)) => Ok(Html(body)),
        Ok(None) => Err((StatusCode::NOT_FOUND, format!("No feed entry for event {id}"))),
        Err(err) => Err((
            StatusCode::BAD_GATEWAY,
            format!("Failed to load event {id}: {err}"),
        )),
    }
}

async fn export_report<S: DetailSource>(
    State(state): State<AppState<S>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let href = affordances::trigger_export(state.controller.document())
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Export is not available".to_string()))?;
    tracing::info!("Export requested, redirecting to {href}");
    Ok(Redirect::to(&state.config.backend_url(&href)))
}

#[derive(Serialize)]
struct FeedResponse {
    enabled: bool,
    capacity: usize,
    entries: Vec<EntryView>,
}

async fn feed_snapshot<S: DetailSource>(State(state): State<AppState<S>>) -> impl IntoResponse {
    Json(FeedResponse {
        enabled: state.controller.is_active(),
        capacity: state.config.feed_capacity,
        entries: state.controller.entries(),
    })
}

async fn ws_feed<S: DetailSource>(
    State(state): State<AppState<S>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_feed(socket, state))
}

#[derive(Serialize)]
struct FeedUpdate {
    feed: String,
    detail: Option<String>,
}

fn feed_update<S: DetailSource>(state: &AppState<S>) -> FeedUpdate {
    let entries = state.controller.entries();
    let detail = state
        .controller
        .document()
        .read()
        .get(EVENT_IMAGE_ID)
        .and_then(|el| el.inner_html.clone());
    FeedUpdate {
        feed: ui::render_feed(&state.config.backend_origin, entries),
        detail,
    }
}

async fn send_update<S: DetailSource>(socket: &mut WebSocket, state: &AppState<S>) -> Result<(), ()> {
    let payload = serde_json::to_string(&feed_update(state)).map_err(|_| ())?;
    socket.send(Message::Text(payload)).await.map_err(|_| ())
}

async fn handle_ws_feed<S: DetailSource>(mut socket: WebSocket, state: AppState<S>) {
    let mut rx = state.controller.subscribe();
    if send_update(&mut socket, &state).await.is_err() {
        return;
    }
    loop {
        match rx.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => {
                if send_update(&mut socket, &state).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affordances::{EXPORT_PATH, on_document_ready};
    use crate::cameras::monitoring_body;
    use crate::config::DEFAULT_TIMESTAMP_FORMAT;
    use crate::feed::FeedSettings;
    use crate::feed::tests::StubSource;
    use crate::page::{Document, SharedDocument};
    use crate::reconnect::ReconnectPolicy;
    use futures_util::StreamExt;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message as ClientMessage;

    fn state(source: StubSource) -> AppState<StubSource> {
        let config = AppConfig {
            backend_origin: "http://backend.local".into(),
            http_bind: "127.0.0.1:0".into(),
            feed_capacity: 50,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.into(),
            reconnect: ReconnectPolicy::default(),
            detail_timeout: Duration::from_secs(1),
        };
        let controller = FeedController::new(
            SharedDocument::new(Document::new(monitoring_body(&[]))),
            source,
            FeedSettings {
                capacity: 50,
                timestamp_format: DEFAULT_TIMESTAMP_FORMAT.into(),
            },
        );
        on_document_ready(&controller);
        AppState {
            config: Arc::new(config),
            controller,
        }
    }

    async fn spawn(state: AppState<StubSource>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn no_redirects() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn index_renders_feed() {
        let state = state(StubSource::default());
        state
            .controller
            .handle_message(r#"{"kind":"event","data":{"id":5,"camera_id":2}}"#);
        let addr = spawn(state).await;

        let body = reqwest::get(format!("http://{addr}/"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("id=\"events-list\""));
        assert!(body.contains("data-event-id=\"5\""));
        assert!(body.contains(" - Câmera 2"));
    }

    #[tokio::test]
    async fn detail_route_activates_entry() {
        let source = StubSource::default();
        let state = state(source.clone());
        state
            .controller
            .handle_message(r#"{"kind":"event","data":{"id":42,"camera_id":2}}"#);
        let controller = state.controller.clone();
        let addr = spawn(state).await;

        let res = reqwest::get(format!("http://{addr}/monitoramento/event/42"))
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        assert_eq!(res.text().await.unwrap(), "<img src=\"/monitoramento/event/42.jpg\">");
        assert_eq!(source.calls.lock().unwrap().len(), 1);
        assert!(
            controller
                .document()
                .read()
                .get(EVENT_IMAGE_ID)
                .unwrap()
                .inner_html
                .is_some()
        );

        let missing = reqwest::get(format!("http://{addr}/monitoramento/event/7"))
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
        assert_eq!(source.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn detail_failure_is_bad_gateway() {
        let state = state(StubSource {
            fail: true,
            ..StubSource::default()
        });
        state
            .controller
            .handle_message(r#"{"kind":"event","data":{"id":1,"camera_id":2}}"#);
        let addr = spawn(state).await;
        let res = reqwest::get(format!("http://{addr}/monitoramento/event/1"))
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn export_redirects_to_backend() {
        let addr = spawn(state(StubSource::default())).await;
        let res = no_redirects()
            .get(format!("http://{addr}/relatorios/export"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers()["location"],
            format!("http://backend.local{EXPORT_PATH}").as_str()
        );
    }

    #[tokio::test]
    async fn feed_snapshot_is_json() {
        let state = state(StubSource::default());
        for id in 0..3 {
            state.controller.handle_message(
                &serde_json::json!({"kind": "event", "data": {"id": id, "camera_id": 1}}).to_string(),
            );
        }
        let addr = spawn(state).await;
        let body: serde_json::Value = reqwest::get(format!("http://{addr}/api/feed"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["enabled"], true);
        assert_eq!(body["capacity"], 50);
        let ids: Vec<_> = body["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["event_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["2", "1", "0"]);
    }

    #[tokio::test]
    async fn dashboard_socket_pushes_feed_changes() {
        let state = state(StubSource::default());
        let controller = state.controller.clone();
        let addr = spawn(state).await;

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/feed"))
            .await
            .unwrap();
        let first = ws.next().await.unwrap().unwrap();
        assert!(matches!(first, ClientMessage::Text(_)));

        controller.handle_message(r#"{"kind":"event","data":{"id":77,"camera_id":3}}"#);
        let update = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let ClientMessage::Text(text) = update else {
            panic!("expected a text update");
        };
        let update: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(update["feed"].as_str().unwrap().contains("data-event-id=\"77\""));
        assert!(update["detail"].is_null());
    }
}
