use crate::affordances;
use crate::cameras::{load_cameras, monitoring_body};
use crate::detail::DetailSource;
use crate::feed::FeedController;
use crate::reconnect::{CloseOutcome, ReconnectSchedule};
use anyhow::{Result, bail};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

pub const FEED_PATH: &str = "/ws/events";

/// Feed endpoint for a backend origin: `https` maps to `wss`, `http` to `ws`.
pub fn feed_url(origin: &str) -> Result<String> {
    let (scheme, rest) = if let Some(rest) = origin.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = origin.strip_prefix("http://") {
        ("ws", rest)
    } else {
        bail!("Unsupported backend origin {origin}, expected http:// or https://");
    };
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        bail!("Backend origin {origin} has no host");
    }
    Ok(format!("{scheme}://{host}{FEED_PATH}"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The connection opened and later closed or errored.
    Closed,
    /// The connection never opened.
    Failed,
}

/// One connection lifetime: every text frame goes to the controller, in
/// arrival order.
pub async fn run_session<S: DetailSource>(
    url: &str,
    controller: &FeedController<S>,
    schedule: &mut ReconnectSchedule,
) -> SessionEnd {
    let mut stream = match tokio_tungstenite::connect_async(url).await {
        Ok((stream, _response)) => stream,
        Err(err) => {
            tracing::warn!("Failed to connect to event feed {url}: {err}");
            return SessionEnd::Failed;
        }
    };
    tracing::info!("Connected to event feed {url}");
    schedule.on_open();

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                controller.handle_message(&text);
            }
            Ok(Message::Ping(data)) => {
                let _ = stream.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!("Event feed error: {err}");
                break;
            }
        }
    }
    SessionEnd::Closed
}

/// Page reload: camera registry read again, body restored to its load-time
/// state, page-load pass rerun.
pub async fn reload_page<S: DetailSource>(controller: &FeedController<S>) -> bool {
    let cameras = load_cameras(controller.source()).await;
    {
        let mut doc = controller.document().write();
        doc.set_template(monitoring_body(&cameras));
        doc.reload();
        tracing::info!("Page reloaded (load #{})", doc.loads());
    }
    affordances::on_document_ready(controller)
}

/// Keeps the feed connected for as long as the page has a feed container,
/// reloading the page after every close as the schedule dictates.
pub async fn run_feed<S: DetailSource>(
    url: String,
    controller: FeedController<S>,
    mut schedule: ReconnectSchedule,
) {
    loop {
        if !controller.is_active() {
            tracing::info!("Page has no event feed container; feed disabled");
            return;
        }

        run_session(&url, &controller, &mut schedule).await;

        match schedule.on_close() {
            CloseOutcome::Scheduled(delay) => {
                tracing::warn!("Event feed connection closed. Reloading in {delay:?}...");
                tokio::time::sleep(delay).await;
                schedule.on_reload();
                reload_page(&controller).await;
            }
            CloseOutcome::AlreadyPending => {
                let delay = schedule.base_delay();
                tracing::debug!("Reload already pending; running it in {delay:?}");
                tokio::time::sleep(delay).await;
                schedule.on_reload();
                reload_page(&controller).await;
            }
            CloseOutcome::GaveUp => {
                tracing::error!("Event feed retry limit reached; staying disconnected");
                return;
            }
        }
    }
}
