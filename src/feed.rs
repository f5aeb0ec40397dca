use crate::detail::DetailSource;
use crate::envelope::{Envelope, Event, FeedId, format_timestamp};
use crate::page::{Action, EVENT_IMAGE_ID, EVENTS_LIST_ID, Element, SharedDocument};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

const ENTRY_CLASSES: &[&str] = &[
    "feed-entry",
    "border",
    "p-2",
    "mb-2",
    "bg-white",
    "shadow-sm",
    "rounded",
];

pub const EVENT_ID_ATTR: &str = "data-event-id";
pub const PPE_STATUS_ATTR: &str = "data-ppe-status";
pub const THUMB_ATTR: &str = "data-thumb";

pub fn detail_path(id: &FeedId) -> String {
    format!("/monitoramento/event/{id}")
}

#[derive(Clone, Debug)]
pub struct FeedSettings {
    pub capacity: usize,
    pub timestamp_format: String,
}

/// Rendered entry as seen from outside the page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntryView {
    pub event_id: String,
    pub label: String,
    pub href: String,
    pub class: String,
    pub ppe_status: Option<String>,
    pub thumb: Option<String>,
    pub summary: Option<String>,
}

impl EntryView {
    fn from_element(el: &Element) -> Self {
        Self {
            event_id: el.attr(EVENT_ID_ATTR).unwrap_or_default().to_string(),
            label: el.text.clone(),
            href: el.attr("href").unwrap_or_default().to_string(),
            class: el.classes.join(" "),
            ppe_status: el.attr(PPE_STATUS_ATTR).map(str::to_string),
            thumb: el.attr(THUMB_ATTR).map(str::to_string),
            summary: el.title.clone(),
        }
    }
}

/// Keeps the `events-list` element in sync with the event feed.
///
/// Clones share the same document, settings and activity flag, so the feed
/// task and the dashboard handlers can each hold one.
#[derive(Clone)]
pub struct FeedController<S> {
    document: SharedDocument,
    source: S,
    settings: Arc<FeedSettings>,
    active: Arc<AtomicBool>,
    changes: broadcast::Sender<()>,
}

impl<S: DetailSource> FeedController<S> {
    pub fn new(document: SharedDocument, source: S, settings: FeedSettings) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            document,
            source,
            settings: Arc::new(settings),
            active: Arc::new(AtomicBool::new(false)),
            changes,
        }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Notified after every change to the feed or the detail container.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    pub fn notify_changed(&self) {
        let _ = self.changes.send(());
    }

    /// Enables the feed when the page has a feed container. Returns whether
    /// a feed connection should be opened for this page load.
    pub fn init(&self) -> bool {
        let present = self.document.read().has_element(EVENTS_LIST_ID);
        self.active.store(present, Ordering::SeqCst);
        present
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Handles one text frame from the feed. Anything that does not decode
    /// is dropped.
    pub fn handle_message(&self, text: &str) -> bool {
        match Envelope::parse(text) {
            Ok(envelope) => self.handle_envelope(envelope),
            Err(err) => {
                tracing::debug!("Dropping feed message: {err}");
                false
            }
        }
    }

    pub fn handle_envelope(&self, envelope: Envelope) -> bool {
        if !self.is_active() {
            return false;
        }
        let event = match envelope {
            Envelope::Event(event) => event,
            Envelope::Unknown(kind) => {
                tracing::debug!("Ignoring feed message of kind {kind:?}");
                return false;
            }
        };

        let entry = self.render_entry(&event);
        {
            let mut doc = self.document.write();
            if !doc.prepend_child(EVENTS_LIST_ID, entry) {
                return false;
            }
            while doc.child_count(EVENTS_LIST_ID) > self.settings.capacity {
                doc.remove_last_child(EVENTS_LIST_ID);
            }
        }
        self.notify_changed();
        true
    }

    pub fn render_entry(&self, event: &Event) -> Element {
        let timestamp = format_timestamp(event.ts.as_ref(), &self.settings.timestamp_format);
        let href = detail_path(&event.id);

        let mut entry = Element::new("a")
            .with_attr("href", href.clone())
            .with_attr(EVENT_ID_ATTR, event.id.to_string())
            .with_text(format!("{timestamp} - Câmera {}", event.camera_id))
            .with_action(Action::Swap {
                get: href,
                target: EVENT_IMAGE_ID.to_string(),
            });
        for class in ENTRY_CLASSES {
            entry.add_class(class);
        }
        entry.title = event.summary.clone();
        if let Some(status) = &event.ppe_status {
            entry = entry.with_attr(PPE_STATUS_ATTR, status.clone());
        }
        if let Some(thumb) = &event.thumb_path {
            entry = entry.with_attr(THUMB_ATTR, format!("/{}", thumb.trim_start_matches('/')));
        }
        entry
    }

    /// Entries currently shown, newest first.
    pub fn entries(&self) -> Vec<EntryView> {
        self.document
            .read()
            .children(EVENTS_LIST_ID)
            .map(EntryView::from_element)
            .collect()
    }

    /// Activates the newest entry for `event_id`: retrieves its detail and
    /// replaces the detail container with it. Returns `None` when no entry
    /// carries that id, or when the page reloaded while the detail was in
    /// flight.
    pub async fn activate(&self, event_id: &str) -> Result<Option<String>> {
        let (action, load) = {
            let doc = self.document.read();
            let action = doc
                .children(EVENTS_LIST_ID)
                .find(|el| el.attr(EVENT_ID_ATTR) == Some(event_id))
                .and_then(|el| el.action.clone());
            (action, doc.loads())
        };
        let Some(Action::Swap { get, target }) = action else {
            return Ok(None);
        };

        let body = match self.source.fetch(&get).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!("Failed to load event detail {get}: {err:#}");
                return Err(err);
            }
        };
        {
            let mut doc = self.document.write();
            if doc.loads() != load {
                tracing::debug!("Discarding event detail {get}: page reloaded");
                return Ok(None);
            }
            doc.set_inner_html(&target, body.clone());
        }
        self.notify_changed();
        Ok(Some(body))
    }
}
