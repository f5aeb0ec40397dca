use crate::detail::DetailSource;
use crate::feed::FeedController;
use crate::page::{Action, CAMERA_STATUS_ATTR, Document, EXPORT_REPORT_ID, SharedDocument};

pub const EXPORT_PATH: &str = "/relatorios/export";
pub const OFFLINE_STATUS: &str = "offline";
pub const OFFLINE_CLASS: &str = "bg-red-200";
pub const OFFLINE_TITLE: &str = "Câmera offline";

/// Runs the page-load pass: export trigger, offline cameras, feed
/// controller. Returns whether the feed should connect.
pub fn on_document_ready<S: DetailSource>(controller: &FeedController<S>) -> bool {
    let feed_enabled = controller.init();
    let marked = {
        let mut doc = controller.document().write();
        wire_export_button(&mut doc);
        mark_offline_cameras(&mut doc)
    };
    tracing::debug!("Page ready (feed: {feed_enabled}, offline cameras: {marked})");
    controller.notify_changed();
    feed_enabled
}

pub fn wire_export_button(doc: &mut Document) -> bool {
    doc.bind_action(
        EXPORT_REPORT_ID,
        Action::Navigate {
            href: EXPORT_PATH.to_string(),
        },
    )
}

/// Highlights every camera element whose status is exactly `offline`.
pub fn mark_offline_cameras(doc: &mut Document) -> usize {
    let mut marked = 0;
    doc.for_each_with_attribute(CAMERA_STATUS_ATTR, |el| {
        if el.attr(CAMERA_STATUS_ATTR) == Some(OFFLINE_STATUS) {
            el.add_class(OFFLINE_CLASS);
            el.title = Some(OFFLINE_TITLE.to_string());
            marked += 1;
        }
    });
    marked
}

/// Activates the export trigger. Returns where the page should navigate, or
/// `None` when the page has no wired trigger.
pub fn trigger_export(document: &SharedDocument) -> Option<String> {
    match document.read().action_of(EXPORT_REPORT_ID)? {
        Action::Navigate { href } => Some(href),
        Action::Swap { .. } => None,
    }
}
