use crate::feed::EntryView;
use crate::page::{CAMERA_STATUS_ATTR, Document, EVENT_IMAGE_ID, EVENTS_LIST_ID, EXPORT_REPORT_ID};
use dioxus::core::NoOpMutations;
use dioxus::prelude::*;

#[derive(Clone, Debug, PartialEq)]
pub struct CameraView {
    pub name: String,
    pub status: String,
    pub class: String,
    pub title: Option<String>,
}

/// What the dashboard shows, read out of the document in one pass.
#[derive(Clone, Debug, PartialEq)]
pub struct PageView {
    pub export: bool,
    pub cameras: Vec<CameraView>,
    pub feed: Option<Vec<EntryView>>,
    pub detail_html: Option<String>,
    pub detail_text: String,
}

impl PageView {
    pub fn from_document(doc: &Document, entries: Vec<EntryView>) -> Self {
        let cameras = doc
            .with_attribute(CAMERA_STATUS_ATTR)
            .into_iter()
            .map(|el| {
                let mut class = String::from("camera-tile");
                for extra in el.classes.iter().filter(|c| c.as_str() != "camera-tile") {
                    class.push(' ');
                    class.push_str(extra);
                }
                CameraView {
                    name: el.text.clone(),
                    status: el.attr(CAMERA_STATUS_ATTR).unwrap_or_default().to_string(),
                    class,
                    title: el.title.clone(),
                }
            })
            .collect();
        let detail = doc.get(EVENT_IMAGE_ID);
        Self {
            export: doc.has_element(EXPORT_REPORT_ID),
            cameras,
            feed: doc.has_element(EVENTS_LIST_ID).then_some(entries),
            detail_html: detail.and_then(|el| el.inner_html.clone()),
            detail_text: detail.map(|el| el.text.clone()).unwrap_or_default(),
        }
    }
}

#[derive(Props, Clone, PartialEq)]
pub struct AppProps {
    pub backend_origin: String,
    pub view: PageView,
}

pub fn render_page(backend_origin: &str, view: PageView) -> String {
    let mut app = VirtualDom::new_with_props(
        App,
        AppProps {
            backend_origin: backend_origin.to_string(),
            view,
        },
    );
    let mut noop = NoOpMutations {};
    let _ = app.rebuild(&mut noop);
    dioxus_ssr::render(&mut app)
}

/// Just the `events-list` element, for live updates.
pub fn render_feed(backend_origin: &str, entries: Vec<EntryView>) -> String {
    let mut app = VirtualDom::new_with_props(
        FeedList,
        FeedListProps {
            backend_origin: backend_origin.to_string(),
            entries,
        },
    );
    let mut noop = NoOpMutations {};
    let _ = app.rebuild(&mut noop);
    dioxus_ssr::render(&mut app)
}

#[component]
fn FeedList(backend_origin: String, entries: Vec<EntryView>) -> Element {
    rsx! {
        div { id: EVENTS_LIST_ID, class: "feed",
            for (index, entry) in entries.iter().enumerate() {
                a {
                    key: "{index}",
                    class: "{entry.class}",
                    href: "{entry.href}",
                    "data-event-id": "{entry.event_id}",
                    "data-ppe-status": entry.ppe_status.clone(),
                    title: entry.summary.clone(),
                    if let Some(thumb) = &entry.thumb {
                        img { class: "thumb", alt: "thumb", src: "{backend_origin}{thumb}" }
                    }
                    span { class: "label", "{entry.label}" }
                }
            }
        }
    }
}

#[component]
fn App(props: AppProps) -> Element {
    let view = &props.view;
    rsx! {
        div { class: "page",
            meta { name: "viewport", content: "width=device-width, initial-scale=1" }
            div { class: "shell",
                div { class: "header",
                    h1 { class: "title", "PPE Local" }
                    p { class: "subtitle", "Monitoramento de EPI em tempo real" }
                    div { class: "tag", "Backend {props.backend_origin}" }
                }
                if view.export {
                    button { id: EXPORT_REPORT_ID, class: "nav-btn", "Exportar relatório" }
                }
                div { class: "card",
                    h2 { class: "card-title", "Câmeras" }
                    div { class: "camera-grid",
                        for (index, camera) in view.cameras.iter().enumerate() {
                            div {
                                key: "{index}",
                                class: "{camera.class}",
                                "data-camera-status": "{camera.status}",
                                title: camera.title.clone(),
                                "{camera.name}"
                            }
                        }
                    }
                }
                div { class: "columns",
                    if let Some(entries) = &view.feed {
                        div { class: "card",
                            h2 { class: "card-title", "Eventos" }
                            FeedList {
                                backend_origin: props.backend_origin.clone(),
                                entries: entries.clone(),
                            }
                        }
                    }
                    div { class: "card",
                        h2 { class: "card-title", "Detalhe" }
                        if let Some(html) = &view.detail_html {
                            div { id: EVENT_IMAGE_ID, class: "detail", dangerous_inner_html: "{html}" }
                        } else {
                            div { id: EVENT_IMAGE_ID, class: "detail", "{view.detail_text}" }
                        }
                    }
                }
            }
        }
        style { dangerous_inner_html: STYLES }
        script { dangerous_inner_html: SCRIPT }
    }
}

const STYLES: &str = r#"
* { box-sizing: border-box; }
body, html { margin: 0; padding: 0; background: #0b0d13; }
.page { min-height: 100vh; display: flex; justify-content: center; padding: 32px 16px; color: #e9ecf5; font-family: "Inter", system-ui, sans-serif; }
.shell { width: min(1100px, 100%); display: flex; flex-direction: column; gap: 12px; }
.header { display: flex; flex-direction: column; gap: 6px; }
.title { font-size: 26px; margin: 0; }
.subtitle { margin: 0; color: #9aa4bc; font-size: 15px; }
.tag { width: fit-content; padding: 6px 12px; border-radius: 999px; background: #10131c; border: 1px solid #1f2431; color: #c5cee3; font-size: 13px; }
.nav-btn { width: fit-content; padding: 10px 14px; border-radius: 12px; border: 1px solid #1f2230; background: #11131b; color: #c5cee3; font-weight: 700; cursor: pointer; }
.card { background: #12151d; border: 1px solid #1f2230; border-radius: 16px; padding: 18px; }
.card-title { margin: 0 0 10px 0; font-size: 18px; }
.camera-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(160px, 1fr)); gap: 8px; }
.camera-tile { padding: 10px; border-radius: 10px; background: #10141d; border: 1px solid #1f2230; }
.columns { display: grid; grid-template-columns: repeat(auto-fit, minmax(320px, 1fr)); gap: 12px; }
.feed { display: flex; flex-direction: column; max-height: 70vh; overflow-y: auto; }
.feed-entry { display: flex; align-items: center; gap: 10px; color: #0b0d13; text-decoration: none; }
.thumb { width: 64px; height: 64px; object-fit: cover; border-radius: 6px; }
.detail img { max-width: 100%; border-radius: 10px; }
.border { border: 1px solid #d6dae4; }
.p-2 { padding: 8px; }
.mb-2 { margin-bottom: 8px; }
.bg-white { background: #ffffff; }
.shadow-sm { box-shadow: 0 1px 2px rgba(0,0,0,0.2); }
.rounded { border-radius: 6px; }
.bg-red-200 { background: #fecaca; color: #450a0a; }
"#;

const SCRIPT: &str = r#"
(() => {
  const detail = () => document.getElementById('event-image');

  document.addEventListener('click', async (e) => {
    const entry = e.target.closest('.feed-entry');
    if (!entry) return;
    e.preventDefault();
    try {
      const res = await fetch(entry.getAttribute('href'));
      if (!res.ok) throw new Error('detail failed');
      const target = detail();
      if (target) target.innerHTML = await res.text();
    } catch (err) {
      console.warn('Unable to load event detail', err);
    }
  });

  const exportBtn = document.getElementById('export-report');
  exportBtn?.addEventListener('click', () => {
    window.location.href = '/relatorios/export';
  });

  const scheme = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
  const ws = new WebSocket(`${scheme}//${window.location.host}/ws/feed`);
  ws.onmessage = (msg) => {
    let update;
    try {
      update = JSON.parse(msg.data);
    } catch (err) {
      return;
    }
    const list = document.getElementById('events-list');
    if (list && typeof update.feed === 'string') list.outerHTML = update.feed;
    const target = detail();
    if (target && typeof update.detail === 'string') target.innerHTML = update.detail;
  };
  ws.onclose = () => {
    console.warn('Dashboard connection closed. Reloading in 5s...');
    setTimeout(() => location.reload(), 5000);
  };
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affordances::{OFFLINE_CLASS, mark_offline_cameras};
    use crate::cameras::{CameraRecord, monitoring_body};
    use crate::envelope::FeedId;

    fn entry(id: &str, label: &str) -> EntryView {
        EntryView {
            event_id: id.into(),
            label: label.into(),
            href: format!("/monitoramento/event/{id}"),
            class: "feed-entry border".into(),
            ppe_status: None,
            thumb: Some(format!("/data/thumbs/{id}.jpg")),
            summary: None,
        }
    }

    #[test]
    fn feed_fragment_lists_entries_in_order() {
        let html = render_feed(
            "http://backend",
            vec![entry("2", " - Câmera 1"), entry("1", " - Câmera 4")],
        );
        assert!(html.contains("id=\"events-list\""));
        let second = html.find("data-event-id=\"2\"").unwrap();
        let first = html.find("data-event-id=\"1\"").unwrap();
        assert!(second < first);
        assert!(html.contains("src=\"http://backend/data/thumbs/2.jpg\""));
        assert!(html.contains("Câmera 4"));
        assert!(html.contains("class=\"feed-entry border\""));
    }

    #[test]
    fn page_shows_offline_marking_and_detail() {
        let cameras = vec![
            CameraRecord {
                id: FeedId::Number(1.into()),
                name: "Portaria".into(),
                enabled: false,
                status: None,
            },
            CameraRecord {
                id: FeedId::Number(2.into()),
                name: "Doca".into(),
                enabled: true,
                status: None,
            },
        ];
        let mut doc = Document::new(monitoring_body(&cameras));
        mark_offline_cameras(&mut doc);
        doc.set_inner_html(EVENT_IMAGE_ID, "<img src=\"/img/9.jpg\">".into());

        let view = PageView::from_document(&doc, vec![entry("9", "x - Câmera 2")]);
        assert_eq!(view.cameras[0].class, format!("camera-tile {OFFLINE_CLASS}"));
        assert_eq!(view.cameras[1].class, "camera-tile");

        let html = render_page("http://backend", view);
        assert!(html.contains("id=\"export-report\""));
        assert!(html.contains("<img src=\"/img/9.jpg\">"));
        assert!(html.contains("title=\"Câmera offline\""));
        assert!(html.contains("data-event-id=\"9\""));
    }

    #[test]
    fn page_without_feed_container_has_no_list() {
        let doc = Document::new(Vec::new());
        let view = PageView::from_document(&doc, Vec::new());
        assert!(view.feed.is_none());
        assert!(!view.export);
        let html = render_page("http://backend", view);
        assert!(!html.contains("id=\"events-list\""));
    }
}
