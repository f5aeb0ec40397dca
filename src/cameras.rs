use crate::detail::DetailSource;
use crate::envelope::FeedId;
use crate::page::{CAMERA_STATUS_ATTR, EVENT_IMAGE_ID, EVENTS_LIST_ID, EXPORT_REPORT_ID, Element};
use anyhow::Context;
use serde::Deserialize;

pub const CAMERAS_PATH: &str = "/api/cameras/";
pub const CAMERA_GRID_ID: &str = "camera-grid";
pub const DETAIL_PLACEHOLDER: &str = "Selecione um evento para ver a imagem.";

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CameraRecord {
    pub id: FeedId,
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub status: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

impl CameraRecord {
    /// Explicit status from the registry, or one derived from `enabled`.
    pub fn status(&self) -> &str {
        match &self.status {
            Some(status) => status.as_str(),
            None if self.enabled => "online",
            None => "offline",
        }
    }
}

/// Reads the camera registry once. A failed load yields an empty grid.
pub async fn load_cameras<S: DetailSource>(source: &S) -> Vec<CameraRecord> {
    let loaded = match source.fetch(CAMERAS_PATH).await {
        Ok(body) => serde_json::from_str::<Vec<CameraRecord>>(&body)
            .context("Unexpected camera listing"),
        Err(err) => Err(err),
    };
    match loaded {
        Ok(cameras) => {
            tracing::info!("Loaded {} cameras", cameras.len());
            cameras
        }
        Err(err) => {
            tracing::warn!("Unable to load cameras: {err:#}");
            Vec::new()
        }
    }
}

fn camera_tile(camera: &CameraRecord) -> Element {
    Element::new("div")
        .with_class("camera-tile")
        .with_attr("data-camera-id", camera.id.to_string())
        .with_attr(CAMERA_STATUS_ATTR, camera.status())
        .with_text(camera.name.clone())
}

/// Load-time body of the monitoring page.
pub fn monitoring_body(cameras: &[CameraRecord]) -> Vec<Element> {
    let grid = cameras
        .iter()
        .map(camera_tile)
        .fold(Element::new("section").with_id(CAMERA_GRID_ID), Element::with_child);

    vec![
        Element::new("button")
            .with_id(EXPORT_REPORT_ID)
            .with_text("Exportar relatório"),
        grid,
        Element::new("div").with_id(EVENTS_LIST_ID),
        Element::new("div")
            .with_id(EVENT_IMAGE_ID)
            .with_text(DETAIL_PLACEHOLDER),
    ]
}
