//! HTTP routes
//!
//! - `GET /` - index page embedding every camera stream
//! - `GET /video_feed/{camera_id}` - endless `multipart/x-mixed-replace` JPEG stream
//! - `GET /api/cameras` - camera list with per-camera counters

use std::fmt::Write as _;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use tokio::sync::Semaphore;

use crate::hub::{CameraStatus, Hub};
use crate::media::multipart;

/// Shared state for the HTTP handlers
pub(crate) struct GatewayState {
    pub hub: Arc<Hub>,
    pub viewer_limit: Option<Arc<Semaphore>>,
}

/// Build the router over a hub
pub(crate) fn router(state: Arc<GatewayState>, index_page: bool) -> Router {
    let mut app = Router::new()
        .route("/video_feed/{camera_id}", get(video_feed))
        .route("/video_feed/{camera_id}/", get(video_feed))
        .route("/api/cameras", get(api_cameras));
    if index_page {
        app = app.route("/", get(index));
    }
    app.with_state(state)
}

/// GET /video_feed/{camera_id}
async fn video_feed(
    State(state): State<Arc<GatewayState>>,
    Path(camera_id): Path<String>,
) -> Response {
    let Some(factory) = state.hub.factory(&camera_id) else {
        tracing::debug!(camera = %camera_id, "Stream requested for unknown camera");
        let body = format!("unknown camera '{camera_id}'\n");
        return (StatusCode::NOT_FOUND, body).into_response();
    };

    let permit = match &state.viewer_limit {
        Some(limit) => match Arc::clone(limit).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(camera = %camera_id, "Viewer rejected: limit reached");
                return (StatusCode::SERVICE_UNAVAILABLE, "viewer limit reached\n")
                    .into_response();
            }
        },
        None => None,
    };

    let handler = match factory.create() {
        Ok(handler) => handler,
        Err(e) => return (StatusCode::NOT_FOUND, format!("{e}\n")).into_response(),
    };
    tracing::debug!(
        camera = %camera_id,
        subscriber = handler.subscription().id(),
        "Viewer connected"
    );

    // The permit lives exactly as long as the body stream
    let stream = handler.into_stream().map(move |chunk| {
        let _held = &permit;
        chunk
    });

    (
        [
            (header::CONTENT_TYPE, multipart::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// GET /api/cameras
async fn api_cameras(State(state): State<Arc<GatewayState>>) -> Json<Vec<CameraStatus>> {
    Json(state.hub.statuses())
}

/// GET /
async fn index(State(state): State<Arc<GatewayState>>) -> Html<String> {
    Html(render_index(
        state.hub.cameras().iter().map(|camera| camera.id().as_str()),
    ))
}

fn render_index<'a>(camera_ids: impl Iterator<Item = &'a str>) -> String {
    let mut page = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Cameras</title>\n\
         <style>body{font-family:sans-serif;background:#111;color:#eee}\
         figure{display:inline-block;margin:8px}img{max-width:640px;width:100%}</style>\n\
         </head>\n<body>\n",
    );
    for id in camera_ids {
        let id = escape_html(id);
        let _ = writeln!(
            page,
            "<figure><img src=\"/video_feed/{id}\" alt=\"{id}\">\
             <figcaption>{id}</figcaption></figure>"
        );
    }
    page.push_str("</body>\n</html>\n");
    page
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("cam1"), "cam1");
        assert_eq!(
            escape_html("<a href=\"x\">&'"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;"
        );
    }

    #[test]
    fn test_render_index() {
        let page = render_index(["front", "back<script>"].into_iter());

        assert!(page.contains("<img src=\"/video_feed/front\""));
        assert!(page.contains("/video_feed/back&lt;script&gt;"));
        assert!(!page.contains("<script>"));
        let front = page.find("/video_feed/front").unwrap();
        let back = page.find("/video_feed/back").unwrap();
        assert!(front < back);
    }
}
