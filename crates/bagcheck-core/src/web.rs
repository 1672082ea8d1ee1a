//! HTTP surface
//!
//! - `GET /` upload page
//! - `POST /inspect` multipart upload (field `image`), returns a `DisplayResult`
//! - `GET /health` liveness probe

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use bagcheck_vision::JpegCodec;

use crate::inspection::Inspector;
use crate::presentation::{analyze, DisplayKind, DisplayResult};

/// Name of the multipart field carrying the photo
pub const IMAGE_FIELD: &str = "image";

#[derive(Clone)]
pub struct AppState {
    pub inspector: Arc<dyn Inspector>,
    pub codec: JpegCodec,
    pub max_upload_bytes: usize,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/", get(index))
        .route("/inspect", post(inspect))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint - returns 200 OK when the service is running
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn inspect(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<DisplayResult>) {
    let upload = match read_image_field(&mut multipart).await {
        Ok(upload) => upload,
        Err(e) => {
            warn!("Rejected upload: {}", e.body_text());
            let result =
                DisplayResult::new(DisplayKind::Error, format!("An error occurred: {}", e.body_text()));
            return (e.status(), Json(result));
        }
    };

    let result = analyze(state.inspector.as_ref(), state.codec, upload).await;
    (status_for(result.kind), Json(result))
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Option<Vec<u8>>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }
        let data = field.bytes().await?;
        return Ok(Some(data.to_vec()));
    }
    Ok(None)
}

fn status_for(kind: DisplayKind) -> StatusCode {
    match kind {
        DisplayKind::Acceptable | DisplayKind::NotAcceptable => StatusCode::OK,
        DisplayKind::NoImage => StatusCode::BAD_REQUEST,
        DisplayKind::ImageError => StatusCode::UNPROCESSABLE_ENTITY,
        DisplayKind::ParseError | DisplayKind::Error => StatusCode::BAD_GATEWAY,
    }
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Thermal Bag Quality Checker</title>
<style>
  body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; background: #f4f5f7; color: #1f2933; }
  main { max-width: 960px; margin: 0 auto; padding: 2rem 1rem; }
  .row { display: flex; flex-wrap: wrap; gap: 1.5rem; }
  .col { flex: 1 1 320px; background: #fff; border-radius: 12px; padding: 1.25rem; box-shadow: 0 1px 3px rgba(0,0,0,0.08); }
  #preview { display: none; max-width: 100%; margin-top: 1rem; border-radius: 8px; }
  button { margin-top: 1rem; width: 100%; padding: 0.75rem; border: 0; border-radius: 8px; background: #ff6b00; color: #fff; font-size: 1rem; cursor: pointer; }
  button:disabled { opacity: 0.6; cursor: wait; }
  #result h2 { margin-top: 0; }
</style>
</head>
<body>
<main>
  <h2>Thermal Bag Quality Checker</h2>
  <p>Upload a photo of a courier's thermal bag to check if it's in acceptable condition for a shift.</p>
  <div class="row">
    <form class="col" id="form">
      <label for="image">Upload Bag Photo</label><br>
      <input type="file" id="image" name="image" accept="image/*" capture="environment">
      <img id="preview" alt="Selected bag photo">
      <button type="submit" id="submit">Analyze Bag</button>
    </form>
    <section class="col">
      <div id="result"><p>Analysis Result</p></div>
    </section>
  </div>
</main>
<script>
  const form = document.getElementById('form');
  const input = document.getElementById('image');
  const preview = document.getElementById('preview');
  const button = document.getElementById('submit');
  const result = document.getElementById('result');

  function escapeHtml(text) {
    return text.replace(/[&<>"']/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[c]));
  }

  function renderMarkdown(md) {
    return md.split(/\n\n+/).map(block => {
      let html = escapeHtml(block).replace(/\*\*(.+?)\*\*/g, '<strong>$1</strong>');
      return block.startsWith('## ') ? '<h2>' + html.slice(3) + '</h2>' : '<p>' + html + '</p>';
    }).join('');
  }

  input.addEventListener('change', () => {
    const file = input.files[0];
    if (file) {
      preview.src = URL.createObjectURL(file);
      preview.style.display = 'block';
    }
  });

  form.addEventListener('submit', async (event) => {
    event.preventDefault();
    const data = new FormData();
    if (input.files[0]) data.append('image', input.files[0]);
    button.disabled = true;
    result.innerHTML = '<p>Analyzing...</p>';
    try {
      const response = await fetch('/inspect', { method: 'POST', body: data });
      const body = await response.json();
      result.innerHTML = renderMarkdown(body.markdown);
    } catch (err) {
      result.innerHTML = renderMarkdown('An error occurred: ' + err);
    } finally {
      button.disabled = false;
    }
  });
</script>
</body>
</html>
"##;
