//! HTTP surface for the UI.

use std::num::NonZeroU16;
use std::path::PathBuf;

use axum::Router;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::Uri;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use tower_http::services::ServeDir;
use tracing::{error, info, instrument, warn};

use crate::actions::{ActionEnvelope, Actions, HighlightActionData, UploadedImage};
use crate::constants::{ERR_BAD_UPLOAD, ERR_HIGHLIGHT_FAILED, ERR_TRANSITION_FAILED};
use crate::error::LookbookError;
use crate::flows::{TransitionRequest, TransitionResult};
use crate::gallery::{self, GalleryEntry, PORTFOLIO};

#[derive(Clone)]
pub(crate) struct AppState {
    actions: Actions,
}

impl AppState {
    pub(crate) fn new(actions: Actions) -> Self {
        Self { actions }
    }
}

#[derive(Deserialize, Debug, Default)]
struct HighlightForm {
    #[serde(rename = "photoSrcs", default)]
    photo_srcs: Vec<String>,
}

async fn portfolio_handler() -> Json<&'static [GalleryEntry]> {
    Json(PORTFOLIO.as_slice())
}

async fn health_handler() -> &'static str {
    "ok"
}

/// An empty body, or an empty list, means the whole portfolio.
#[instrument(skip_all)]
async fn highlight_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Json<ActionEnvelope<HighlightActionData>> {
    let form = if body.iter().all(u8::is_ascii_whitespace) {
        HighlightForm::default()
    } else {
        match serde_json::from_slice::<HighlightForm>(&body) {
            Ok(form) => form,
            Err(err) => {
                warn!("Bad highlight request: {err}");
                return Json(ActionEnvelope::err(ERR_HIGHLIGHT_FAILED));
            }
        }
    };
    let srcs = if form.photo_srcs.is_empty() {
        gallery::portfolio_srcs()
    } else {
        form.photo_srcs
    };
    Json(state.actions.handle_highlight_photos(&srcs).await)
}

#[instrument(skip_all)]
async fn transition_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Json<ActionEnvelope<TransitionResult>> {
    match serde_json::from_slice::<TransitionRequest>(&body) {
        Ok(request) => Json(state.actions.handle_suggest_transition(&request).await),
        Err(err) => {
            warn!("Bad transition request: {err}");
            Json(ActionEnvelope::err(ERR_TRANSITION_FAILED))
        }
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<(UploadedImage, UploadedImage, String), String> {
    let mut image1 = None;
    let mut image2 = None;
    let mut style = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| err.to_string())?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "image1" | "image2" => {
                let content_type = field.content_type().map(str::to_owned);
                let file_name = field.file_name().map(str::to_owned);
                let bytes = field.bytes().await.map_err(|err| err.to_string())?;
                let upload = UploadedImage {
                    bytes: bytes.to_vec(),
                    content_type,
                    file_name,
                };
                if field_name == "image1" {
                    image1 = Some(upload);
                } else {
                    image2 = Some(upload);
                }
            }
            "transitionStyle" => {
                style = Some(field.text().await.map_err(|err| err.to_string())?);
            }
            _ => {}
        }
    }

    let image1 = image1
        .filter(|upload| !upload.bytes.is_empty())
        .ok_or("missing image1")?;
    let image2 = image2
        .filter(|upload| !upload.bytes.is_empty())
        .ok_or("missing image2")?;
    Ok((image1, image2, style.unwrap_or_default()))
}

#[instrument(skip_all)]
async fn transition_upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<ActionEnvelope<TransitionResult>> {
    let upload = match multipart {
        Ok(multipart) => read_upload(multipart).await,
        Err(rejection) => Err(rejection.body_text()),
    };
    match upload {
        Ok((image1, image2, style)) => Json(
            state
                .actions
                .handle_suggest_transition_upload(&image1, &image2, &style)
                .await,
        ),
        Err(err) => {
            warn!("Bad transition upload: {err}");
            Json(ActionEnvelope::err(ERR_BAD_UPLOAD))
        }
    }
}

fn create_router(public_dir: PathBuf) -> Router<AppState> {
    Router::new()
        .route("/healthz", axum::routing::get(health_handler))
        .route("/api/portfolio", axum::routing::get(portfolio_handler))
        .route("/api/highlight", axum::routing::post(highlight_handler))
        .route("/api/transition", axum::routing::post(transition_handler))
        .route(
            "/api/transition/upload",
            axum::routing::post(transition_upload_handler),
        )
        .nest_service("/portfolio", ServeDir::new(public_dir.join("portfolio")))
        .fallback(|uri: Uri| async move { LookbookError::NotFound(uri.to_string()).into_response() })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
    }
    info!("Shutting down");
}

/// Binds the listener and serves until ctrl-c.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    public_dir: PathBuf,
    actions: Actions,
) -> Result<(), LookbookError> {
    let app = create_router(public_dir).with_state(AppState::new(actions));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header::CONTENT_TYPE};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::datauri::encode;
    use crate::flows::{HighlightFlow, TransitionFlow};
    use crate::model::ModelError;
    use crate::model::testing::ScriptedModel;

    fn app(model: &Arc<ScriptedModel>, public_dir: &std::path::Path) -> Router {
        let actions = Actions::new(
            HighlightFlow::new(model.clone(), "text", 3),
            TransitionFlow::new(model.clone(), "text", "image"),
            public_dir.to_path_buf(),
        );
        create_router(public_dir.to_path_buf()).with_state(AppState::new(actions))
    }

    async fn read_body(response: axum::response::Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes()
            .to_vec()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        serde_json::from_slice(&read_body(response).await).expect("json body")
    }

    fn write_portfolio(dir: &std::path::Path) {
        std::fs::create_dir_all(dir.join("portfolio")).unwrap();
        for i in 1..=10 {
            std::fs::write(dir.join(format!("portfolio/{i}.jpg")), format!("shot {i}")).unwrap();
        }
    }

    #[tokio::test]
    async fn portfolio_lists_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(&Arc::new(ScriptedModel::new()), dir.path())
            .oneshot(Request::get("/api/portfolio").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 10);
        assert_eq!(body[0]["src"], "/portfolio/1.jpg");
    }

    #[tokio::test]
    async fn empty_highlight_body_uses_whole_portfolio() {
        let dir = tempfile::tempdir().unwrap();
        write_portfolio(dir.path());
        let pick = encode("image/jpeg", b"shot 4");
        let model = Arc::new(ScriptedModel::new().then_output(json!({"topPhotoDataUris": [pick]})));

        let response = app(&model, dir.path())
            .oneshot(Request::post("/api/highlight").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(
            body,
            json!({"success": true, "data": {"topPhotoSrcs": ["/portfolio/4.jpg"]}})
        );
        assert_eq!(model.requests()[0].media().len(), 10);
    }

    #[tokio::test]
    async fn malformed_highlight_body_is_an_error_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(&Arc::new(ScriptedModel::new()), dir.path())
            .oneshot(
                Request::post("/api/highlight")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body, json!({"success": false, "error": ERR_HIGHLIGHT_FAILED}));
    }

    #[tokio::test]
    async fn transition_failure_is_reported_in_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(
            ScriptedModel::new().then_error(ModelError::Transport("timed out".to_string())),
        );
        let request = json!({
            "image1DataUri": encode("image/png", b"1"),
            "image2DataUri": encode("image/png", b"2"),
            "transitionStyle": "edgy",
        });

        let response = app(&model, dir.path())
            .oneshot(
                Request::post("/api/transition")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(request.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = read_json(response).await;
        assert_eq!(
            body,
            json!({"success": false, "error": "Failed to suggest outfit transition."})
        );
    }

    #[tokio::test]
    async fn multipart_upload_runs_transition() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(
            ScriptedModel::new()
                .then_output(json!({"transitionDescription": "Roll the sleeves."}))
                .then_media(Some("data:image/png;base64,YWJj")),
        );
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"image1\"; filename=\"a.png\"\r\n\
             Content-Type: image/png\r\n\r\nAAA\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"image2\"; filename=\"b.png\"\r\n\
             Content-Type: image/png\r\n\r\nBBB\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"transitionStyle\"\r\n\r\nsporty\r\n\
             --{b}--\r\n",
            b = boundary
        );

        let response = app(&model, dir.path())
            .oneshot(
                Request::post("/api/transition/upload")
                    .header(
                        CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = read_json(response).await;
        assert_eq!(
            body,
            json!({
                "success": true,
                "data": {
                    "transitionDescription": "Roll the sleeves.",
                    "generatedImage": "data:image/png;base64,YWJj"
                }
            })
        );
        assert!(model.requests()[0].text().contains("Transition Style: sporty"));
    }

    #[tokio::test]
    async fn non_multipart_upload_is_an_error_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(&Arc::new(ScriptedModel::new()), dir.path())
            .oneshot(
                Request::post("/api/transition/upload")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = read_json(response).await;
        assert_eq!(body, json!({"success": false, "error": ERR_BAD_UPLOAD}));
    }

    #[tokio::test]
    async fn gallery_files_are_served() {
        let dir = tempfile::tempdir().unwrap();
        write_portfolio(dir.path());
        let response = app(&Arc::new(ScriptedModel::new()), dir.path())
            .oneshot(Request::get("/portfolio/2.jpg").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, b"shot 2");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(&Arc::new(ScriptedModel::new()), dir.path())
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
