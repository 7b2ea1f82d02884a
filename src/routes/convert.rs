//! Conversion API routes

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::convert::{ConversionService, ConvertOptions, CookiePair};
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::users::UserRepository;

/// Conversion request body
#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    /// Target page URL; also the artifact's canonical identity
    pub url: String,
    /// Converter name; defaults to the first enabled backend
    pub converter: Option<String>,
    #[serde(default)]
    pub options: ConvertOptions,
    pub cookie: Option<CookiePair>,
    /// Optional CIDR restriction stamped onto the issued key
    pub ip_restriction: Option<String>,
}

/// Metadata returned for a stored artifact
#[derive(Debug, Serialize)]
pub struct ArtifactResponse {
    pub converter: String,
    pub filename: String,
    pub size: usize,
}

#[derive(Debug, Deserialize)]
pub struct ArtifactQuery {
    pub url: String,
}

/// Create the conversion router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/convert", post(convert_page))
        .route("/pdf/:converter", get(get_artifact))
}

/// Resolve the calling user from the `X-User-Id` header
async fn caller(state: &AppState, headers: &HeaderMap) -> Result<crate::users::User> {
    let id: i64 = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| AppError::BadRequest("X-User-Id header required".to_string()))?;

    UserRepository::new(state.db())
        .get_active(id)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Unknown or inactive user: {}", id)))
}

/// Convert a page to PDF as the calling user
async fn convert_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ConvertRequest>,
) -> Result<Json<ArtifactResponse>> {
    let user = caller(&state, &headers).await?;

    let service = ConversionService::new(state.config(), state.db(), state.store());
    let artifact = service
        .convert(
            &user,
            &request.url,
            request.converter.as_deref(),
            &request.options,
            request.cookie.as_ref(),
            request.ip_restriction.as_deref(),
        )
        .await?;

    Ok(Json(ArtifactResponse {
        converter: artifact.namespace,
        filename: artifact.filename,
        size: artifact.bytes.len(),
    }))
}

/// Fetch a previously converted PDF
async fn get_artifact(
    State(state): State<AppState>,
    Path(converter): Path<String>,
    Query(query): Query<ArtifactQuery>,
) -> Result<Response> {
    let service = ConversionService::new(state.config(), state.db(), state.store());
    let artifact = service
        .get_artifact(&query.url, &converter)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No converted PDF for {}", query.url)))?;

    Ok((
        [(header::CONTENT_TYPE, "application/pdf")],
        artifact.bytes,
    )
        .into_response())
}
