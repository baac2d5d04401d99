//! Lab-record page, upload handler, and the lab JSON endpoints.

use crate::pdf::{UploadedImage, images_to_pdf};
use crate::portal::LabSubmission;
use crate::state::AppState;
use crate::web::error::ApiError;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

/// `GET /lab` -- lab page context.
pub(super) async fn lab_page(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let report = state.sessions.from_headers(&headers).and_then(|s| s.report);
    Json(json!({ "data": report }))
}

/// `POST /lab` -- build a PDF from the uploaded images and submit it.
pub(super) async fn lab_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let session = state.sessions.from_headers(&headers);
    let report = session.as_ref().and_then(|s| s.report.clone());
    let Some(session) = session else {
        return lab_context(&report, Err("Session expired. Please login again."));
    };

    let mut lab_code: Option<String> = None;
    let mut week_no: Option<String> = None;
    let mut title: Option<String> = None;
    let mut images: Vec<UploadedImage> = Vec::new();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or_default().to_owned();
                match name.as_str() {
                    "lab_code" => lab_code = field.text().await.ok(),
                    "week_no" => week_no = field.text().await.ok(),
                    "title" => title = field.text().await.ok(),
                    "images" => {
                        let filename = field.file_name().unwrap_or_default().to_owned();
                        match field.bytes().await {
                            Ok(bytes) => images.push(UploadedImage {
                                filename,
                                bytes: bytes.to_vec(),
                            }),
                            Err(e) => {
                                warn!(error = %e, "failed to read uploaded image");
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "malformed multipart upload");
                return lab_context(&report, Err("Error processing upload"));
            }
        }
    }

    let (Some(lab_code), Some(week_no), Some(title)) = (lab_code, week_no, title) else {
        return lab_context(&report, Err("Missing required data for upload"));
    };
    if lab_code.is_empty() || week_no.is_empty() || title.is_empty() || images.is_empty() {
        return lab_context(&report, Err("Missing required data for upload"));
    }

    let document = match tokio::task::spawn_blocking(move || images_to_pdf(images)).await {
        Ok(Ok(document)) => document,
        Ok(Err(e)) => {
            warn!(error = %e, "failed to build lab record PDF");
            return lab_context(&report, Err("Error processing upload"));
        }
        Err(e) => {
            warn!(error = %e, "PDF build task failed");
            return lab_context(&report, Err("Error processing upload"));
        }
    };
    info!(
        lab_code = %lab_code,
        week = %week_no,
        bytes = document.len(),
        "lab record document built"
    );

    let submission = LabSubmission {
        lab_code,
        week: week_no,
        title,
        document,
    };
    match state
        .portal
        .submit_lab_record(&session.credentials(), submission)
        .await
    {
        Ok(receipt) if receipt.success => lab_context(&report, Ok(&receipt.message)),
        Ok(receipt) => lab_context(&report, Err(&receipt.message)),
        Err(e) => lab_context(&report, Err(&e.to_string())),
    }
}

/// Lab page context with either a success or an error banner.
fn lab_context(
    report: &Option<crate::attendance::AttendanceReport>,
    outcome: Result<&str, &str>,
) -> Response {
    let mut context = json!({ "data": report });
    match outcome {
        Ok(message) => context["success"] = json!(message),
        Err(message) => context["error"] = json!(message),
    }
    Json(context).into_response()
}

#[derive(Deserialize)]
pub struct LabDatesRequest {
    pub lab_code: Option<String>,
}

#[derive(Deserialize)]
pub struct ExperimentTitleRequest {
    pub lab_code: Option<String>,
    pub week_number: Option<Value>,
}

/// `POST /get_lab_subjects`
pub(super) async fn get_lab_subjects(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let session = state
        .sessions
        .from_headers(&headers)
        .ok_or_else(|| ApiError::unauthorized("Session expired"))?;

    let subjects = state
        .portal
        .list_lab_subjects(&session.credentials())
        .await?;
    Ok(Json(json!({ "subjects": subjects })))
}

/// `POST /get_lab_dates`
pub(super) async fn get_lab_dates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LabDatesRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = state
        .sessions
        .from_headers(&headers)
        .ok_or_else(|| ApiError::unauthorized("Session expired"))?;
    let lab_code = request
        .lab_code
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Lab code is required"))?;

    let dates = state
        .portal
        .list_lab_dates(&session.credentials(), &lab_code)
        .await?;
    Ok(Json(json!({ "dates": dates })))
}

/// `POST /get_experiment_title`
pub(super) async fn get_experiment_title(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ExperimentTitleRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = state
        .sessions
        .from_headers(&headers)
        .ok_or_else(|| ApiError::unauthorized("Session expired"))?;
    let lab_code = request
        .lab_code
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Lab code and week number are required"))?;
    let week = request
        .week_number
        .as_ref()
        .and_then(week_designator)
        .ok_or_else(|| ApiError::bad_request("Lab code and week number are required"))?;

    let title = state
        .portal
        .experiment_title(&session.credentials(), &lab_code, &week)
        .await?;
    Ok(Json(json!({ "title": title })))
}

/// The week arrives as either a JSON string or a bare number.
fn week_designator(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_designator_accepts_strings_and_numbers() {
        assert_eq!(week_designator(&json!("Week-7")).as_deref(), Some("Week-7"));
        assert_eq!(week_designator(&json!(7)).as_deref(), Some("7"));
        assert_eq!(week_designator(&json!("")), None);
        assert_eq!(week_designator(&json!(null)), None);
    }
}
