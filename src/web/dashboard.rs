//! Login, dashboard, and bunk-projection handlers.
//!
//! Page endpoints return their render context as JSON; template rendering is
//! left to the consumer of this service.

use crate::attendance::AttendanceReport;
use crate::attendance::dates::parse_date_key;
use crate::portal::Credentials;
use crate::state::AppState;
use crate::web::error::ApiError;
use crate::web::session::{SessionStore, UserSession};
use axum::Form;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct BunkQuery {
    #[serde(default)]
    pub bunk: u32,
}

/// `GET /` -- login page context.
pub(super) async fn login_page() -> Json<Value> {
    Json(json!({ "page": "login", "error": Value::Null }))
}

/// `POST /dashboard` -- log in and scrape, or serve the cached report.
pub(super) async fn dashboard_post(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Response {
    let credentials = Credentials {
        username: form.username,
        password: form.password,
    };
    let cache_key = format!("att:{}", credentials.username);

    let report = match cached_report(&state, &cache_key).await {
        Some(report) => {
            debug!(username = %credentials.username, "serving cached attendance");
            report
        }
        None => match state.portal.fetch_attendance(&credentials).await {
            Ok(report) => {
                if let Ok(value) = serde_json::to_value(&report) {
                    state
                        .result_cache
                        .set(&cache_key, &value, state.cache_ttl)
                        .await;
                }
                info!(
                    username = %credentials.username,
                    subjects = report.subjects.len(),
                    "attendance scraped"
                );
                report
            }
            Err(e) => return ApiError::from(e).into_response(),
        },
    };

    let token = state.sessions.create(UserSession {
        username: credentials.username.clone(),
        password: credentials.password.clone(),
        report: Some(report.clone()),
    });

    let mut response = Json(dashboard_context(&report)).into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, SessionStore::cookie_header(&token));
    response
}

/// `GET /dashboard` -- session-held report, else the cache, else back to login.
pub(super) async fn dashboard_get(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let Some(session) = state.sessions.from_headers(&headers) else {
        return Redirect::to("/").into_response();
    };
    let report = match session.report {
        Some(report) => Some(report),
        None => cached_report(&state, &format!("att:{}", session.username)).await,
    };
    match report {
        Some(report) => Json(dashboard_context(&report)).into_response(),
        None => Redirect::to("/").into_response(),
    }
}

/// `GET /b_safe?bunk=N` -- overall percentage projected after N more bunks.
pub(super) async fn b_safe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<BunkQuery>,
) -> Response {
    let Some(report) = session_report(&state, &headers) else {
        return Redirect::to("/").into_response();
    };
    let projected =
        projected_percentage(report.overall.present, report.overall.absent, query.bunk);
    Json(json!({
        "data": report,
        "bunk": query.bunk,
        "projected": projected,
    }))
    .into_response()
}

/// `GET /course/{code}?bunk=N` -- one subject's projection.
pub(super) async fn course_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(code): Path<String>,
    Query(query): Query<BunkQuery>,
) -> Response {
    let Some(report) = session_report(&state, &headers) else {
        return Redirect::to("/dashboard").into_response();
    };
    let Some(subject) = report.subjects.get(&code) else {
        return Redirect::to("/dashboard").into_response();
    };
    let projected = projected_percentage(subject.present, subject.absent, query.bunk);
    Json(json!({
        "code": code,
        "sub": subject,
        "bunk": query.bunk,
        "projected": projected,
    }))
    .into_response()
}

/// `GET /profile`
pub(super) async fn profile(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let report = session_report(&state, &headers);
    Json(json!({ "data": report }))
}

fn session_report(state: &AppState, headers: &HeaderMap) -> Option<AttendanceReport> {
    state.sessions.from_headers(headers)?.report
}

async fn cached_report(state: &AppState, key: &str) -> Option<AttendanceReport> {
    let value = state.result_cache.get(key).await?;
    serde_json::from_value(value).ok()
}

/// Render context for the dashboard: the raw report, a calendar projection
/// (1 present, -1 absent, 0 no record), and pre-built table rows.
fn dashboard_context(report: &AttendanceReport) -> Value {
    let calendar: Vec<Value> = report
        .date_attendance
        .iter()
        .filter_map(|(key, day)| {
            let date = parse_date_key(key)?;
            let value = if day.present > 0 {
                1
            } else if day.absent > 0 {
                -1
            } else {
                0
            };
            Some(json!({
                "date": date.format("%Y-%m-%d").to_string(),
                "value": value,
            }))
        })
        .collect();

    let table: Vec<Value> = report
        .subjects
        .iter()
        .enumerate()
        .map(|(i, (code, subject))| {
            json!([
                i + 1,
                code,
                subject.name,
                subject.present,
                subject.absent,
                format!("{}%", subject.percentage),
            ])
        })
        .collect();

    json!({
        "data": report,
        "calendar_data": calendar,
        "table": table,
    })
}

/// Percentage after `bunk` additional absences, rounded like the live one.
fn projected_percentage(present: u32, absent: u32, bunk: u32) -> f64 {
    let total = present + absent + bunk;
    if total == 0 {
        return 0.0;
    }
    let raw = f64::from(present) / f64::from(total) * 100.0;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::AttendanceParser;

    #[test]
    fn projection_degrades_with_bunks() {
        assert_eq!(projected_percentage(9, 1, 0), 90.0);
        assert_eq!(projected_percentage(9, 1, 2), 75.0);
        assert_eq!(projected_percentage(0, 0, 0), 0.0);
        // Bunks alone still produce a denominator.
        assert_eq!(projected_percentage(0, 0, 3), 0.0);
    }

    #[test]
    fn context_carries_calendar_and_table_rows() {
        let report = AttendanceParser::new(2025).parse(&[
            "AAB101 - MATH",
            "20 Aug 2025 PRESENT",
            "21 Aug 2025 ABSENT",
        ]);
        let context = dashboard_context(&report);

        let calendar = context["calendar_data"].as_array().unwrap();
        assert_eq!(calendar.len(), 2);
        assert_eq!(calendar[0]["date"], "2025-08-20");
        assert_eq!(calendar[0]["value"], 1);
        assert_eq!(calendar[1]["value"], -1);

        let table = context["table"].as_array().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0][1], "AAB101");
        assert_eq!(table[0][5], "50%");
    }
}
