// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP routes.
//
//   GET  /                      title, CSRF token, queue, supported formats
//   POST /upload/               multipart upload with optional print options
//   GET  /jobs/                 the caller's queue
//   POST /jobs/{id}/options     edit a queued or failed job
//   POST /jobs/{id}/delete      remove a job
//   POST /print_files/          print the caller's queue
//   GET  /status/               printer diagnostics
//   GET  /settings/             settings plus the printers CUPS offers
//   POST /settings/             update settings
//   POST /logout/               drop the caller's queue and files
//
// Every POST carries the `csrf_token` form field.

use std::collections::HashMap;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use printgate_core::error::PrintgateError;
use printgate_core::settings::{PrinterSettings, SettingsSource};
use printgate_core::types::{
    ColorMode, Job, JobId, Orientation, PageSelection, PrintOptions, PrinterStatus, SessionId,
};
use printgate_document::{accept_attribute, describe_supported_extensions};
use printgate_print::printers::resolve_profile;
use printgate_print::queue::Upload;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::services::AppServices;
use crate::session;

/// Headroom over the file size limit for multipart framing and form fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(services: AppServices) -> Router {
    let body_limit = usize::try_from(services.config().max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(index))
        .route(
            "/upload/",
            post(upload)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(body_limit)),
        )
        .route("/jobs/", get(list_jobs))
        .route("/jobs/{id}/options", post(update_options))
        .route("/jobs/{id}/delete", post(delete_job))
        .route("/print_files/", post(print_files))
        .route("/status/", get(printer_status))
        .route("/settings/", get(show_settings).post(save_settings))
        .route("/logout/", post(logout))
        .layer(TraceLayer::new_for_http())
        .with_state(services)
}

// -- Forms ----------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct CsrfForm {
    #[serde(default)]
    csrf_token: String,
}

/// Print options as submitted by the browser. Absent fields keep the value
/// they are applied to.
#[derive(Debug, Default, Deserialize)]
struct OptionsForm {
    #[serde(default)]
    csrf_token: String,
    page_range: Option<String>,
    pages: Option<String>,
    color: Option<String>,
    orientation: Option<String>,
}

impl OptionsForm {
    fn from_fields(mut fields: HashMap<String, String>) -> Self {
        Self {
            csrf_token: fields.remove("csrf_token").unwrap_or_default(),
            page_range: fields.remove("page_range"),
            pages: fields.remove("pages"),
            color: fields.remove("color"),
            orientation: fields.remove("orientation"),
        }
    }

    fn has_options(&self) -> bool {
        [&self.page_range, &self.pages, &self.color, &self.orientation]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }

    fn apply_to(&self, base: PrintOptions) -> Result<PrintOptions, PrintgateError> {
        let pages = match self.page_range.as_deref() {
            Some(mode) if !mode.trim().is_empty() => {
                PageSelection::from_form(mode, self.pages.as_deref().unwrap_or(""))?
            }
            _ => match self.pages.as_deref().map(str::trim) {
                Some(list) if !list.is_empty() => PageSelection::range(list)?,
                _ => base.pages,
            },
        };
        Ok(PrintOptions {
            pages,
            color: parse_or(self.color.as_deref(), base.color)?,
            orientation: parse_or(self.orientation.as_deref(), base.orientation)?,
        })
    }
}

fn parse_or<T>(raw: Option<&str>, fallback: T) -> Result<T, PrintgateError>
where
    T: std::str::FromStr<Err = PrintgateError>,
{
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value.parse(),
        _ => Ok(fallback),
    }
}

#[derive(Debug, Deserialize)]
struct SettingsForm {
    #[serde(default)]
    csrf_token: String,
    app_title: Option<String>,
    default_color: Option<String>,
    default_orientation: Option<String>,
    printer_profile: Option<String>,
}

// -- Helpers --------------------------------------------------------------

fn check_csrf(app: &AppServices, session: &SessionId, token: &str) -> Result<(), ApiError> {
    if app.csrf().verify(session, token) {
        Ok(())
    } else {
        Err(ApiError::CsrfMismatch)
    }
}

/// Session for a state-changing request. Without a cookie there is nothing
/// the CSRF token could have been minted for.
fn posting_session(jar: &CookieJar) -> Result<SessionId, ApiError> {
    session::existing(jar).ok_or(ApiError::CsrfMismatch)
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse::<JobId>().map_err(ApiError::from)
}

// -- Handlers -------------------------------------------------------------

#[derive(Serialize)]
struct IndexPage {
    title: String,
    csrf_token: String,
    jobs: Vec<Job>,
    supported_formats: String,
    accept: String,
}

async fn index(State(app): State<AppServices>, jar: CookieJar) -> impl IntoResponse {
    let (jar, session) = session::ensure(jar);
    let page = IndexPage {
        title: app.settings().current().app_title,
        csrf_token: app.csrf().token_for(&session),
        jobs: app.queue().list_jobs(&session),
        supported_formats: describe_supported_extensions(),
        accept: accept_attribute(),
    };
    (jar, Json(page))
}

#[instrument(skip_all)]
async fn upload(
    State(app): State<AppServices>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let (jar, session) = session::ensure(jar);

    let mut file = None;
    let mut fields = HashMap::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file_upload" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            file = Some((filename, content_type, bytes));
        } else {
            let value = field.text().await?;
            fields.insert(name, value);
        }
    }

    let form = OptionsForm::from_fields(fields);
    check_csrf(&app, &session, &form.csrf_token)?;
    let (filename, content_type, bytes) = file.ok_or_else(|| {
        ApiError::BadRequest("no file uploaded (expected field 'file_upload')".into())
    })?;

    let options = if form.has_options() {
        Some(form.apply_to(app.settings().current().default_options())?)
    } else {
        None
    };
    let job = app
        .queue()
        .enqueue(
            &session,
            Upload {
                filename: &filename,
                content_type: content_type.as_deref(),
                bytes: &bytes,
            },
            options,
        )
        .await?;

    Ok((StatusCode::CREATED, jar, Json(job)).into_response())
}

async fn list_jobs(State(app): State<AppServices>, jar: CookieJar) -> Json<Vec<Job>> {
    let jobs = session::existing(&jar)
        .map(|session| app.queue().list_jobs(&session))
        .unwrap_or_default();
    Json(jobs)
}

async fn update_options(
    State(app): State<AppServices>,
    Path(id): Path<String>,
    jar: CookieJar,
    Form(form): Form<OptionsForm>,
) -> Result<Json<Job>, ApiError> {
    let session = posting_session(&jar)?;
    check_csrf(&app, &session, &form.csrf_token)?;
    let id = parse_job_id(&id)?;

    let current = app.queue().job(&session, &id)?;
    let options = form.apply_to(current.options)?;
    Ok(Json(app.queue().update_options(&session, &id, options)?))
}

async fn delete_job(
    State(app): State<AppServices>,
    Path(id): Path<String>,
    jar: CookieJar,
    Form(form): Form<CsrfForm>,
) -> Result<StatusCode, ApiError> {
    let session = posting_session(&jar)?;
    check_csrf(&app, &session, &form.csrf_token)?;
    let id = parse_job_id(&id)?;
    app.queue().remove_job(&session, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 204 for an empty queue, 200 when everything printed, 500 (with the same
/// per-job report) when anything failed.
async fn print_files(
    State(app): State<AppServices>,
    jar: CookieJar,
    Form(form): Form<CsrfForm>,
) -> Result<Response, ApiError> {
    let session = posting_session(&jar)?;
    check_csrf(&app, &session, &form.csrf_token)?;

    let result = app.queue().print_batch(&session).await;
    if result.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let status = if result.has_failures() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)).into_response())
}

/// Always answers; an unknown state carries the explanation.
async fn printer_status(State(app): State<AppServices>) -> Json<PrinterStatus> {
    let settings = app.settings().current();
    let status = match resolve_profile(&settings, app.printers()).await {
        Some(printer) => app.prober().probe(&printer).await,
        None => PrinterStatus::unknown(
            None,
            "No printer is selected and CUPS does not offer exactly one printer.",
        ),
    };
    Json(status)
}

#[derive(Serialize)]
struct SettingsPage {
    settings: PrinterSettings,
    printers: Vec<String>,
    printer_error: Option<String>,
    csrf_token: String,
}

async fn show_settings(State(app): State<AppServices>, jar: CookieJar) -> impl IntoResponse {
    let (jar, session) = session::ensure(jar);
    let (printers, printer_error) = match app.printers().available_printers().await {
        Ok(printers) => (printers, None),
        Err(e) => (Vec::new(), Some(e.to_string())),
    };
    let page = SettingsPage {
        settings: app.settings().current(),
        printers,
        printer_error,
        csrf_token: app.csrf().token_for(&session),
    };
    (jar, Json(page))
}

async fn save_settings(
    State(app): State<AppServices>,
    jar: CookieJar,
    Form(form): Form<SettingsForm>,
) -> Result<Json<PrinterSettings>, ApiError> {
    let session = posting_session(&jar)?;
    check_csrf(&app, &session, &form.csrf_token)?;

    let mut settings = app.settings().load()?;
    if let Some(title) = form.app_title.map(|t| t.trim().to_string())
        && !title.is_empty()
    {
        settings.app_title = title;
    }
    settings.default_color = parse_or::<ColorMode>(form.default_color.as_deref(), settings.default_color)?;
    settings.default_orientation =
        parse_or::<Orientation>(form.default_orientation.as_deref(), settings.default_orientation)?;
    if let Some(printer) = form.printer_profile {
        let printer = printer.trim();
        settings.printer_profile = (!printer.is_empty()).then(|| printer.to_string());
    }

    let store = app.settings().clone();
    let saved = settings.clone();
    tokio::task::spawn_blocking(move || store.save(&saved))
        .await
        .map_err(|e| PrintgateError::Database(format!("settings task failed: {e}")))??;
    info!(printer = ?settings.printer_profile, "settings updated");
    Ok(Json(settings))
}

async fn logout(
    State(app): State<AppServices>,
    jar: CookieJar,
    Form(form): Form<CsrfForm>,
) -> Result<impl IntoResponse, ApiError> {
    let session = posting_session(&jar)?;
    check_csrf(&app, &session, &form.csrf_token)?;
    app.queue().release_session(&session).await?;
    Ok((session::clear(jar), StatusCode::NO_CONTENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> OptionsForm {
        OptionsForm::from_fields(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn empty_form_keeps_the_base_options() {
        let base = PrintOptions {
            pages: PageSelection::Range("2".into()),
            color: ColorMode::Gray,
            orientation: Orientation::Landscape,
        };
        let f = form(&[("csrf_token", "x")]);
        assert!(!f.has_options());
        assert_eq!(f.apply_to(base.clone()).unwrap(), base);
    }

    #[test]
    fn form_fields_override_the_base() {
        let f = form(&[
            ("page_range", "1"),
            ("pages", "1-3,5"),
            ("color", "Gray"),
            ("orientation", "4"),
        ]);
        assert!(f.has_options());
        let options = f.apply_to(PrintOptions::default()).unwrap();
        assert_eq!(options.pages, PageSelection::Range("1-3,5".into()));
        assert_eq!(options.color, ColorMode::Gray);
        assert_eq!(options.orientation, Orientation::Landscape);

        let all = form(&[("page_range", "0"), ("pages", "7")])
            .apply_to(options)
            .unwrap();
        assert_eq!(all.pages, PageSelection::All);
    }

    #[test]
    fn custom_range_without_pages_prints_the_first_page() {
        let options = form(&[("page_range", "1")])
            .apply_to(PrintOptions::default())
            .unwrap();
        assert_eq!(options.pages, PageSelection::Range("1-1".into()));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for pairs in [
            [("page_range", "1"), ("pages", "5-2")],
            [("color", "sepia"), ("pages", "")],
            [("orientation", "diagonal"), ("pages", "")],
        ] {
            let err = form(&pairs).apply_to(PrintOptions::default()).unwrap_err();
            assert!(matches!(err, PrintgateError::InvalidOptions(_)), "{pairs:?}");
        }
    }
}
