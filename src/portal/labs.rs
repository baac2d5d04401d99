//! Lab-record flows: subject listing, slot listing, and record submission.
//!
//! These share the navigator's login and operate the lab-record page's form
//! controls. The upload outcome is inferred from page text -- a known-fragile
//! heuristic kept behind [`UploadClassifier`] so a stricter DOM check can
//! replace it without touching the flow.

use crate::attendance::dates::parse_date_key;
use crate::portal::navigator::{ensure_interactable, wait_for};
use crate::portal::{PortalConfig, PortalError};
use crate::webdriver::{Browser, ElementRef, Locator, WebDriverError};
use anyhow::Context;
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::io::Write;
use std::sync::LazyLock;
use tracing::debug;

static WEEK_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Week-?(\d+)").expect("week token regex is valid"));

/// One entry of the lab subject dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabOption {
    pub value: String,
    pub text: String,
}

/// One (lab, week) slot from the experiment table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabSlot {
    pub week_number: String,
    pub week_text: String,
    pub subject_code: String,
    pub experiment_title: String,
    pub batch_no: String,
    pub submission_date: String,
    pub is_available: bool,
}

/// What to upload, already rendered to a PDF.
pub struct LabSubmission {
    pub lab_code: String,
    pub week: String,
    pub title: String,
    pub document: Vec<u8>,
}

/// Outcome reported back to the student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub success: bool,
    pub message: String,
}

/// Decides whether an upload went through, given the resulting page source.
pub trait UploadClassifier: Send + Sync {
    fn classify(&self, page_source: &str) -> UploadReceipt;
}

/// Substring heuristic carried over from the portal's observed behavior.
/// Ambiguous pages are treated as success with a verify-manually message.
pub struct SubstringClassifier;

impl UploadClassifier for SubstringClassifier {
    fn classify(&self, page_source: &str) -> UploadReceipt {
        let lower = page_source.to_lowercase();
        if lower.contains("success") || lower.contains("uploaded") {
            UploadReceipt {
                success: true,
                message: "Lab record uploaded successfully!".to_owned(),
            }
        } else if lower.contains("error") || lower.contains("failed") {
            UploadReceipt {
                success: false,
                message: "Upload failed. Please check your inputs and try again.".to_owned(),
            }
        } else {
            UploadReceipt {
                success: true,
                message: "Upload completed. Please verify on the website.".to_owned(),
            }
        }
    }
}

struct SelectOption {
    element: ElementRef,
    value: String,
    text: String,
}

async fn select_options<B: Browser>(
    browser: &B,
    select: &ElementRef,
) -> Result<Vec<SelectOption>, WebDriverError> {
    let elements = browser.find_all_in(select, Locator::Tag("option")).await?;
    let mut options = Vec::with_capacity(elements.len());
    for element in elements {
        let value = browser.attribute(&element, "value").await?.unwrap_or_default();
        let text = browser.text(&element).await?;
        options.push(SelectOption {
            element,
            value,
            text,
        });
    }
    Ok(options)
}

async fn select_by_value<B: Browser>(
    browser: &B,
    select: &ElementRef,
    value: &str,
) -> Result<(), WebDriverError> {
    let options = select_options(browser, select).await?;
    match options.into_iter().find(|o| o.value == value) {
        Some(option) => browser.click(&option.element).await,
        None => Err(WebDriverError::NoSuchElement(format!(
            "option with value '{value}'"
        ))),
    }
}

async fn open_subject_dropdown<B: Browser>(
    browser: &B,
    config: &PortalConfig,
    locator: Locator<'_>,
) -> Result<ElementRef, PortalError> {
    browser.goto(&config.lab_record_url).await?;
    wait_for(browser, locator, config.page_wait).await.map_err(|e| {
        if e.is_not_found() {
            PortalError::ElementNotFound("lab subject dropdown")
        } else {
            e.into()
        }
    })
}

/// List the lab subjects available to the student, dropping the placeholder
/// "select" entry and valueless options.
pub async fn list_lab_subjects<B: Browser>(
    browser: &B,
    config: &PortalConfig,
) -> Result<Vec<LabOption>, PortalError> {
    let select = open_subject_dropdown(browser, config, Locator::Css("select")).await?;
    let options = select_options(browser, &select).await?;
    Ok(options
        .into_iter()
        .filter(|o| !o.value.trim().is_empty() && !o.text.to_lowercase().contains("select"))
        .map(|o| LabOption {
            value: o.value,
            text: o.text,
        })
        .collect())
}

/// List submittable slots for one lab.
///
/// Rows need a parseable week, a title, and a submission date; slots whose
/// deadline already passed are dropped, but a date we cannot parse never
/// hides a slot (fail-open).
pub async fn list_lab_dates<B: Browser>(
    browser: &B,
    config: &PortalConfig,
    lab_code: &str,
    today: NaiveDate,
) -> Result<Vec<LabSlot>, PortalError> {
    let select = open_subject_dropdown(browser, config, Locator::Css("select")).await?;
    select_by_value(browser, &select, lab_code).await.map_err(|e| {
        if e.is_not_found() {
            PortalError::ElementNotFound("lab subject option")
        } else {
            e.into()
        }
    })?;

    let _ = wait_for(browser, Locator::Css("table tr"), config.page_wait).await;
    let rows = browser.find_all(Locator::Css("table tr")).await?;

    let mut slots = Vec::new();
    for row in &rows {
        let cells = browser.find_all_in(row, Locator::Tag("td")).await?;
        if cells.len() < 5 {
            continue;
        }
        let week_text = browser.text(&cells[0]).await?.trim().to_owned();
        let subject_code = browser.text(&cells[1]).await?.trim().to_owned();
        let experiment_title = browser.text(&cells[2]).await?.trim().to_owned();
        let batch_no = browser.text(&cells[3]).await?.trim().to_owned();
        let submission_date = browser.text(&cells[4]).await?.trim().to_owned();

        let Some(week_number) = week_number(&week_text) else {
            continue;
        };
        let is_available = slot_is_available(&submission_date, today);
        if experiment_title.is_empty() || submission_date.is_empty() || !is_available {
            continue;
        }
        slots.push(LabSlot {
            week_number,
            week_text,
            subject_code,
            experiment_title,
            batch_no,
            submission_date,
            is_available,
        });
    }
    debug!(lab_code, slots = slots.len(), "lab slots collected");
    Ok(slots)
}

/// Fetch the experiment title for one week of a lab; empty when not found.
pub async fn experiment_title<B: Browser>(
    browser: &B,
    config: &PortalConfig,
    lab_code: &str,
    week: &str,
) -> Result<String, PortalError> {
    let select = open_subject_dropdown(browser, config, Locator::Css("select")).await?;
    select_by_value(browser, &select, lab_code).await.map_err(|e| {
        if e.is_not_found() {
            PortalError::ElementNotFound("lab subject option")
        } else {
            e.into()
        }
    })?;

    let wanted = week_number(week).unwrap_or_else(|| week.trim().to_owned());
    let _ = wait_for(browser, Locator::Css("table tr"), config.page_wait).await;
    let rows = browser.find_all(Locator::Css("table tr")).await?;
    for row in &rows {
        let cells = browser.find_all_in(row, Locator::Tag("td")).await?;
        if cells.len() < 3 {
            continue;
        }
        let week_text = browser.text(&cells[0]).await?;
        if week_number(&week_text).as_deref() == Some(wanted.as_str()) {
            return Ok(browser.text(&cells[2]).await?.trim().to_owned());
        }
    }
    Ok(String::new())
}

/// Submit a rendered lab record through the portal's upload form.
pub async fn submit_lab_record<B: Browser>(
    browser: &B,
    config: &PortalConfig,
    classifier: &dyn UploadClassifier,
    submission: &LabSubmission,
) -> Result<UploadReceipt, PortalError> {
    let subject_select =
        open_subject_dropdown(browser, config, Locator::Id("sub_code")).await?;
    ensure_interactable(browser, &subject_select, "lab subject dropdown").await?;
    select_by_value(browser, &subject_select, &submission.lab_code)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                PortalError::ElementNotFound("lab subject option")
            } else {
                e.into()
            }
        })?;

    let week_select = browser.find(Locator::Id("week_no")).await.map_err(|e| {
        if e.is_not_found() {
            PortalError::ElementNotFound("week dropdown")
        } else {
            e.into()
        }
    })?;
    ensure_interactable(browser, &week_select, "week dropdown").await?;
    let week_values: Vec<String> = select_options(browser, &week_select)
        .await?
        .into_iter()
        .map(|o| o.value)
        .collect();
    let Some(week_value) = reconcile_week_value(&submission.week, &week_values) else {
        return Err(PortalError::ElementNotFound("week options"));
    };
    debug!(requested = %submission.week, selected = %week_value, "week value reconciled");
    select_by_value(browser, &week_select, &week_value).await?;

    let title_field = browser.find(Locator::Id("exp_title")).await.map_err(|e| {
        if e.is_not_found() {
            PortalError::ElementNotFound("experiment title field")
        } else {
            e.into()
        }
    })?;
    ensure_interactable(browser, &title_field, "experiment title field").await?;
    browser.clear(&title_field).await?;
    browser.send_keys(&title_field, &submission.title).await?;
    let typed = browser.attribute(&title_field, "value").await?;
    if typed.as_deref() != Some(submission.title.as_str()) {
        return Err(PortalError::Scrape(anyhow::anyhow!(
            "experiment title field did not accept input"
        )));
    }

    // The file input takes a local path, so the document goes through a temp
    // file that must outlive the driver's read of it.
    let mut temp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .context("creating temporary document file")?;
    temp.write_all(&submission.document)
        .context("writing temporary document file")?;
    let temp_path = temp.path().to_string_lossy().into_owned();

    let file_input = browser.find(Locator::Id("prog_doc")).await.map_err(|e| {
        if e.is_not_found() {
            PortalError::ElementNotFound("document input")
        } else {
            e.into()
        }
    })?;
    ensure_interactable(browser, &file_input, "document input").await?;
    browser.send_keys(&file_input, &temp_path).await?;

    let submit = browser.find(Locator::Id("LAB_OK")).await.map_err(|e| {
        if e.is_not_found() {
            PortalError::ElementNotFound("upload submit control")
        } else {
            e.into()
        }
    })?;
    ensure_interactable(browser, &submit, "upload submit control").await?;
    browser.click(&submit).await?;

    // No DOM condition marks completion here; give the portal a moment to
    // render its response before reading it.
    tokio::time::sleep(config.settle).await;
    let source = browser.page_source().await?;
    Ok(classifier.classify(&source))
}

/// Extract the bare week number from text like "Week-7" / "week 7".
pub(crate) fn week_number(text: &str) -> Option<String> {
    WEEK_TOKEN
        .captures(text)
        .map(|caps| caps[1].to_owned())
}

/// A slot stays open through its submission date; unparseable dates never
/// close it.
pub(crate) fn slot_is_available(submission_date: &str, today: NaiveDate) -> bool {
    if submission_date.contains('-') {
        if let Some(date) = parse_date_key(submission_date) {
            return date >= today;
        }
    }
    true
}

/// Map the caller's week designator onto the option values the live control
/// actually exposes: exact matched text, then the bare number, then the
/// first available option. `None` only when the control has no options.
pub(crate) fn reconcile_week_value(requested: &str, available: &[String]) -> Option<String> {
    let first = available.first()?.clone();

    if let Some(caps) = WEEK_TOKEN.captures(requested) {
        let full = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let number = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if available.iter().any(|v| v == full) {
            return Some(full.to_owned());
        }
        if available.iter().any(|v| v == number) {
            return Some(number.to_owned());
        }
        return Some(first);
    }

    let bare = requested.trim();
    if !bare.is_empty()
        && bare.chars().all(|c| c.is_ascii_digit())
        && available.iter().any(|v| v == bare)
    {
        return Some(bare.to_owned());
    }
    Some(first)
}
