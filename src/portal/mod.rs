//! Client for the Samvidha college portal.
//!
//! Each scrape borrows a pooled browser session, runs the shared login
//! sequence, then dispatches on the requested task. Flows are generic over
//! [`Browser`] so tests drive them against a fake driver.

pub mod errors;
pub mod labs;
pub mod navigator;

pub use errors::PortalError;
pub use labs::{
    LabOption, LabSlot, LabSubmission, SubstringClassifier, UploadClassifier, UploadReceipt,
};

use crate::attendance::{AttendanceParser, AttendanceReport};
use crate::utils::fmt_duration;
use crate::webdriver::{Browser, ChromePool};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Portal login credentials for one student.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// URLs and timing bounds for portal navigation.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: String,
    pub attendance_url: String,
    pub lab_record_url: String,
    pub acquire_timeout: Duration,
    pub page_wait: Duration,
    pub settle: Duration,
    pub reference_year: i32,
}

impl PortalConfig {
    pub fn new(base_url: &str, acquire_timeout: Duration, reference_year: i32) -> Self {
        let root = base_url.trim_end_matches('/');
        Self {
            base_url: format!("{root}/"),
            attendance_url: format!("{root}/home?action=course_content"),
            lab_record_url: format!("{root}/home?action=labrecord_std"),
            acquire_timeout,
            page_wait: Duration::from_secs(10),
            settle: Duration::from_secs(2),
            reference_year,
        }
    }

    /// Override waiting bounds (tests shrink these to keep runs fast).
    #[allow(dead_code)]
    pub fn with_timing(mut self, page_wait: Duration, settle: Duration) -> Self {
        self.page_wait = page_wait;
        self.settle = settle;
        self
    }
}

/// The per-feature routines that run behind one shared login.
enum PortalTask {
    FetchAttendance,
    ListLabs,
    ListDates { lab_code: String },
    FetchTitle { lab_code: String, week: String },
    SubmitRecord(LabSubmission),
}

impl PortalTask {
    fn label(&self) -> &'static str {
        match self {
            PortalTask::FetchAttendance => "fetch_attendance",
            PortalTask::ListLabs => "list_lab_subjects",
            PortalTask::ListDates { .. } => "list_lab_dates",
            PortalTask::FetchTitle { .. } => "experiment_title",
            PortalTask::SubmitRecord(_) => "submit_lab_record",
        }
    }
}

enum TaskOutput {
    Report(AttendanceReport),
    Labs(Vec<LabOption>),
    Slots(Vec<LabSlot>),
    Title(String),
    Receipt(UploadReceipt),
}

pub struct PortalClient {
    pool: Arc<ChromePool>,
    config: PortalConfig,
    classifier: Arc<dyn UploadClassifier>,
}

impl PortalClient {
    pub fn new(pool: Arc<ChromePool>, config: PortalConfig) -> Self {
        Self {
            pool,
            config,
            classifier: Arc::new(SubstringClassifier),
        }
    }

    /// Swap the upload-outcome classifier (the default is the substring
    /// heuristic the portal has always been scraped with).
    #[allow(dead_code)]
    pub fn with_classifier(mut self, classifier: Arc<dyn UploadClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Scrape and parse the student's attendance.
    pub async fn fetch_attendance(
        &self,
        credentials: &Credentials,
    ) -> Result<AttendanceReport, PortalError> {
        match self.run(credentials, PortalTask::FetchAttendance).await? {
            TaskOutput::Report(report) => Ok(report),
            _ => Err(dispatch_mismatch("attendance report")),
        }
    }

    pub async fn list_lab_subjects(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<LabOption>, PortalError> {
        match self.run(credentials, PortalTask::ListLabs).await? {
            TaskOutput::Labs(labs) => Ok(labs),
            _ => Err(dispatch_mismatch("lab subjects")),
        }
    }

    pub async fn list_lab_dates(
        &self,
        credentials: &Credentials,
        lab_code: &str,
    ) -> Result<Vec<LabSlot>, PortalError> {
        let task = PortalTask::ListDates {
            lab_code: lab_code.to_owned(),
        };
        match self.run(credentials, task).await? {
            TaskOutput::Slots(slots) => Ok(slots),
            _ => Err(dispatch_mismatch("lab slots")),
        }
    }

    pub async fn experiment_title(
        &self,
        credentials: &Credentials,
        lab_code: &str,
        week: &str,
    ) -> Result<String, PortalError> {
        let task = PortalTask::FetchTitle {
            lab_code: lab_code.to_owned(),
            week: week.to_owned(),
        };
        match self.run(credentials, task).await? {
            TaskOutput::Title(title) => Ok(title),
            _ => Err(dispatch_mismatch("experiment title")),
        }
    }

    pub async fn submit_lab_record(
        &self,
        credentials: &Credentials,
        submission: LabSubmission,
    ) -> Result<UploadReceipt, PortalError> {
        match self
            .run(credentials, PortalTask::SubmitRecord(submission))
            .await?
        {
            TaskOutput::Receipt(receipt) => Ok(receipt),
            _ => Err(dispatch_mismatch("upload receipt")),
        }
    }

    /// Borrow a session, log in, run the task, and always hand the session
    /// back -- even when the flow failed.
    async fn run(
        &self,
        credentials: &Credentials,
        task: PortalTask,
    ) -> Result<TaskOutput, PortalError> {
        let started = Instant::now();
        let label = task.label();
        let lease = self.pool.acquire(self.config.acquire_timeout).await?;

        let result = self.run_on(&*lease, credentials, task).await;
        self.pool.release(lease).await;

        match &result {
            Ok(_) => info!(
                task = label,
                duration = fmt_duration(started.elapsed()),
                "portal task completed"
            ),
            Err(e) => warn!(
                task = label,
                duration = fmt_duration(started.elapsed()),
                error = %e,
                "portal task failed"
            ),
        }
        result
    }

    async fn run_on<B: Browser>(
        &self,
        browser: &B,
        credentials: &Credentials,
        task: PortalTask,
    ) -> Result<TaskOutput, PortalError> {
        navigator::login(browser, &self.config, credentials).await?;

        match task {
            PortalTask::FetchAttendance => {
                let rows = navigator::fetch_attendance_rows(browser, &self.config).await?;
                let report = AttendanceParser::new(self.config.reference_year).parse(&rows);
                Ok(TaskOutput::Report(report))
            }
            PortalTask::ListLabs => Ok(TaskOutput::Labs(
                labs::list_lab_subjects(browser, &self.config).await?,
            )),
            PortalTask::ListDates { lab_code } => {
                let today = chrono::Local::now().date_naive();
                Ok(TaskOutput::Slots(
                    labs::list_lab_dates(browser, &self.config, &lab_code, today).await?,
                ))
            }
            PortalTask::FetchTitle { lab_code, week } => Ok(TaskOutput::Title(
                labs::experiment_title(browser, &self.config, &lab_code, &week).await?,
            )),
            PortalTask::SubmitRecord(submission) => Ok(TaskOutput::Receipt(
                labs::submit_lab_record(browser, &self.config, self.classifier.as_ref(), &submission)
                    .await?,
            )),
        }
    }
}

fn dispatch_mismatch(expected: &'static str) -> PortalError {
    PortalError::Scrape(anyhow::anyhow!(
        "portal task produced unexpected output (wanted {expected})"
    ))
}
