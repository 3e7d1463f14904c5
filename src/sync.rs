//! Drives a whole synchronization run.

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    config::Config,
    course::CourseCode,
    error::Result,
    listing,
    session::Session,
    walker::{CourseReport, walk_course},
};

/// A course whose walk could not complete.
#[derive(Debug, Clone, Serialize)]
pub struct CourseFailure {
    pub code: CourseCode,
    pub error: String,
}

/// Result of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub courses: Vec<CourseReport>,
    /// Configured codes that the course index does not list.
    pub unmatched: Vec<CourseCode>,
    pub failed: Vec<CourseFailure>,
}

impl SyncReport {
    pub fn downloaded(&self) -> usize {
        self.courses.iter().map(|c| c.downloaded.len()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.courses.iter().map(|c| c.skipped).sum()
    }
}

/// Owns the run's session and walks every configured course in turn.
pub struct Synchronizer {
    config: Config,
    session: Session,
}

impl Synchronizer {
    pub fn new(config: Config) -> Result<Self> {
        let session = Session::new(&config)?;
        Ok(Self { config, session })
    }

    /// Logs in, matches the configured courses against the portal index and
    /// mirrors each match, one course at a time.
    ///
    /// # Errors
    ///
    /// Login, course list and index failures abort the run. Failures inside a
    /// course are reported in [`SyncReport::failed`] instead.
    pub async fn run(&self) -> Result<SyncReport> {
        self.session.login().await?;

        let wanted = self.config.courses().load().await?;
        info!("{} course(s) configured", wanted.len());

        let index = self.session.page(&self.session.index_url()?).await?;
        let entries = listing::parse_course_index(&index.body, &index.url, &wanted);

        let mut report = SyncReport {
            unmatched: wanted
                .iter()
                .filter(|code| !entries.iter().any(|e| &e.code == *code))
                .cloned()
                .collect(),
            ..SyncReport::default()
        };
        for code in &report.unmatched {
            warn!("{code} is not listed on the portal");
        }

        for entry in &entries {
            match walk_course(&self.session, entry, &self.config.root_dir).await {
                Ok(course) => report.courses.push(course),
                Err(e) => {
                    warn!("{} skipped: {e}", entry.code);
                    report.failed.push(CourseFailure {
                        code: entry.code.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "sync finished: {} downloaded, {} already present",
            report.downloaded(),
            report.skipped()
        );
        Ok(report)
    }
}
