//! Mirrors one course: course page, then each file-tree section, then files.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    course::CourseCode,
    download_log::DownloadLog,
    error::Result,
    listing::{self, CourseEntry},
    materializer::{Outcome, materialize},
    session::Session,
};

/// Per-course tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseReport {
    pub code: CourseCode,
    pub name: String,
    pub sections: usize,
    pub downloaded: Vec<String>,
    pub skipped: usize,
    pub failed: usize,
}

/// Walks `course`, writing new files under `<root>/<code> - <name>`.
///
/// A course page without a file tree completes with nothing fetched. A
/// section or file that fails is logged and counted, and the walk moves on.
///
/// # Errors
///
/// Fails when the course page itself cannot be fetched or the course
/// directory's log cannot be opened.
pub async fn walk_course(
    session: &Session,
    course: &CourseEntry,
    root: &Path,
) -> Result<CourseReport> {
    info!("syncing {} - {}", course.code, course.name);
    let mut report = CourseReport {
        code: course.code.clone(),
        name: course.name.clone(),
        sections: 0,
        downloaded: Vec::new(),
        skipped: 0,
        failed: 0,
    };

    let page = session.page(&course.link).await?;
    let sections = listing::section_links(&page.body, &page.url);
    if sections.is_empty() {
        info!("{}: no file tree on course page", course.code);
        return Ok(report);
    }

    let mut log = DownloadLog::open(root.join(course.dir_name())).await?;
    for section in &sections {
        let page = match session.page(section).await {
            Ok(page) => page,
            Err(e) => {
                warn!("{}: section {section} unavailable: {e}", course.code);
                report.failed += 1;
                continue;
            }
        };
        report.sections += 1;

        for link in listing::file_links(&page.body, &page.url) {
            match materialize(session, &link, &mut log).await {
                Ok(Outcome::Skipped) => report.skipped += 1,
                Ok(Outcome::Downloaded { filename, .. }) => report.downloaded.push(filename),
                Err(e) => {
                    warn!("{}: {link} not downloaded: {e}", course.code);
                    report.failed += 1;
                }
            }
        }
    }
    log.close().await?;

    Ok(report)
}
