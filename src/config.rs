use std::{path::PathBuf, time::Duration};

use url::Url;

use crate::{
    course::CourseList,
    error::{Error, Result},
};

pub const DEFAULT_PORTAL: &str = "http://111.93.5.216/";
pub const DEFAULT_ROOT_DIR: &str = "Academics";
pub const COURSE_LIST_FILE: &str = "courses.lst";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Where material is mirrored to and which portal it comes from.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one sub-directory per course.
    pub root_dir: PathBuf,
    /// Newline-delimited course code list.
    pub course_list: PathBuf,
    /// Base URL of the portal; always ends in `/`.
    pub portal: Url,
    /// Connect timeout and the longest allowed silence between reads.
    /// Transfers that keep making progress are never cut off.
    pub request_timeout: Duration,
}

impl Config {
    /// Builds a config rooted at `root_dir` with the course list inside it.
    pub fn new(root_dir: impl Into<PathBuf>, portal: &str) -> Result<Self> {
        let root_dir = root_dir.into();
        Ok(Self {
            course_list: root_dir.join(COURSE_LIST_FILE),
            root_dir,
            portal: portal_url(portal)?,
            request_timeout: DEFAULT_TIMEOUT,
        })
    }

    /// `~/Academics` against the default portal.
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(DEFAULT_ROOT_DIR), DEFAULT_PORTAL)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn courses(&self) -> CourseList {
        CourseList::new(&self.course_list)
    }
}

/// Parses a portal base, normalizing it to end with a slash so endpoint
/// paths join beneath it.
fn portal_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(&format!("{trimmed}/"))?;
    if url.cannot_be_a_base() {
        return Err(Error::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase));
    }
    Ok(url)
}
