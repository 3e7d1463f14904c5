//! Course codes and the persisted list of courses to mirror.

use std::{
    fmt,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
    sync::LazyLock,
};

use regex::Regex;
use serde::Serialize;
use tokio::{
    fs,
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, Lines},
};
use tracing::warn;

use crate::error::{Error, Result};

static COURSE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,5} [A-Z]?[0-9]{3}$").expect("valid pattern"));

/// A course code such as `CS F211`: a 2-5 letter group, a space, an
/// optional section letter and three digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CourseCode(String);

impl CourseCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CourseCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if COURSE_CODE.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidCourseCode(s.to_string()))
        }
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Newline-delimited list of course codes kept on disk.
#[derive(Debug, Clone)]
pub struct CourseList {
    path: PathBuf,
}

impl CourseList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the configured codes in file order.
    ///
    /// Blank lines are ignored and malformed lines are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CourseListMissing`] when the file does not exist.
    pub async fn load(&self) -> Result<Vec<CourseCode>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::CourseListMissing(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut codes = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            match line.parse::<CourseCode>() {
                Ok(code) if !codes.contains(&code) => codes.push(code),
                Ok(_) => {}
                Err(e) => warn!("skipping course list entry: {e}"),
            }
        }
        Ok(codes)
    }

    /// Appends codes to the list, creating the file (and its directory) if needed.
    pub async fn add(&self, codes: &[CourseCode]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        for code in codes {
            file.write_all(format!("{code}\n").as_bytes()).await?;
        }
        file.flush().await?;
        Ok(())
    }

    /// Appends each code read from `prompt` as soon as it is accepted, so
    /// input cut short still keeps what was entered.
    pub async fn add_from<R, W>(&self, prompt: &mut CodePrompt<R, W>) -> Result<Vec<CourseCode>>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut added = Vec::new();
        while let Some(code) = prompt.next_code().await? {
            self.add(std::slice::from_ref(&code)).await?;
            added.push(code);
        }
        Ok(added)
    }

    /// Removes codes from the list and returns how many lines were dropped.
    pub async fn remove(&self, codes: &[CourseCode]) -> Result<usize> {
        let current = self.load().await?;
        let kept: Vec<&CourseCode> = current.iter().filter(|c| !codes.contains(c)).collect();
        let removed = current.len() - kept.len();

        let mut contents = String::new();
        for code in kept {
            contents.push_str(code.as_str());
            contents.push('\n');
        }
        fs::write(&self.path, contents).await?;
        Ok(removed)
    }

    /// Deletes the list file. A missing file is not an error.
    pub async fn reset(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reads course codes line by line until an empty line or end of input,
/// re-prompting after malformed ones.
pub struct CodePrompt<R, W> {
    lines: Lines<R>,
    out: W,
    prompt: String,
}

impl<R, W> CodePrompt<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(input: R, out: W, prompt: impl Into<String>) -> Self {
        Self {
            lines: input.lines(),
            out,
            prompt: prompt.into(),
        }
    }

    pub async fn next_code(&mut self) -> Result<Option<CourseCode>> {
        loop {
            write!(self.out, "{}", self.prompt)?;
            self.out.flush()?;
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                return Ok(None);
            }
            match line.parse() {
                Ok(code) => return Ok(Some(code)),
                Err(_) => writeln!(self.out, "Invalid Course Code")?,
            }
        }
    }

    pub async fn collect(&mut self) -> Result<Vec<CourseCode>> {
        let mut codes = Vec::new();
        while let Some(code) = self.next_code().await? {
            codes.push(code);
        }
        Ok(codes)
    }
}
