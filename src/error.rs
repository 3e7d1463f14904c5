use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised while synchronizing course material.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid course code '{0}'")]
    InvalidCourseCode(String),
    #[error("link '{0}' carries no file identity")]
    MissingIdentity(String),
    #[error("response for '{0}' has no usable content-disposition filename")]
    MissingContentDisposition(String),
    #[error("server proposed unsafe filename '{0}'")]
    UnsafeFilename(String),
    #[error("course list not found at {}", .0.display())]
    CourseListMissing(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
