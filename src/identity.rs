//! Stable dedup keys for remote files.

use std::fmt;

use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};

/// Length of the parameter name (`id=`) preceding the identifier.
const PREFIX_LEN: usize = 3;

/// Opaque identifier of a remote file, derived from its retrieval link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FileIdentity(String);

impl FileIdentity {
    /// Wraps an identity read back from a download log.
    pub fn from_logged(line: &str) -> Option<Self> {
        let line = line.trim();
        (!line.is_empty()).then(|| Self(line.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the identity of the file behind `link`.
///
/// The identity is the leading query parameter's value: the query string
/// past its three-character prefix, up to the next `&`. Path, fragment and
/// any trailing parameters do not take part.
pub fn file_identity(link: &Url) -> Result<FileIdentity> {
    let query = link
        .query()
        .ok_or_else(|| Error::MissingIdentity(link.to_string()))?;
    let id = query
        .get(PREFIX_LEN..)
        .map(|rest| rest.split('&').next().unwrap_or(rest))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::MissingIdentity(link.to_string()))?;
    Ok(FileIdentity(id.to_string()))
}
