//! Downloads a single file into a course directory.

use reqwest::header::CONTENT_DISPOSITION;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, info};
use url::Url;

use crate::{
    download_log::DownloadLog,
    error::{Error, Result},
    identity::file_identity,
    session::Session,
};

/// What happened to one file link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Already in the download log; nothing was fetched.
    Skipped,
    Downloaded { filename: String, bytes: u64 },
}

/// Fetches `link` into the directory `log` is bound to, unless the log
/// already holds its identity.
///
/// The filename comes from the response's `content-disposition` header. The
/// identity is recorded only once the whole body is on disk, so an
/// interrupted transfer is retried in full on the next run.
pub async fn materialize(
    session: &Session,
    link: &Url,
    log: &mut DownloadLog,
) -> Result<Outcome> {
    let id = file_identity(link)?;
    if log.contains(&id) {
        debug!("skipping {id}: already downloaded");
        return Ok(Outcome::Skipped);
    }

    let mut response = session.fetch(link).await?;
    let filename = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .map(|v| header_text(v.as_bytes()))
        .and_then(|v| disposition_filename(&v))
        .ok_or_else(|| Error::MissingContentDisposition(link.to_string()))?;
    let filename = checked_filename(filename)?;

    let path = log.dir().join(&filename);
    let mut file = File::create(&path).await?;
    let mut bytes = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        bytes += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;

    log.record(id).await?;
    info!("downloaded {filename} ({bytes} bytes)");
    Ok(Outcome::Downloaded { filename, bytes })
}

/// Decodes a raw header value: UTF-8 when valid, Latin-1 otherwise.
pub fn header_text(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => raw.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Extracts the `filename` parameter of a content-disposition value.
pub fn disposition_filename(value: &str) -> Option<String> {
    split_params(value).into_iter().skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let value = unquote(value.trim());
        (!value.is_empty()).then_some(value)
    })
}

/// Splits on `;` outside quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

/// Rejects names that would land outside the course directory.
fn checked_filename(name: String) -> Result<String> {
    let unsafe_name = name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || name == crate::download_log::LOG_FILE;
    if unsafe_name {
        Err(Error::UnsafeFilename(name))
    } else {
        Ok(name)
    }
}
