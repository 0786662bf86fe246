//! Output file naming and collision-free claiming.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::error::{ConvertError, Result};

/// Longest subject part of a generated name, in characters.
const MAX_SUBJECT_LEN: usize = 120;

/// Byte cap on the subject part. File systems limit names to 255 bytes; this
/// leaves room for the date prefix, a `_N` suffix and the extension.
const MAX_SUBJECT_BYTES: usize = 200;

/// Characters that are illegal in file names on at least one common platform.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Build `"{YYYY-MM-DD}_{Subject_Words}"` (or `"nodate_…"`).
pub fn base_name(date: Option<&DateTime<FixedOffset>>, subject: &str) -> String {
    let date_part = date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "nodate".to_string());
    format!("{date_part}_{}", sanitize_subject(subject))
}

/// Strip illegal characters and join words with `_`.
pub fn sanitize_subject(subject: &str) -> String {
    let cleaned: String = subject
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && (c.is_whitespace() || !c.is_control()))
        .collect();

    let mut joined = String::new();
    for c in cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(MAX_SUBJECT_LEN)
    {
        if joined.len() + c.len_utf8() > MAX_SUBJECT_BYTES {
            break;
        }
        joined.push(c);
    }

    if joined.is_empty() {
        "no_subject".to_string()
    } else {
        joined
    }
}

/// Atomically create a new file `{base}.{ext}` in `dir`.
///
/// When the name is taken, `{base}_1.{ext}`, `{base}_2.{ext}`, … are tried
/// in turn. Creation uses `create_new`, so concurrent workers never receive
/// the same path. Errors other than `AlreadyExists` are returned.
pub fn claim(dir: &Path, base: &str, ext: &str) -> Result<(PathBuf, File)> {
    let mut attempt: u64 = 0;
    loop {
        let path = dir.join(candidate(base, attempt, ext));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "Output name taken, trying next suffix");
                attempt += 1;
            }
            Err(e) => return Err(ConvertError::io(path, e)),
        }
    }
}

fn candidate(base: &str, attempt: u64, ext: &str) -> String {
    match attempt {
        0 => format!("{base}.{ext}"),
        n => format!("{base}_{n}.{ext}"),
    }
}
