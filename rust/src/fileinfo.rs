//! Content helpers for extracted files: MIME type and checksum.
//!
//! These are treated as pure functions of the file contents; callers
//! cache the answers on the file record.

// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::cmdutils::CommandRunExt;
use anyhow::{Context, Result};
use camino::Utf8Path;
use fn_error_context::context;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::BufReader;
use std::process::Command;

/// Returned by `file(1)` for things it cannot classify further.
pub const MIME_UNKNOWN: &str = "application/octet-stream";

/// Determine the MIME type of a file by asking `file(1)`.
#[context("Detecting MIME type of {path}")]
pub fn mime_type(path: &Utf8Path) -> Result<String> {
    let out = Command::new("file")
        .args(["--brief", "--mime-type", "--no-dereference"])
        .arg(path.as_str())
        .log_debug()
        .run_get_string()?;
    let out = out.trim();
    if out.is_empty() {
        return Ok(MIME_UNKNOWN.to_string());
    }
    Ok(out.to_string())
}

/// Whether `digest` is a hex encoded SHA-256.  Older packages carry MD5
/// file digests, which must not stand in for one.
pub fn is_sha256_hex(digest: &str) -> bool {
    digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Hex encoded SHA-256 of a file's contents.
#[context("Computing checksum of {path}")]
pub fn sha256(path: &Utf8Path) -> Result<String> {
    let f = File::open(path).with_context(|| format!("Failed to open {path}"))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    std::io::copy(&mut r, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
