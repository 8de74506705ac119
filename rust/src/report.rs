//! Render results for humans (text) or machines (JSON).
//!
//! Both formats group findings by inspection header, headers in the order
//! they first reported something, findings in the order they were added.

// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::results::{ResultEntry, Results};
use anyhow::Result;
use serde::ser::{Serialize, Serializer};
use std::io::Write;

/// Output format of the `inspect` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    #[default]
    Text,
    Json,
}

fn write_entry(w: &mut impl Write, n: usize, e: &ResultEntry) -> Result<()> {
    match e.message.as_deref() {
        Some(msg) => writeln!(w, "{n}) {msg}")?,
        None => writeln!(w, "{n}) {}", e.severity)?,
    }
    writeln!(w)?;
    writeln!(w, "Result: {}", e.severity)?;
    if let Some(file) = e.file.as_deref() {
        writeln!(w, "File: {file}")?;
    }
    if let Some(arch) = e.arch.as_deref() {
        writeln!(w, "Architecture: {arch}")?;
    }
    writeln!(w, "Waiver Authorization: {}", e.waiverauth)?;
    if let Some(details) = e.details.as_deref() {
        writeln!(w, "\nDetails:\n{details}")?;
    }
    if let Some(remedy) = e.remedy.as_deref() {
        writeln!(w, "\nSuggested Remedy:\n{remedy}")?;
    }
    writeln!(w)?;
    Ok(())
}

/// Plain text, one section per header.
pub fn write_text(results: &Results, w: &mut impl Write) -> Result<()> {
    for (i, header) in results.headers().into_iter().enumerate() {
        if i > 0 {
            writeln!(w)?;
        }
        writeln!(w, "{header}:")?;
        writeln!(w, "{}", "-".repeat(header.len() + 1))?;
        for (n, e) in results.iter_by_header(header).enumerate() {
            write_entry(w, n + 1, e)?;
        }
    }
    if let Some(worst) = results.worst() {
        writeln!(w, "Overall result: {worst}")?;
    }
    Ok(())
}

struct ByHeader<'a>(&'a Results);

impl Serialize for ByHeader<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let results = self.0;
        serializer.collect_map(
            results
                .headers()
                .into_iter()
                .map(|h| (h, results.iter_by_header(h).collect::<Vec<_>>())),
        )
    }
}

/// A JSON object mapping each header to its list of findings.
pub fn write_json(results: &Results, w: &mut impl Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *w, &ByHeader(results))?;
    writeln!(w)?;
    Ok(())
}

pub fn write(results: &Results, format: Format, w: &mut impl Write) -> Result<()> {
    match format {
        Format::Text => write_text(results, w),
        Format::Json => write_json(results, w),
    }
}
