//! Inspection findings.
//!
//! Findings are appended in the order inspections report them and are
//! never changed or removed afterwards; the reporters depend on that order
//! to group output by header.

// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::{anyhow, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// How bad a finding is.  `Ok < Info < Verify < Bad`; `Skip` and `Waived`
/// sit outside that scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Ok,
    Info,
    Verify,
    Bad,
    Skip,
    Waived,
}

impl Severity {
    /// Position on the severity scale, `None` for the out-of-band values.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Severity::Ok => Some(0),
            Severity::Info => Some(1),
            Severity::Verify => Some(2),
            Severity::Bad => Some(3),
            Severity::Skip | Severity::Waived => None,
        }
    }

    /// True if this is on the scale and not below `threshold`.
    pub fn meets(&self, threshold: Severity) -> bool {
        match (self.rank(), threshold.rank()) {
            (Some(a), Some(b)) => a >= b,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Info => "INFO",
            Severity::Verify => "VERIFY",
            Severity::Bad => "BAD",
            Severity::Skip => "SKIP",
            Severity::Waived => "WAIVED",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let r = match s.to_ascii_uppercase().as_str() {
            "OK" => Severity::Ok,
            "INFO" => Severity::Info,
            "VERIFY" => Severity::Verify,
            "BAD" => Severity::Bad,
            "SKIP" => Severity::Skip,
            "WAIVED" => Severity::Waived,
            _ => return Err(anyhow!("Unknown severity: {s}")),
        };
        Ok(r)
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for Severity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Who may waive a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WaiverAuth {
    #[default]
    NotWaivable,
    WaivableByAnyone,
    WaivableBySecurity,
}

impl WaiverAuth {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaiverAuth::NotWaivable => "Not Waivable",
            WaiverAuth::WaivableByAnyone => "Anyone",
            WaiverAuth::WaivableBySecurity => "Security",
        }
    }
}

impl fmt::Display for WaiverAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for WaiverAuth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// What happened to the thing a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    #[default]
    Nil,
    Ok,
    Added,
    Removed,
    Changed,
    Failed,
}

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultEntry {
    #[serde(skip)]
    pub header: String,
    #[serde(rename = "result")]
    pub severity: Severity,
    #[serde(rename = "waiver authorization")]
    pub waiverauth: WaiverAuth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remedy: Option<String>,
    #[serde(skip_serializing_if = "is_nil")]
    pub verb: Verb,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noun: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn is_nil(v: &Verb) -> bool {
    *v == Verb::Nil
}

/// Builder for [`ResultEntry`].  Each inspection starts from a fresh one
/// for its header and clones it per finding.
#[derive(Debug, Clone)]
pub struct ResultParams {
    entry: ResultEntry,
}

impl ResultParams {
    pub fn new(header: &str) -> Self {
        Self {
            entry: ResultEntry {
                header: header.to_string(),
                severity: Severity::Ok,
                waiverauth: WaiverAuth::NotWaivable,
                message: None,
                details: None,
                remedy: None,
                verb: Verb::Nil,
                noun: None,
                arch: None,
                file: None,
            },
        }
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.entry.severity = severity;
        self
    }

    pub fn waiverauth(mut self, waiverauth: WaiverAuth) -> Self {
        self.entry.waiverauth = waiverauth;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.entry.message = Some(message.into());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.entry.details = Some(details.into());
        self
    }

    pub fn remedy(mut self, remedy: impl Into<String>) -> Self {
        self.entry.remedy = Some(remedy.into());
        self
    }

    pub fn verb(mut self, verb: Verb) -> Self {
        self.entry.verb = verb;
        self
    }

    pub fn noun(mut self, noun: impl Into<String>) -> Self {
        self.entry.noun = Some(noun.into());
        self
    }

    pub fn arch(mut self, arch: impl Into<String>) -> Self {
        self.entry.arch = Some(arch.into());
        self
    }

    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.entry.file = Some(file.into());
        self
    }

    pub fn build(self) -> ResultEntry {
        self.entry
    }
}

/// Append-only, ordered collection of findings for one run.
#[derive(Debug, Default, Clone)]
pub struct Results {
    entries: Vec<ResultEntry>,
    worst: Option<Severity>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, params: ResultParams) {
        let entry = params.build();
        tracing::trace!(header = %entry.header, severity = %entry.severity, "result");
        if entry.severity.rank().is_some()
            && self
                .worst
                .map_or(true, |w| entry.severity.rank() > w.rank())
        {
            self.worst = Some(entry.severity);
        }
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultEntry> {
        self.entries.iter()
    }

    /// Findings for one header, in insertion order.
    pub fn iter_by_header<'a>(&'a self, header: &'a str) -> impl Iterator<Item = &'a ResultEntry> {
        self.entries.iter().filter(move |e| e.header == header)
    }

    /// Distinct headers in the order they first appeared.
    pub fn headers(&self) -> Vec<&str> {
        let mut r: Vec<&str> = Vec::new();
        for e in self.entries.iter() {
            if !r.contains(&e.header.as_str()) {
                r.push(e.header.as_str());
            }
        }
        r
    }

    /// Highest on-scale severity seen so far.
    pub fn worst(&self) -> Option<Severity> {
        self.worst
    }

    /// True if any finding reaches `threshold`.
    pub fn exceeds(&self, threshold: Severity) -> bool {
        self.worst.is_some_and(|w| w.meets(threshold))
    }
}

impl<'a> IntoIterator for &'a Results {
    type Item = &'a ResultEntry;
    type IntoIter = std::slice::Iter<'a, ResultEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
