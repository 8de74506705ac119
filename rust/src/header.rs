//! RPM header metadata that file records point back into.

/*
 * Copyright (C) 2024 Red Hat, Inc.
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Per-file flag bits as stored in `RPMTAG_FILEFLAGS`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileFlags: u32 {
        const CONFIG = 1 << 0;
        const DOC = 1 << 1;
        const ICON = 1 << 2;
        const MISSINGOK = 1 << 3;
        const NOREPLACE = 1 << 4;
        const SPECFILE = 1 << 5;
        const GHOST = 1 << 6;
        const LICENSE = 1 << 7;
        const README = 1 << 8;
        const PUBKEY = 1 << 11;
        const ARTIFACT = 1 << 12;
    }
}

/// One entry of the header's per-file arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFile {
    pub path: String,
    pub flags: FileFlags,
    pub user: String,
    pub group: String,
    /// Textual capability set, e.g. `cap_net_raw=ep`.
    pub caps: Option<String>,
    pub digest: Option<String>,
}

/// The subset of an RPM header the peer matcher and inspections consult.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageHeader {
    pub name: String,
    pub epoch: Option<u32>,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub sourcerpm: Option<String>,
    pub files: Vec<HeaderFile>,
}

impl PackageHeader {
    pub fn new(name: &str, version: &str, release: &str, arch: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// The `version-release` compound used for path substitution.
    pub fn version_release(&self) -> String {
        format!("{}-{}", self.version, self.release)
    }

    /// Name-Version-Release.
    pub fn nvr(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.release)
    }

    pub fn file(&self, idx: usize) -> Option<&HeaderFile> {
        self.files.get(idx)
    }
}

impl fmt::Display for PackageHeader {
    /// Formats as NEVRA; the epoch is only shown when set.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.epoch {
            Some(epoch) => write!(
                f,
                "{}-{}:{}-{}.{}",
                self.name, epoch, self.version, self.release, self.arch
            ),
            None => write!(
                f,
                "{}-{}-{}.{}",
                self.name, self.version, self.release, self.arch
            ),
        }
    }
}
