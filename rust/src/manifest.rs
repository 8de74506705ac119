/*
 * Copyright (C) 2024 Red Hat, Inc.
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Serialized form of an extracted build.
//!
//! A build is a list of packages, each with its header fields and the
//! payload members in payload order:
//!
//! ```yaml
//! packages:
//!   - name: foo
//!     version: "1.0"
//!     release: "1.fc40"
//!     arch: x86_64
//!     files:
//!       - localpath: /usr/bin/foo
//!         mode: 0o100755
//!         mime: application/x-executable
//! ```
//!
//! Extraction writes this; the matcher can be fed from it without an RPM
//! in sight.

use crate::fileinfo;
use crate::files::{FileRecord, FileStat, PackageFileSet};
use crate::header::{FileFlags, HeaderFile, PackageHeader};
use crate::peers::{MatchOptions, PeerSet};
use crate::utils;
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use fn_error_context::context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

fn default_nlink() -> u64 {
    1
}

fn default_owner() -> String {
    "root".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildManifest {
    /// Directory the payloads were extracted to, relative to the manifest
    /// file.  Files without a fullpath live below it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Utf8PathBuf>,
    #[serde(default)]
    pub packages: Vec<PackageManifest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u32>,
    pub version: String,
    pub release: String,
    pub arch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcerpm: Option<String>,
    #[serde(default)]
    pub files: Vec<FileManifest>,
}

/// One payload member.  `mode` is the full `st_mode`, file type included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileManifest {
    pub localpath: String,
    /// Location of the extracted copy.  When unset, `localpath` itself;
    /// see [`BuildManifest::set_root`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullpath: Option<Utf8PathBuf>,
    pub mode: u32,
    #[serde(default)]
    pub size: u64,
    #[serde(default = "default_nlink")]
    pub nlink: u64,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
    /// Raw `RPMTAG_FILEFLAGS` bits.
    #[serde(default)]
    pub flags: u32,
    #[serde(default = "default_owner")]
    pub user: String,
    #[serde(default = "default_owner")]
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl BuildManifest {
    /// Parse a manifest file (YAML or JSON, by extension) and resolve its
    /// root.
    #[context("Loading manifest {path}")]
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let mut m: BuildManifest = utils::parse_file(path)?;
        if let Some(root) = m.root.take() {
            let root = path.parent().unwrap_or(Utf8Path::new(".")).join(root);
            m.set_root(&root);
            m.root = Some(root);
        }
        Ok(m)
    }

    /// Append the packages of `other`, keeping their order.
    pub fn extend(&mut self, other: BuildManifest) {
        self.packages.extend(other.packages);
    }

    pub fn file_count(&self) -> usize {
        self.packages.iter().map(|p| p.files.len()).sum()
    }

    /// Place files without an explicit fullpath below `root`.
    pub fn set_root(&mut self, root: &Utf8Path) {
        for f in self.packages.iter_mut().flat_map(|p| p.files.iter_mut()) {
            if f.fullpath.is_none() {
                f.fullpath = Some(root.join(f.localpath.trim_start_matches('/')));
            }
        }
    }
}

impl FileManifest {
    fn stat(&self) -> FileStat {
        FileStat {
            mode: self.mode,
            size: self.size,
            nlink: self.nlink,
            uid: self.uid,
            gid: self.gid,
        }
    }

    fn header_file(&self) -> HeaderFile {
        HeaderFile {
            path: self.localpath.clone(),
            flags: FileFlags::from_bits_retain(self.flags),
            user: self.user.clone(),
            group: self.group.clone(),
            caps: self.caps.clone(),
            digest: self.digest.clone(),
        }
    }

    fn fullpath(&self) -> Utf8PathBuf {
        self.fullpath
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from(&self.localpath))
    }
}

impl PackageManifest {
    /// The header this package's records point back into.
    pub fn header(&self) -> PackageHeader {
        PackageHeader {
            name: self.name.clone(),
            epoch: self.epoch,
            version: self.version.clone(),
            release: self.release.clone(),
            arch: self.arch.clone(),
            sourcerpm: self.sourcerpm.clone(),
            files: self.files.iter().map(FileManifest::header_file).collect(),
        }
    }

    /// One record per payload member, in manifest order.
    pub fn records(&self) -> Vec<FileRecord> {
        let header = Arc::new(self.header());
        self.files
            .iter()
            .enumerate()
            .map(|(i, fm)| {
                let mut r = FileRecord::new(
                    fm.localpath.as_str(),
                    fm.fullpath(),
                    fm.stat(),
                    Arc::clone(&header),
                )
                .with_header_index(i);
                if let Some(mime) = fm.mime.as_deref() {
                    r = r.with_mime(mime);
                }
                let digest = fm.digest.as_deref().filter(|d| fileinfo::is_sha256_hex(d));
                if let Some(digest) = digest {
                    r = r.with_checksum(digest);
                }
                r
            })
            .collect()
    }
}

impl PackageFileSet {
    /// All records of `packages`, package by package, each in payload order.
    pub fn from_packages<'a>(packages: impl IntoIterator<Item = &'a PackageManifest>) -> Self {
        packages.into_iter().flat_map(|p| p.records()).collect()
    }
}

/// Split a build into one file set per architecture.
pub fn group_by_arch(build: &BuildManifest) -> BTreeMap<String, PackageFileSet> {
    let mut by_arch: BTreeMap<&str, Vec<&PackageManifest>> = BTreeMap::new();
    for p in build.packages.iter() {
        by_arch.entry(p.arch.as_str()).or_default().push(p);
    }
    by_arch
        .into_iter()
        .map(|(arch, pkgs)| (arch.to_string(), PackageFileSet::from_packages(pkgs)))
        .collect()
}

/// Match two builds architecture by architecture.  An architecture
/// present on only one side gets an empty set on the other.
pub fn peer_sets(before: &BuildManifest, after: &BuildManifest, opts: &MatchOptions) -> Vec<PeerSet> {
    let mut before = group_by_arch(before);
    let mut after = group_by_arch(after);
    let mut arches: Vec<String> = before.keys().chain(after.keys()).cloned().collect();
    arches.sort();
    arches.dedup();
    arches
        .into_iter()
        .map(|arch| {
            let b = before.remove(&arch).unwrap_or_default();
            let a = after.remove(&arch).unwrap_or_default();
            tracing::debug!("matching {arch}: {} before, {} after", b.len(), a.len());
            PeerSet::new(arch, b, a, opts)
        })
        .collect()
}
