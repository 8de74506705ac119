/*
 * Copyright (C) 2024 Red Hat, Inc.
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Extracted payload members and the per-build sets they live in.
//!
//! A [`FileRecord`] is created once per payload member during extraction
//! and lives until the run ends.  The only state that changes after
//! extraction is the peer link, which the peer matcher writes exactly once;
//! everything downstream of the matcher only reads it.

use crate::fileinfo;
use crate::header::{FileFlags, PackageHeader};
use crate::peers::MatchKind;
use camino::{Utf8Path, Utf8PathBuf};
use once_cell::unsync::OnceCell;
use rustix::fs::FileType;
use std::sync::Arc;

const SETUID: u32 = 0o4000;
const SETGID: u32 = 0o2000;
const PERMISSION_BITS: u32 = 0o7777;

/// Snapshot of `lstat()` taken at extraction time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStat {
    pub mode: u32,
    pub size: u64,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
}

impl FileStat {
    pub fn file_type(&self) -> FileType {
        FileType::from_raw_mode(self.mode)
    }

    pub fn is_regular(&self) -> bool {
        self.file_type() == FileType::RegularFile
    }

    pub fn is_dir(&self) -> bool {
        self.file_type() == FileType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type() == FileType::Symlink
    }

    /// Permission bits including setuid, setgid and sticky.
    pub fn permissions(&self) -> u32 {
        self.mode & PERMISSION_BITS
    }

    pub fn is_setuid_or_setgid(&self) -> bool {
        self.mode & (SETUID | SETGID) != 0
    }
}

/// One extracted payload member.
#[derive(Debug)]
pub struct FileRecord {
    /// Path as installed, e.g. `/usr/lib64/libfoo.so.1`.  Unique within a build.
    pub localpath: String,
    /// Where the extracted copy lives on disk.
    pub fullpath: Utf8PathBuf,
    pub stat: FileStat,
    /// The header of the package that owns this file.
    pub header: Arc<PackageHeader>,
    /// Index into the header's per-file arrays.
    pub header_index: Option<usize>,
    pub flags: FileFlags,
    mime: OnceCell<Option<String>>,
    checksum: OnceCell<Option<String>>,
    peer: Option<usize>,
    moved_path: bool,
    moved_subpackage: bool,
    matched_by: Option<MatchKind>,
    duplicate: bool,
}

impl FileRecord {
    pub fn new(
        localpath: impl Into<String>,
        fullpath: impl Into<Utf8PathBuf>,
        stat: FileStat,
        header: Arc<PackageHeader>,
    ) -> Self {
        Self {
            localpath: localpath.into(),
            fullpath: fullpath.into(),
            stat,
            header,
            header_index: None,
            flags: FileFlags::empty(),
            mime: OnceCell::new(),
            checksum: OnceCell::new(),
            peer: None,
            moved_path: false,
            moved_subpackage: false,
            matched_by: None,
            duplicate: false,
        }
    }

    /// Point this record at entry `idx` of its header's file arrays, picking
    /// up the file flags recorded there.
    pub fn with_header_index(mut self, idx: usize) -> Self {
        if let Some(hf) = self.header.file(idx) {
            self.flags = hf.flags;
        }
        self.header_index = Some(idx);
        self
    }

    /// Seed the MIME type cache, e.g. from a manifest.
    pub fn with_mime(self, mime: impl Into<String>) -> Self {
        let _ = self.mime.set(Some(mime.into()));
        self
    }

    /// Seed the checksum cache with a known hex SHA-256.
    pub fn with_checksum(self, checksum: impl Into<String>) -> Self {
        let _ = self.checksum.set(Some(checksum.into()));
        self
    }

    pub fn arch(&self) -> &str {
        self.header.arch()
    }

    pub fn package_name(&self) -> &str {
        self.header.name()
    }

    pub fn is_regular(&self) -> bool {
        self.stat.is_regular()
    }

    pub fn basename(&self) -> &str {
        Utf8Path::new(&self.localpath)
            .file_name()
            .unwrap_or(self.localpath.as_str())
    }

    /// The MIME type of the extracted copy; computed on first use.
    /// Returns `None` if it could not be determined.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime
            .get_or_init(|| match fileinfo::mime_type(&self.fullpath) {
                Ok(m) => Some(m),
                Err(e) => {
                    tracing::warn!("{e:#}");
                    None
                }
            })
            .as_deref()
    }

    /// Hex SHA-256 of the extracted copy.  Computed on first use unless
    /// it was seeded from a SHA-256 header digest.
    pub fn checksum(&self) -> Option<&str> {
        self.checksum
            .get_or_init(|| {
                if !self.is_regular() {
                    return None;
                }
                match fileinfo::sha256(&self.fullpath) {
                    Ok(c) => Some(c),
                    Err(e) => {
                        tracing::warn!("{e:#}");
                        None
                    }
                }
            })
            .as_deref()
    }

    /// Capability set from the header, if any.
    pub fn capabilities(&self) -> Option<&str> {
        self.header_index
            .and_then(|i| self.header.file(i))
            .and_then(|hf| hf.caps.as_deref())
            .filter(|c| !c.is_empty())
    }

    /// Owner user and group names from the header.
    pub fn owner(&self) -> Option<(&str, &str)> {
        self.header_index
            .and_then(|i| self.header.file(i))
            .map(|hf| (hf.user.as_str(), hf.group.as_str()))
    }

    /// Index of the peer in the other build's set, if the matcher found one.
    pub fn peer(&self) -> Option<usize> {
        self.peer
    }

    pub fn has_peer(&self) -> bool {
        self.peer.is_some()
    }

    /// The path differs from the peer's.
    pub fn moved_path(&self) -> bool {
        self.moved_path
    }

    /// The owning subpackage differs from the peer's.
    pub fn moved_subpackage(&self) -> bool {
        self.moved_subpackage
    }

    /// Which heuristic produced the peer link.
    pub fn matched_by(&self) -> Option<MatchKind> {
        self.matched_by
    }

    /// An earlier file of the same build has this localpath.  Such a file
    /// never takes part in matching.
    pub fn is_duplicate(&self) -> bool {
        self.duplicate
    }
}

/// The files of one build output for one architecture, in payload order.
/// May span several subpackages.
#[derive(Debug, Default)]
pub struct PackageFileSet {
    files: Vec<FileRecord>,
}

impl PackageFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, file: FileRecord) {
        self.files.push(file);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&FileRecord> {
        self.files.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileRecord> {
        self.files.iter()
    }

    /// Linear lookup by installed path.
    pub fn find(&self, localpath: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.localpath == localpath)
    }

    /// Distinct package headers in first-appearance order.
    pub fn headers(&self) -> Vec<&Arc<PackageHeader>> {
        let mut r: Vec<&Arc<PackageHeader>> = Vec::new();
        for f in self.files.iter() {
            if !r.iter().any(|h| Arc::ptr_eq(h, &f.header)) {
                r.push(&f.header);
            }
        }
        r
    }

    /// Header of the package called `name`, falling back to the first
    /// package in the set; all subpackages of a build share a version.
    pub fn header_for_name(&self, name: &str) -> Option<&Arc<PackageHeader>> {
        self.files
            .iter()
            .map(|f| &f.header)
            .find(|h| h.name == name)
            .or_else(|| self.files.first().map(|f| &f.header))
    }
}

impl<'a> IntoIterator for &'a PackageFileSet {
    type Item = &'a FileRecord;
    type IntoIter = std::slice::Iter<'a, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

impl FromIterator<FileRecord> for PackageFileSet {
    fn from_iter<T: IntoIterator<Item = FileRecord>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Set a mutual peer link between `before[bidx]` and `after[aidx]`.
///
/// Panics if either side already has a peer: every file gets at most one.
pub(crate) fn link_peers(
    before: &mut PackageFileSet,
    bidx: usize,
    after: &mut PackageFileSet,
    aidx: usize,
    kind: MatchKind,
) {
    let b = &mut before.files[bidx];
    let a = &mut after.files[aidx];
    assert!(
        b.peer.is_none() && a.peer.is_none(),
        "peer already set linking {} -> {}",
        b.localpath,
        a.localpath
    );
    let moved_path = b.localpath != a.localpath;
    let moved_subpackage = kind == MatchKind::Subpackage;
    b.peer = Some(aidx);
    a.peer = Some(bidx);
    for f in [b, a] {
        f.moved_path = moved_path;
        f.moved_subpackage = moved_subpackage;
        f.matched_by = Some(kind);
    }
}

/// Flag the files at `idxs` as repeats of an earlier localpath.
pub(crate) fn mark_duplicates(set: &mut PackageFileSet, idxs: &[usize]) {
    for &i in idxs {
        if let Some(f) = set.files.get_mut(i) {
            f.duplicate = true;
        }
    }
}
