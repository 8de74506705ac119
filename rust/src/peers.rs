/*
 * Copyright (C) 2024 Red Hat, Inc.
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Pairing files of the "before" build with files of the "after" build.
//!
//! For every before file we try, in order:
//!
//!   - the same path in the after build
//!   - the path with the before version replaced by the after version
//!   - the same with the full `version-release`
//!   - for regular files only, a scan of the after files still available,
//!     looking for either the same file moved into another subpackage, or a
//!     versioned shared library / kernel module whose generalized path (see
//!     [`crate::generic`]) is the same.
//!
//! Matching is destructive on the after side: once an after file is taken
//! it cannot be taken again, so the before-list order decides who wins a
//! contested file.  That order is payload order and is never rearranged;
//! the same input always produces the same pairs.
//!
//! A before file left without a peer was removed, an after file left
//! without one was added.  Reporting either is up to the inspections.

use crate::files::{self, FileRecord, PackageFileSet};
use crate::pathindex::PathIndex;
use serde::Serialize;
use std::fmt;

/// Every build-id link relocates when the binary changes.
pub const BUILD_ID_DIR: &str = "/usr/lib/.build-id/";
/// Substring identifying versioned shared libraries.
pub const SHARED_LIB_MARKER: &str = ".so";
/// Directories holding kernel modules.
pub const KERNEL_MODULE_DIRS: &[&str] = &["/lib/modules/", "/usr/lib/modules/"];
const KERNEL_MODULE_EXTENSIONS: &[&str] = &[".ko", ".ko.gz", ".ko.xz", ".ko.zst", ".ko.bz2"];

/// How a pair of peers was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchKind {
    ExactPath,
    Version,
    VersionRelease,
    Subpackage,
    Generalized,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::ExactPath => "exact-path",
            MatchKind::Version => "version",
            MatchKind::VersionRelease => "version-release",
            MatchKind::Subpackage => "subpackage",
            MatchKind::Generalized => "generalized",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables for the move detection heuristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOptions {
    pub build_id_dir: String,
    pub shared_lib_marker: String,
    pub kernel_module_dirs: Vec<String>,
    pub debug_marker: String,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            build_id_dir: BUILD_ID_DIR.to_string(),
            shared_lib_marker: SHARED_LIB_MARKER.to_string(),
            kernel_module_dirs: KERNEL_MODULE_DIRS.iter().map(|s| s.to_string()).collect(),
            debug_marker: crate::generic::DEBUG_MARKER.to_string(),
        }
    }
}

impl MatchOptions {
    pub(crate) fn is_shared_lib(&self, path: &str) -> bool {
        path.contains(self.shared_lib_marker.as_str())
    }

    fn is_kernel_module(&self, path: &str) -> bool {
        self.kernel_module_dirs
            .iter()
            .any(|d| path.starts_with(d.as_str()))
            && KERNEL_MODULE_EXTENSIONS.iter().any(|e| path.ends_with(e))
    }

    pub(crate) fn is_build_id(&self, path: &str) -> bool {
        !self.build_id_dir.is_empty() && path.starts_with(self.build_id_dir.as_str())
    }

    fn generalize(&self, path: &str, arch: &str) -> String {
        crate::generic::generalize_with_marker(path, Some(arch), &self.debug_marker)
    }
}

/// Counts of how each before file fared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub exact: usize,
    pub version: usize,
    pub version_release: usize,
    pub subpackage: usize,
    pub generalized: usize,
    pub unmatched: usize,
}

impl MatchSummary {
    fn record(&mut self, kind: Option<MatchKind>) {
        let counter = match kind {
            Some(MatchKind::ExactPath) => &mut self.exact,
            Some(MatchKind::Version) => &mut self.version,
            Some(MatchKind::VersionRelease) => &mut self.version_release,
            Some(MatchKind::Subpackage) => &mut self.subpackage,
            Some(MatchKind::Generalized) => &mut self.generalized,
            None => &mut self.unmatched,
        };
        *counter += 1;
    }

    pub fn matched(&self) -> usize {
        self.exact + self.version + self.version_release + self.subpackage + self.generalized
    }
}

/// Substitute `from` by `to` in `path` when the two differ and `path`
/// actually contains `from`.
fn substituted(path: &str, from: &str, to: &str) -> Option<String> {
    if from.is_empty() || from == to || !path.contains(from) {
        return None;
    }
    Some(path.replace(from, to))
}

/// Try the path based heuristics for one before file.
fn find_by_path(
    file: &FileRecord,
    after: &PackageFileSet,
    index: &mut PathIndex,
) -> Option<(usize, MatchKind)> {
    if let Some(i) = index.lookup_and_consume(&file.localpath) {
        return Some((i, MatchKind::ExactPath));
    }
    let theirs = after.header_for_name(file.package_name())?;
    let ours = &file.header;

    if let Some(path) = substituted(&file.localpath, ours.version(), theirs.version()) {
        if let Some(i) = index.lookup_and_consume(&path) {
            return Some((i, MatchKind::Version));
        }
    }

    let (ours_vr, theirs_vr) = (ours.version_release(), theirs.version_release());
    if let Some(path) = substituted(&file.localpath, &ours_vr, &theirs_vr) {
        if let Some(i) = index.lookup_and_consume(&path) {
            return Some((i, MatchKind::VersionRelease));
        }
    }
    None
}

/// The same content moved into a different subpackage.
///
/// The after path must end with the before path.  A path that only shares
/// the basename qualifies too, unless the before build also has a file at
/// that path: that file is the candidate's exact peer, whatever the scan
/// order.
fn is_subpackage_move(file: &FileRecord, candidate: &FileRecord, before: &PathIndex) -> bool {
    if file.package_name() == candidate.package_name() {
        return false;
    }
    let relocated = candidate.localpath.ends_with(file.localpath.as_str())
        || (candidate.basename() == file.basename() && !before.contains(&candidate.localpath));
    if !relocated {
        return false;
    }
    match (file.mime_type(), candidate.mime_type()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// A versioned shared library or kernel module whose path only differs
/// in version numbers.
fn is_generalized_match(file: &FileRecord, candidate: &FileRecord, opts: &MatchOptions) -> bool {
    let (ours, theirs) = (file.localpath.as_str(), candidate.localpath.as_str());
    let both_libs = opts.is_shared_lib(ours) && opts.is_shared_lib(theirs);
    let both_kmods = opts.is_kernel_module(ours) && opts.is_kernel_module(theirs);
    if !(both_libs || both_kmods) {
        return false;
    }
    opts.generalize(ours, file.arch()) == opts.generalize(theirs, candidate.arch())
}

/// Scan the remaining after files for a moved or renamed peer.  The first
/// candidate in after-list order wins.
fn find_moved(
    file: &FileRecord,
    after: &PackageFileSet,
    index: &mut PathIndex,
    before_index: &PathIndex,
    opts: &MatchOptions,
) -> Option<(usize, MatchKind)> {
    if !file.is_regular() || opts.is_build_id(&file.localpath) {
        return None;
    }
    let mut found = None;
    for (i, candidate) in after.iter().enumerate() {
        if !index.is_live(&candidate.localpath, i) || candidate.arch() != file.arch() {
            continue;
        }
        if is_subpackage_move(file, candidate, before_index) {
            found = Some((i, MatchKind::Subpackage));
            break;
        }
        if is_generalized_match(file, candidate, opts) {
            found = Some((i, MatchKind::Generalized));
            break;
        }
    }
    let (i, kind) = found?;
    let consumed = index.consume(&after.get(i)?.localpath, i);
    assert!(consumed, "live entry vanished");
    Some((i, kind))
}

/// Pair up `before` and `after`, setting mutual peer links on both sets.
/// Files that already have a peer are left alone, and repeated localpaths
/// on either side are flagged as duplicates and never matched.
pub fn find_peers(
    before: &mut PackageFileSet,
    after: &mut PackageFileSet,
    opts: &MatchOptions,
) -> MatchSummary {
    let before_index = PathIndex::build(before);
    let mut index = PathIndex::build(after);
    files::mark_duplicates(before, before_index.duplicates());
    files::mark_duplicates(after, index.duplicates());

    let mut summary = MatchSummary::default();
    if before.is_empty() || after.is_empty() {
        summary.unmatched = before.iter().filter(|f| !f.is_duplicate()).count();
        return summary;
    }

    for bidx in 0..before.len() {
        let found = {
            let file = match before.get(bidx) {
                Some(f) if !f.has_peer() && !f.is_duplicate() => f,
                _ => continue,
            };
            find_by_path(file, after, &mut index)
                .or_else(|| find_moved(file, after, &mut index, &before_index, opts))
        };
        match found {
            Some((aidx, kind)) => {
                if let Some(a) = after.get(aidx) {
                    tracing::trace!(
                        "peer {} -> {} ({kind})",
                        before.get(bidx).map(|f| f.localpath.as_str()).unwrap_or(""),
                        a.localpath
                    );
                }
                files::link_peers(before, bidx, after, aidx, kind);
                summary.record(Some(kind));
            }
            None => summary.record(None),
        }
    }
    tracing::debug!(
        exact = summary.exact,
        version = summary.version,
        version_release = summary.version_release,
        subpackage = summary.subpackage,
        generalized = summary.generalized,
        unmatched = summary.unmatched,
        added = index.live_count(),
        duplicates = index.duplicates().len(),
        "peer matching complete"
    );
    summary
}

/// Before and after file sets of one architecture, with peers resolved.
///
/// Matching happens in the constructor, so nothing can ever observe a
/// partially matched pair of sets.
#[derive(Debug)]
pub struct PeerSet {
    arch: String,
    before: PackageFileSet,
    after: PackageFileSet,
    summary: MatchSummary,
}

impl PeerSet {
    pub fn new(
        arch: impl Into<String>,
        mut before: PackageFileSet,
        mut after: PackageFileSet,
        opts: &MatchOptions,
    ) -> Self {
        let arch = arch.into();
        let summary = find_peers(&mut before, &mut after, opts);
        let r = Self {
            arch,
            before,
            after,
            summary,
        };
        r.assert_symmetric();
        r
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn before(&self) -> &PackageFileSet {
        &self.before
    }

    pub fn after(&self) -> &PackageFileSet {
        &self.after
    }

    pub fn summary(&self) -> &MatchSummary {
        &self.summary
    }

    /// The after peer of a before file.
    pub fn after_peer(&self, file: &FileRecord) -> Option<&FileRecord> {
        file.peer().and_then(|i| self.after.get(i))
    }

    /// The before peer of an after file.
    pub fn before_peer(&self, file: &FileRecord) -> Option<&FileRecord> {
        file.peer().and_then(|i| self.before.get(i))
    }

    /// All matched pairs as (before, after), in before order.
    pub fn pairs(&self) -> impl Iterator<Item = (&FileRecord, &FileRecord)> {
        self.before
            .iter()
            .filter_map(move |b| self.after_peer(b).map(|a| (b, a)))
    }

    /// Panics unless every link has a matching link back.
    fn assert_symmetric(&self) {
        for (i, b) in self.before.iter().enumerate() {
            if let Some(a) = self.after_peer(b) {
                assert_eq!(a.peer(), Some(i), "asymmetric peer for {}", b.localpath);
            }
        }
        for (i, a) in self.after.iter().enumerate() {
            if let Some(b) = self.before_peer(a) {
                assert_eq!(b.peer(), Some(i), "asymmetric peer for {}", a.localpath);
            }
        }
    }
}
