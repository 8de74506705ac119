/*
 * Copyright (C) 2024 Red Hat, Inc.
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Running inspections over peer-matched file sets.
//!
//! An inspection is a plain function that gets an [`InspectionContext`]
//! for the run and the result collection to append to.  Most of them are a
//! per-file check handed to an [`InspectionDriver`], which visits every
//! selected file exactly once, even after a check has failed, and ANDs the
//! per-file outcomes together.

use crate::config::Config;
use crate::files::FileRecord;
use crate::inspections;
use crate::peers::PeerSet;
use crate::results::Results;
use either::Either;

/// Which build's files a driver walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    Before,
    #[default]
    After,
}

/// Restrict the walk by peer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerFilter {
    #[default]
    All,
    WithPeer,
    WithoutPeer,
}

impl PeerFilter {
    fn accepts(&self, file: &FileRecord) -> bool {
        match self {
            PeerFilter::All => true,
            PeerFilter::WithPeer => file.has_peer(),
            PeerFilter::WithoutPeer => !file.has_peer(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    NotStarted,
    Running,
    Complete,
}

/// A file handed to a per-file check, with its peer if it has one.
#[derive(Debug, Clone, Copy)]
pub struct FileView<'a> {
    pub peers: &'a PeerSet,
    pub side: Side,
    pub file: &'a FileRecord,
    pub peer: Option<&'a FileRecord>,
}

impl<'a> FileView<'a> {
    /// The before-build file of the pair, if any.
    pub fn before(&self) -> Option<&'a FileRecord> {
        match self.side {
            Side::Before => Some(self.file),
            Side::After => self.peer,
        }
    }

    /// The after-build file of the pair, if any.
    pub fn after(&self) -> Option<&'a FileRecord> {
        match self.side {
            Side::Before => self.peer,
            Side::After => Some(self.file),
        }
    }

    pub fn arch(&self) -> &'a str {
        self.peers.arch()
    }
}

/// Walks the selected files of every peer set in order.
#[derive(Debug)]
pub struct InspectionDriver<'a> {
    peers: &'a [PeerSet],
    side: Side,
    filter: PeerFilter,
    state: DriverState,
    visited: usize,
}

impl<'a> InspectionDriver<'a> {
    /// A driver over every after-build file.
    pub fn new(peers: &'a [PeerSet]) -> Self {
        Self {
            peers,
            side: Side::default(),
            filter: PeerFilter::default(),
            state: DriverState::NotStarted,
            visited: 0,
        }
    }

    pub fn side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    pub fn filter(mut self, filter: PeerFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Number of files the check was called for.
    pub fn visited(&self) -> usize {
        self.visited
    }

    fn views(&self) -> impl Iterator<Item = FileView<'a>> + 'a {
        let (peers, side, filter) = (self.peers, self.side, self.filter);
        peers.iter().flat_map(move |ps| {
            let files = match side {
                Side::Before => Either::Left(ps.before().iter()),
                Side::After => Either::Right(ps.after().iter()),
            };
            files.filter(move |f| filter.accepts(f)).map(move |f| {
                let peer = match side {
                    Side::Before => ps.after_peer(f),
                    Side::After => ps.before_peer(f),
                };
                FileView {
                    peers: ps,
                    side,
                    file: f,
                    peer,
                }
            })
        })
    }

    /// Call `check` for every selected file.  Returns true only if every
    /// call returned true.  Never stops early.
    pub fn run<F>(&mut self, mut check: F) -> bool
    where
        F: FnMut(&FileView<'a>) -> bool,
    {
        assert_eq!(self.state, DriverState::NotStarted, "driver already ran");
        self.state = DriverState::Running;
        let mut result = true;
        for view in self.views() {
            let ok = check(&view);
            result &= ok;
            self.visited += 1;
        }
        self.state = DriverState::Complete;
        result
    }
}

/// Everything an inspection may look at during one run.
#[derive(Debug, Clone, Copy)]
pub struct InspectionContext<'a> {
    pub config: &'a Config,
    pub peers: &'a [PeerSet],
}

impl<'a> InspectionContext<'a> {
    pub fn new(config: &'a Config, peers: &'a [PeerSet]) -> Self {
        Self { config, peers }
    }

    /// A driver over this run's peer sets.
    pub fn driver(&self) -> InspectionDriver<'a> {
        InspectionDriver::new(self.peers)
    }

    /// True if the run has a before build at all.
    pub fn has_before(&self) -> bool {
        self.peers.iter().any(|ps| !ps.before().is_empty())
    }
}

/// A registered inspection.
#[derive(Clone, Copy)]
pub struct Inspection {
    pub name: &'static str,
    pub description: &'static str,
    /// Only meaningful when comparing two builds.
    pub needs_before: bool,
    pub run: fn(&InspectionContext<'_>, &mut Results) -> bool,
}

/// All inspections, in the order they run.
pub static INSPECTIONS: &[Inspection] = &[
    Inspection {
        name: "addedfiles",
        description: "Report files added in the after build.",
        needs_before: true,
        run: inspections::added::inspect_addedfiles,
    },
    Inspection {
        name: "removedfiles",
        description: "Report files removed in the after build.",
        needs_before: true,
        run: inspections::removed::inspect_removedfiles,
    },
    Inspection {
        name: "movedfiles",
        description: "Report files that moved to a new path or subpackage.",
        needs_before: true,
        run: inspections::moved::inspect_movedfiles,
    },
    Inspection {
        name: "permissions",
        description: "Report permission changes, especially setuid and setgid bits.",
        needs_before: false,
        run: inspections::permissions::inspect_permissions,
    },
    Inspection {
        name: "ownership",
        description: "Report changes to the user and group owning a file.",
        needs_before: true,
        run: inspections::ownership::inspect_ownership,
    },
];

pub fn lookup(name: &str) -> Option<&'static Inspection> {
    INSPECTIONS.iter().find(|i| i.name == name)
}

/// Run the enabled inspections (optionally only those named in `only`),
/// one after the other.  Returns true if all of them passed.
pub fn run_inspections(ctx: &InspectionContext<'_>, only: &[String], results: &mut Results) -> bool {
    let mut result = true;
    for inspection in INSPECTIONS {
        if !only.is_empty() && !only.iter().any(|n| n == inspection.name) {
            continue;
        }
        if !ctx.config.is_enabled(inspection.name) {
            tracing::debug!("{} disabled by configuration", inspection.name);
            continue;
        }
        if inspection.needs_before && !ctx.has_before() {
            tracing::debug!("{} skipped: no before build", inspection.name);
            continue;
        }
        tracing::debug!("running {}", inspection.name);
        let ok = (inspection.run)(ctx, results);
        if !ok {
            tracing::debug!("{} failed", inspection.name);
        }
        result &= ok;
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::files::testutil::*;
    use crate::files::PackageFileSet;
    use crate::peers::MatchOptions;
    use crate::results::{ResultParams, Severity};

    fn fixture() -> Vec<PeerSet> {
        let hb = header("foo", "1.0", "1", "x86_64");
        let ha = header("foo", "1.0", "2", "x86_64");
        let before: PackageFileSet = [
            regfile(&hb, "/usr/bin/foo", "application/x-executable"),
            regfile(&hb, "/usr/bin/old", "text/x-shellscript"),
        ]
        .into_iter()
        .collect();
        let after: PackageFileSet = [
            regfile(&ha, "/usr/bin/foo", "application/x-executable"),
            regfile(&ha, "/usr/bin/new", "text/x-shellscript"),
            regfile(&ha, "/usr/share/foo/data", "text/plain"),
        ]
        .into_iter()
        .collect();
        vec![PeerSet::new("x86_64", before, after, &MatchOptions::default())]
    }

    #[test]
    fn test_visits_everything() {
        let peers = fixture();
        let mut d = InspectionDriver::new(&peers);
        assert_eq!(d.state(), DriverState::NotStarted);
        let mut calls = 0;
        let ok = d.run(|_| {
            calls += 1;
            false
        });
        assert!(!ok);
        assert_eq!(calls, 3);
        assert_eq!(d.visited(), 3);
        assert_eq!(d.state(), DriverState::Complete);
    }

    #[test]
    fn test_filters() {
        let peers = fixture();
        let count = |side, filter| {
            let mut d = InspectionDriver::new(&peers).side(side).filter(filter);
            assert!(d.run(|_| true));
            d.visited()
        };
        assert_eq!(count(Side::After, PeerFilter::WithPeer), 1);
        assert_eq!(count(Side::After, PeerFilter::WithoutPeer), 2);
        assert_eq!(count(Side::Before, PeerFilter::All), 2);
        assert_eq!(count(Side::Before, PeerFilter::WithoutPeer), 1);
    }

    #[test]
    fn test_views() {
        let peers = fixture();
        let mut d = InspectionDriver::new(&peers)
            .side(Side::Before)
            .filter(PeerFilter::WithPeer);
        d.run(|v| {
            assert_eq!(v.before().unwrap().localpath, "/usr/bin/foo");
            assert_eq!(v.after().unwrap().header.release, "2");
            assert_eq!(v.arch(), "x86_64");
            true
        });
    }

    #[test]
    fn test_mixed_results() {
        let peers = fixture();
        let mut results = Results::new();
        let params = ResultParams::new("test");
        let mut d = InspectionDriver::new(&peers);
        let ok = d.run(|v| {
            if v.file.localpath == "/usr/bin/new" {
                results.add(params.clone().severity(Severity::Verify).file(&v.file.localpath));
                return false;
            }
            true
        });
        assert!(!ok);
        assert_eq!(d.visited(), 3);
        assert_eq!(results.len(), 1);
    }

    #[test]
    #[should_panic(expected = "driver already ran")]
    fn test_run_once() {
        let peers = fixture();
        let mut d = InspectionDriver::new(&peers);
        d.run(|_| true);
        d.run(|_| true);
    }

    #[test]
    fn test_registry() {
        assert!(lookup("addedfiles").is_some());
        assert!(lookup("virus").is_none());
        let mut names: Vec<_> = INSPECTIONS.iter().map(|i| i.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), INSPECTIONS.len());
    }

    #[test]
    fn test_run_only_selected() {
        let peers = fixture();
        let config = Config::default();
        let ctx = InspectionContext::new(&config, &peers);
        let mut results = Results::new();
        run_inspections(&ctx, &["removedfiles".to_string()], &mut results);
        assert_eq!(results.headers(), vec!["removedfiles"]);
    }

    #[test]
    fn test_no_before_build() {
        let h = header("foo", "1.0", "1", "x86_64");
        let after: PackageFileSet = [regfile(&h, "/usr/bin/foo", "application/x-executable")]
            .into_iter()
            .collect();
        let peers = vec![PeerSet::new(
            "x86_64",
            PackageFileSet::new(),
            after,
            &MatchOptions::default(),
        )];
        let config = Config::default();
        let ctx = InspectionContext::new(&config, &peers);
        let mut results = Results::new();
        assert!(run_inspections(&ctx, &[], &mut results));
        assert_eq!(results.headers(), vec!["permissions"]);
    }
}
