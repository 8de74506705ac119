/*
 * Copyright (C) 2024 Red Hat, Inc.
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Build-to-build RPM comparison.
//!
//! The files of a "before" and an "after" build are paired up into peers
//! ([`peers`]), then every inspection walks the paired sets through the
//! same driver ([`inspect`]) and appends its findings to one [`results::Results`].

mod cmdutils;
pub mod cli;
pub mod config;
pub mod extract;
pub mod fileinfo;
pub mod files;
pub mod generic;
pub mod header;
pub mod inspect;
mod inspections;
pub mod manifest;
pub mod pathindex;
pub mod peers;
pub mod report;
pub mod results;
pub mod utils;

pub use crate::files::{FileRecord, PackageFileSet};
pub use crate::peers::{MatchKind, MatchOptions, PeerSet};
pub use crate::results::{Results, Severity, WaiverAuth};
