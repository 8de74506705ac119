//! Command line front end.

// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::config::Config;
use crate::extract;
use crate::files::FileRecord;
use crate::inspect::{self, InspectionContext};
use crate::manifest::{self, BuildManifest};
use crate::peers::{MatchKind, MatchSummary, PeerSet};
use crate::report::{self, Format};
use crate::results::Results;
use anyhow::{anyhow, bail, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use serde::Serialize;
use std::io::Write;

/// Exit code when a finding reaches the failure threshold.
pub const EXIT_FAILED: i32 = 1;

#[derive(Debug, Parser)]
#[clap(name = "rpminspect", rename_all = "kebab-case", version)]
/// Compare two builds of a package and report what changed.
struct Opt {
    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, clap::Args)]
struct BuildOpts {
    /// The older build, as `.rpm` files or manifests
    #[clap(long, num_args = 1..)]
    before: Vec<Utf8PathBuf>,

    /// The newer build, as `.rpm` files or manifests
    #[clap(long, required = true, num_args = 1..)]
    after: Vec<Utf8PathBuf>,

    /// Configuration file (YAML or JSON)
    #[clap(long)]
    config: Option<Utf8PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
enum Cmd {
    /// Show how the files of the two builds were paired up.
    Peers {
        #[clap(flatten)]
        builds: BuildOpts,

        /// Print JSON instead of a table
        #[clap(long)]
        json: bool,
    },
    /// Run inspections and report the findings.
    Inspect {
        #[clap(flatten)]
        builds: BuildOpts,

        #[clap(long, value_enum, default_value_t)]
        format: Format,

        /// Only run this inspection; may be repeated
        #[clap(long = "inspection")]
        inspections: Vec<String>,
    },
    /// Unpack an RPM and print its manifest as JSON.
    Extract {
        rpm: Utf8PathBuf,

        /// Directory to unpack into
        #[clap(long)]
        dest: Utf8PathBuf,
    },
    /// List the available inspections.
    List,
}

/// Load one build from its sources; RPMs are unpacked below `workdir`.
fn load_build(sources: &[Utf8PathBuf], workdir: &Utf8Path) -> Result<BuildManifest> {
    let mut build = BuildManifest::default();
    for src in sources {
        let m = if src.extension() == Some("rpm") {
            BuildManifest {
                root: None,
                packages: vec![extract::extract_rpm(src, workdir)?],
            }
        } else {
            BuildManifest::load(src)?
        };
        build.extend(m);
    }
    Ok(build)
}

/// Everything a matching command needs; owns the unpacked payloads.
struct Session {
    config: Config,
    peers: Vec<PeerSet>,
    _workdir: tempfile::TempDir,
}

impl BuildOpts {
    fn load(&self) -> Result<Session> {
        let config = match self.config.as_deref() {
            Some(p) => Config::load(p)?,
            None => Config::default(),
        };
        let workdir = tempfile::tempdir()?;
        let root = Utf8Path::from_path(workdir.path())
            .ok_or_else(|| anyhow!("Non-UTF-8 temporary directory"))?;
        let before = load_build(&self.before, &root.join("before"))?;
        let after = load_build(&self.after, &root.join("after"))?;
        tracing::debug!(
            "loaded {} before and {} after files",
            before.file_count(),
            after.file_count()
        );
        let peers = manifest::peer_sets(&before, &after, &config.match_options());
        Ok(Session {
            config,
            peers,
            _workdir: workdir,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct PeerRow<'a> {
    before: Option<&'a str>,
    after: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched_by: Option<MatchKind>,
    moved_path: bool,
    moved_subpackage: bool,
}

#[derive(Debug, Serialize)]
struct PeerTable<'a> {
    arch: &'a str,
    summary: &'a MatchSummary,
    files: Vec<PeerRow<'a>>,
}

fn peer_row<'a>(b: Option<&'a FileRecord>, a: Option<&'a FileRecord>) -> PeerRow<'a> {
    let f = a.or(b);
    PeerRow {
        before: b.map(|f| f.localpath.as_str()),
        after: a.map(|f| f.localpath.as_str()),
        matched_by: f.and_then(|f| f.matched_by()),
        moved_path: f.is_some_and(|f| f.moved_path()),
        moved_subpackage: f.is_some_and(|f| f.moved_subpackage()),
    }
}

/// Matched and removed files in before order, then the added ones.
fn peer_table(ps: &PeerSet) -> PeerTable<'_> {
    let mut files: Vec<_> = ps
        .before()
        .iter()
        .map(|b| peer_row(Some(b), ps.after_peer(b)))
        .collect();
    files.extend(
        ps.after()
            .iter()
            .filter(|a| !a.has_peer())
            .map(|a| peer_row(None, Some(a))),
    );
    PeerTable {
        arch: ps.arch(),
        summary: ps.summary(),
        files,
    }
}

fn print_peers(peers: &[PeerSet], json: bool, w: &mut impl Write) -> Result<()> {
    let tables: Vec<_> = peers.iter().map(peer_table).collect();
    if json {
        serde_json::to_writer_pretty(&mut *w, &tables)?;
        writeln!(w)?;
        return Ok(());
    }
    for t in tables {
        writeln!(w, "# {}", t.arch)?;
        for r in t.files {
            let kind = r.matched_by.map(|k| k.as_str()).unwrap_or("-");
            writeln!(
                w,
                "{}\t{}\t{kind}",
                r.before.unwrap_or("-"),
                r.after.unwrap_or("-")
            )?;
        }
    }
    Ok(())
}

impl Cmd {
    fn run(self) -> Result<i32> {
        let stdout = std::io::stdout();
        let mut stdout = std::io::BufWriter::new(stdout.lock());
        let code = match self {
            Cmd::Peers { builds, json } => {
                let session = builds.load()?;
                print_peers(&session.peers, json, &mut stdout)?;
                0
            }
            Cmd::Inspect {
                builds,
                format,
                inspections,
            } => {
                for name in inspections.iter() {
                    if inspect::lookup(name).is_none() {
                        bail!("Unknown inspection: {name}");
                    }
                }
                let session = builds.load()?;
                let ctx = InspectionContext::new(&session.config, &session.peers);
                let mut results = Results::new();
                let passed = inspect::run_inspections(&ctx, &inspections, &mut results);
                report::write(&results, format, &mut stdout)?;
                let threshold = session.config.threshold;
                tracing::debug!("inspections passed: {passed}, worst: {:?}", results.worst());
                if results.exceeds(threshold) {
                    EXIT_FAILED
                } else {
                    0
                }
            }
            Cmd::Extract { rpm, dest } => {
                let pkg = extract::extract_rpm(&rpm, &dest)?;
                let m = BuildManifest {
                    root: None,
                    packages: vec![pkg],
                };
                serde_json::to_writer_pretty(&mut stdout, &m)?;
                writeln!(stdout)?;
                0
            }
            Cmd::List => {
                for i in inspect::INSPECTIONS {
                    writeln!(stdout, "{:<14} {}", i.name, i.description)?;
                }
                0
            }
        };
        stdout.flush()?;
        Ok(code)
    }
}

/// Parse `args` (including the program name) and run the command.
/// Returns the process exit code.
pub fn entrypoint(args: &[String]) -> Result<i32> {
    let opt = Opt::parse_from(args);
    opt.cmd.run()
}
