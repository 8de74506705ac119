//! Unpack an RPM into a directory tree and describe what landed there.
//!
//! Header data comes from `rpm -qp --queryformat`, the payload from
//! `rpm2cpio | cpio`.  The result is a [`PackageManifest`] whose records
//! carry the `lstat()` of each extracted member.

// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::cmdutils::CommandRunExt;
use crate::header::FileFlags;
use crate::manifest::{FileManifest, PackageManifest};
use anyhow::{anyhow, bail, Context, Result};
use camino::Utf8Path;
use cap_std::fs::{Dir, MetadataExt};
use cap_std_ext::dirext::CapStdExtDirExt;
use fn_error_context::context;
use std::process::{Command, Stdio};

/// The header line, then one line per file.
const QUERYFORMAT: &str = concat!(
    "%{NAME}\\t%{EPOCH}\\t%{VERSION}\\t%{RELEASE}\\t%{ARCH}\\t%{SOURCERPM}\\n",
    "[%{FILENAMES}\\t%{FILEFLAGS}\\t%{FILEMODES}\\t%{FILESIZES}\\t",
    "%{FILEUSERNAME}\\t%{FILEGROUPNAME}\\t%{FILECAPS}\\t%{FILEDIGESTS}\\n]"
);

/// What rpm prints for an unset tag.
const NONE: &str = "(none)";

fn optional(s: &str) -> Option<String> {
    if s.is_empty() || s == NONE {
        None
    } else {
        Some(s.to_string())
    }
}

fn parse_file_line(line: &str) -> Result<FileManifest> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [path, flags, mode, size, user, group, caps, digest] = fields.as_slice() else {
        bail!("Expected 8 fields, found {}", fields.len());
    };
    Ok(FileManifest {
        localpath: path.to_string(),
        fullpath: None,
        mode: mode.parse().with_context(|| format!("Parsing mode {mode}"))?,
        size: size.parse().with_context(|| format!("Parsing size {size}"))?,
        nlink: 1,
        uid: 0,
        gid: 0,
        flags: flags.parse().with_context(|| format!("Parsing flags {flags}"))?,
        user: user.to_string(),
        group: group.to_string(),
        caps: optional(caps),
        mime: None,
        digest: optional(digest),
    })
}

/// Parse the output of `rpm -qp --queryformat` with [`QUERYFORMAT`].
pub fn parse_query(output: &str) -> Result<PackageManifest> {
    let mut lines = output.lines();
    let first = lines.next().ok_or_else(|| anyhow!("Empty rpm query output"))?;
    let fields: Vec<&str> = first.split('\t').collect();
    let [name, epoch, version, release, arch, sourcerpm] = fields.as_slice() else {
        bail!("Malformed header line: {first}");
    };
    let epoch = optional(epoch)
        .map(|e| e.parse::<u32>())
        .transpose()
        .with_context(|| format!("Parsing epoch {epoch}"))?;
    let files = lines
        .filter(|l| !l.is_empty())
        .enumerate()
        .map(|(i, l)| parse_file_line(l).with_context(|| format!("File entry {i}")))
        .collect::<Result<Vec<_>>>()?;
    Ok(PackageManifest {
        name: name.to_string(),
        epoch,
        version: version.to_string(),
        release: release.to_string(),
        arch: arch.to_string(),
        sourcerpm: optional(sourcerpm),
        files,
    })
}

/// Replace the header's idea of each file with what is on disk below
/// `dir`.  Ghost files and files not in the payload are dropped.
pub fn fill_stat(dir: &Dir, root: &Utf8Path, mut pkg: PackageManifest) -> Result<PackageManifest> {
    let mut files = Vec::with_capacity(pkg.files.len());
    for mut f in std::mem::take(&mut pkg.files) {
        if FileFlags::from_bits_retain(f.flags).contains(FileFlags::GHOST) {
            tracing::debug!("{}: skipping ghost {}", pkg.name, f.localpath);
            continue;
        }
        let rel = f.localpath.trim_start_matches('/');
        let Some(meta) = dir.symlink_metadata_optional(rel)? else {
            tracing::debug!("{}: {} not in payload", pkg.name, f.localpath);
            continue;
        };
        f.mode = meta.mode();
        f.size = meta.len();
        f.nlink = meta.nlink();
        f.uid = meta.uid();
        f.gid = meta.gid();
        f.fullpath = Some(root.join(rel));
        files.push(f);
    }
    pkg.files = files;
    Ok(pkg)
}

#[context("Querying {rpm}")]
fn query(rpm: &Utf8Path) -> Result<PackageManifest> {
    let out = Command::new("rpm")
        .args(["-qp", "--nosignature", "--nodigest", "--queryformat", QUERYFORMAT])
        .arg(rpm.as_str())
        .log_debug()
        .run_get_string()?;
    parse_query(&out)
}

#[context("Unpacking {rpm}")]
fn unpack(rpm: &Utf8Path, root: &Utf8Path) -> Result<()> {
    let mut rpm2cpio = Command::new("rpm2cpio")
        .arg(rpm.as_str())
        .stdout(Stdio::piped())
        .spawn()
        .context("Spawning rpm2cpio")?;
    let stdout = rpm2cpio
        .stdout
        .take()
        .ok_or_else(|| anyhow!("rpm2cpio: missing stdout"))?;
    let cpio = Command::new("cpio")
        .args(["-idmu", "--quiet", "--no-absolute-filenames"])
        .current_dir(root)
        .stdin(Stdio::from(stdout))
        .log_debug()
        .run();
    let status = rpm2cpio.wait()?;
    cpio?;
    if !status.success() {
        bail!("rpm2cpio failed: {status:?}");
    }
    Ok(())
}

/// Extract `rpm` below `dest/<name>-<arch>/` and return its manifest.
#[context("Extracting {rpm}")]
pub fn extract_rpm(rpm: &Utf8Path, dest: &Utf8Path) -> Result<PackageManifest> {
    let pkg = query(rpm)?;
    let root = dest.join(format!("{}-{}", pkg.name, pkg.arch));
    std::fs::create_dir_all(&root).with_context(|| format!("Creating {root}"))?;
    unpack(rpm, &root)?;
    let dir = Dir::open_ambient_dir(&root, cap_std::ambient_authority())
        .with_context(|| format!("Opening {root}"))?;
    let pkg = fill_stat(&dir, &root, pkg)?;
    tracing::debug!("extracted {} files of {}", pkg.files.len(), pkg.name);
    Ok(pkg)
}
