//! Mode and capability changes, with special attention to setuid and
//! setgid bits.

// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::finish;
use crate::files::FileRecord;
use crate::inspect::{FileView, InspectionContext};
use crate::results::{ResultParams, Results, Severity, Verb, WaiverAuth};

const HEADER: &str = "permissions";

const SETUID: u32 = 0o4000;
const SETGID: u32 = 0o2000;

/// Setuid/setgid bits present in `after` but not in `before`.
fn gained_setid(before: u32, after: u32) -> u32 {
    after & !before & (SETUID | SETGID)
}

fn check_mode(
    params: &ResultParams,
    view: &FileView<'_>,
    before: &FileRecord,
    after: &FileRecord,
    results: &mut Results,
) -> bool {
    // Symlink modes carry no meaning.
    if after.stat.is_symlink() || before.stat.is_symlink() {
        return true;
    }
    let (bmode, amode) = (before.stat.permissions(), after.stat.permissions());
    if bmode == amode {
        return true;
    }
    let params = params
        .clone()
        .file(&after.localpath)
        .arch(view.arch())
        .noun(after.package_name())
        .details(format!("{bmode:04o} -> {amode:04o}"));
    if gained_setid(bmode, amode) != 0 {
        results.add(
            params
                .severity(Severity::Bad)
                .waiverauth(WaiverAuth::WaivableBySecurity)
                .message(format!(
                    "{} on {} gained setuid or setgid permissions",
                    after.localpath,
                    view.arch()
                ))
                .remedy("Setuid and setgid programs need a security review before they can ship."),
        );
    } else {
        results.add(
            params
                .severity(Severity::Verify)
                .waiverauth(WaiverAuth::WaivableByAnyone)
                .message(format!(
                    "{} on {} changed mode from {bmode:04o} to {amode:04o}",
                    after.localpath,
                    view.arch()
                )),
        );
    }
    false
}

fn check_caps(
    params: &ResultParams,
    view: &FileView<'_>,
    before: &FileRecord,
    after: &FileRecord,
    results: &mut Results,
) -> bool {
    let (bcaps, acaps) = (before.capabilities(), after.capabilities());
    if bcaps == acaps {
        return true;
    }
    results.add(
        params
            .clone()
            .severity(Severity::Verify)
            .waiverauth(WaiverAuth::WaivableBySecurity)
            .file(&after.localpath)
            .arch(view.arch())
            .noun(after.package_name())
            .message(format!(
                "{} on {} changed capabilities from '{}' to '{}'",
                after.localpath,
                view.arch(),
                bcaps.unwrap_or(""),
                acaps.unwrap_or("")
            )),
    );
    false
}

/// A new file with setuid or setgid set.  Only used when there is no
/// before build; in a comparison `addedfiles` reports these.
fn check_new(params: &ResultParams, view: &FileView<'_>, file: &FileRecord, results: &mut Results) -> bool {
    if !file.is_regular() || !file.stat.is_setuid_or_setgid() {
        return true;
    }
    results.add(
        params
            .clone()
            .severity(Severity::Verify)
            .waiverauth(WaiverAuth::WaivableBySecurity)
            .verb(Verb::Added)
            .file(&file.localpath)
            .arch(view.arch())
            .noun(file.package_name())
            .message(format!(
                "{} on {} is setuid or setgid ({:04o})",
                file.localpath,
                view.arch(),
                file.stat.permissions()
            )),
    );
    false
}

fn check_permissions(
    params: &ResultParams,
    has_before: bool,
    view: &FileView<'_>,
    results: &mut Results,
) -> bool {
    match (view.before(), view.after()) {
        (Some(b), Some(a)) => {
            // Both checks always run.
            let mode_ok = check_mode(params, view, b, a, results);
            let caps_ok = check_caps(params, view, b, a, results);
            mode_ok && caps_ok
        }
        (None, Some(a)) if !has_before => check_new(params, view, a, results),
        _ => true,
    }
}

pub(crate) fn inspect_permissions(ctx: &InspectionContext<'_>, results: &mut Results) -> bool {
    let params = ResultParams::new(HEADER).verb(Verb::Changed);
    let has_before = ctx.has_before();
    let ok = ctx
        .driver()
        .run(|v| check_permissions(&params, has_before, v, results));
    finish(results, HEADER, ok)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::files::testutil::*;
    use crate::files::FileStat;
    use crate::header::{FileFlags, HeaderFile, PackageHeader};
    use crate::inspections::testutil::run_one;
    use std::sync::Arc;

    fn with_mode(f: FileRecord, mode: u32) -> FileRecord {
        let stat = FileStat {
            mode: S_IFREG | mode,
            ..f.stat
        };
        FileRecord::new(f.localpath.clone(), f.fullpath.clone(), stat, Arc::clone(&f.header))
            .with_mime("application/x-executable")
    }

    #[test]
    fn test_gained_setid() {
        assert_eq!(gained_setid(0o755, 0o4755), SETUID);
        assert_eq!(gained_setid(0o4755, 0o4755), 0);
        assert_eq!(gained_setid(0o4755, 0o755), 0);
        assert_eq!(gained_setid(0o755, 0o6755), SETUID | SETGID);
    }

    #[test]
    fn test_setuid_gained() {
        let hb = header("foo", "1.0", "1", "x86_64");
        let ha = header("foo", "1.0", "2", "x86_64");
        let (ok, results) = run_one(
            "permissions",
            &Config::default(),
            vec![
                with_mode(regfile(&hb, "/usr/bin/foo", ""), 0o755),
                with_mode(regfile(&hb, "/usr/bin/bar", ""), 0o755),
            ],
            vec![
                with_mode(regfile(&ha, "/usr/bin/foo", ""), 0o4755),
                with_mode(regfile(&ha, "/usr/bin/bar", ""), 0o700),
            ],
        );
        assert!(!ok);
        let entries: Vec<_> = results.iter().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].severity, Severity::Bad);
        assert_eq!(entries[0].waiverauth, WaiverAuth::WaivableBySecurity);
        assert_eq!(entries[0].details.as_deref(), Some("0755 -> 4755"));
        assert_eq!(entries[1].severity, Severity::Verify);
        assert_eq!(entries[1].waiverauth, WaiverAuth::WaivableByAnyone);
    }

    #[test]
    fn test_new_setuid_file() {
        let h = header("foo", "1.0", "1", "x86_64");
        let (ok, results) = run_one(
            "permissions",
            &Config::default(),
            vec![],
            vec![
                with_mode(regfile(&h, "/usr/bin/su", ""), 0o4755),
                with_mode(regfile(&h, "/usr/bin/ls", ""), 0o755),
            ],
        );
        assert!(!ok);
        assert_eq!(results.len(), 1);
        assert_eq!(results.worst(), Some(Severity::Verify));
    }

    #[test]
    fn test_new_setuid_file_in_comparison() {
        // addedfiles owns this case once there is something to compare with
        let hb = header("foo", "1.0", "1", "x86_64");
        let ha = header("foo", "1.0", "2", "x86_64");
        let before = || vec![with_mode(regfile(&hb, "/usr/bin/ls", ""), 0o755)];
        let after = || {
            vec![
                with_mode(regfile(&ha, "/usr/bin/ls", ""), 0o755),
                with_mode(regfile(&ha, "/usr/bin/su", ""), 0o4755),
            ]
        };
        let (ok, results) = run_one("permissions", &Config::default(), before(), after());
        assert!(ok);
        assert_eq!(results.worst(), Some(Severity::Ok));

        let (ok, results) = run_one("addedfiles", &Config::default(), before(), after());
        assert!(!ok);
        let flagged: Vec<_> = results
            .iter()
            .filter(|e| e.severity == Severity::Verify)
            .collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].file.as_deref(), Some("/usr/bin/su"));
    }

    #[test]
    fn test_capabilities() {
        let mk = |rel: &str, caps: Option<&str>| {
            let mut h = PackageHeader::new("iputils", "1", rel, "x86_64");
            h.files.push(HeaderFile {
                path: "/usr/bin/ping".into(),
                flags: FileFlags::empty(),
                user: "root".into(),
                group: "root".into(),
                caps: caps.map(|c| c.to_string()),
                digest: None,
            });
            let h = Arc::new(h);
            regfile(&h, "/usr/bin/ping", "application/x-executable").with_header_index(0)
        };
        let (ok, results) = run_one(
            "permissions",
            &Config::default(),
            vec![mk("1", None)],
            vec![mk("2", Some("cap_net_raw=p"))],
        );
        assert!(!ok);
        let first = results.iter().next().unwrap();
        assert_eq!(
            first.message.as_deref(),
            Some("/usr/bin/ping on x86_64 changed capabilities from '' to 'cap_net_raw=p'")
        );
    }

    #[test]
    fn test_unchanged() {
        let hb = header("foo", "1.0", "1", "x86_64");
        let ha = header("foo", "1.0", "2", "x86_64");
        let (ok, results) = run_one(
            "permissions",
            &Config::default(),
            vec![regfile(&hb, "/usr/bin/foo", "text/plain")],
            vec![regfile(&ha, "/usr/bin/foo", "text/plain")],
        );
        assert!(ok);
        assert_eq!(results.worst(), Some(Severity::Ok));
    }
}
