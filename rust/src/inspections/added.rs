//! Files present in the after build only.

// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::finish;
use crate::header::FileFlags;
use crate::inspect::{FileView, InspectionContext, PeerFilter};
use crate::peers::MatchOptions;
use crate::results::{ResultParams, Results, Severity, Verb, WaiverAuth};

const HEADER: &str = "addedfiles";

fn check_added(
    ctx: &InspectionContext<'_>,
    opts: &MatchOptions,
    params: &ResultParams,
    view: &FileView<'_>,
    results: &mut Results,
) -> bool {
    let file = view.file;
    if file.is_duplicate()
        || file.flags.contains(FileFlags::GHOST)
        || opts.is_build_id(&file.localpath)
    {
        return true;
    }
    let params = params
        .clone()
        .file(&file.localpath)
        .arch(view.arch())
        .noun(file.package_name());
    let reason = if file.is_regular() && file.stat.is_setuid_or_setgid() {
        Some(format!("with mode {:04o}", file.stat.permissions()))
    } else if ctx.config.is_security_path(&file.localpath) {
        Some("below a security path".to_string())
    } else {
        None
    };
    if let Some(reason) = reason {
        results.add(
            params
                .severity(Severity::Verify)
                .waiverauth(WaiverAuth::WaivableBySecurity)
                .message(format!(
                    "{} added to {} on {}, {reason}",
                    file.localpath,
                    file.package_name(),
                    view.arch()
                ))
                .remedy("New setuid/setgid files and files in security paths need a security review."),
        );
        return false;
    }
    results.add(params.severity(Severity::Info).message(format!(
        "{} added to {} on {}",
        file.localpath,
        file.package_name(),
        view.arch()
    )));
    true
}

pub(crate) fn inspect_addedfiles(ctx: &InspectionContext<'_>, results: &mut Results) -> bool {
    let params = ResultParams::new(HEADER)
        .waiverauth(WaiverAuth::WaivableByAnyone)
        .verb(Verb::Added);
    let opts = ctx.config.match_options();
    let ok = ctx
        .driver()
        .filter(PeerFilter::WithoutPeer)
        .run(|v| check_added(ctx, &opts, &params, v, results));
    finish(results, HEADER, ok)
}

#[cfg(test)]
mod test {
    use crate::config::Config;
    use crate::files::testutil::*;
    use crate::files::{FileRecord, FileStat};
    use crate::inspections::testutil::run_one;
    use crate::results::{Severity, WaiverAuth};
    use std::sync::Arc;

    #[test]
    fn test_added() {
        let hb = header("foo", "1.0", "1", "x86_64");
        let ha = header("foo", "1.0", "2", "x86_64");
        let config = Config {
            security_paths: vec!["/etc/sudoers.d/".into()],
            ..Default::default()
        };
        let (ok, results) = run_one(
            "addedfiles",
            &config,
            vec![regfile(&hb, "/usr/bin/foo", "application/x-executable")],
            vec![
                regfile(&ha, "/usr/bin/foo", "application/x-executable"),
                regfile(&ha, "/usr/share/foo/new", "text/plain"),
                regfile(&ha, "/usr/lib/.build-id/aa/bbbb", "text/plain"),
                regfile(&ha, "/etc/sudoers.d/foo", "text/plain"),
            ],
        );
        assert!(!ok);
        let entries: Vec<_> = results.iter().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].severity, Severity::Info);
        assert_eq!(entries[0].file.as_deref(), Some("/usr/share/foo/new"));
        assert_eq!(entries[1].severity, Severity::Verify);
        assert_eq!(entries[1].waiverauth, WaiverAuth::WaivableBySecurity);
    }

    #[test]
    fn test_added_setuid() {
        let h = header("foo", "1.0", "1", "x86_64");
        let stat = FileStat {
            mode: S_IFREG | 0o4755,
            ..Default::default()
        };
        let su = FileRecord::new("/usr/bin/su", "/tmp/extract/usr/bin/su", stat, Arc::clone(&h));
        let (ok, results) = run_one("addedfiles", &Config::default(), vec![], vec![su]);
        assert!(!ok);
        let e = results.iter().next().unwrap();
        assert_eq!(e.severity, Severity::Verify);
        assert_eq!(
            e.message.as_deref(),
            Some("/usr/bin/su added to foo on x86_64, with mode 4755")
        );
    }

    #[test]
    fn test_nothing_added() {
        let hb = header("foo", "1.0", "1", "x86_64");
        let ha = header("foo", "1.0", "2", "x86_64");
        let (ok, results) = run_one(
            "addedfiles",
            &Config::default(),
            vec![regfile(&hb, "/usr/bin/foo", "application/x-executable")],
            vec![regfile(&ha, "/usr/bin/foo", "application/x-executable")],
        );
        assert!(ok);
        assert_eq!(results.len(), 1);
        assert_eq!(results.worst(), Some(Severity::Ok));
    }

    #[test]
    fn test_duplicate_not_added() {
        let hb = header("foo", "1.0", "1", "x86_64");
        let ha = header("foo", "1.0", "2", "x86_64");
        let (ok, results) = run_one(
            "addedfiles",
            &Config::default(),
            vec![regfile(&hb, "/etc/conf", "text/plain")],
            vec![
                regfile(&ha, "/etc/conf", "text/plain"),
                regfile(&ha, "/etc/conf", "text/plain"),
            ],
        );
        assert!(ok);
        assert!(results
            .iter()
            .all(|e| e.file.as_deref() != Some("/etc/conf")));
        assert_eq!(results.worst(), Some(Severity::Ok));
    }
}
