//! Files whose peer lives at another path or in another subpackage.

// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::finish;
use crate::inspect::{FileView, InspectionContext, PeerFilter};
use crate::results::{ResultParams, Results, Severity, Verb, WaiverAuth};

const HEADER: &str = "movedfiles";

fn check_moved(
    ctx: &InspectionContext<'_>,
    params: &ResultParams,
    view: &FileView<'_>,
    results: &mut Results,
) -> bool {
    let (before, after) = match (view.before(), view.after()) {
        (Some(b), Some(a)) => (b, a),
        _ => return true,
    };
    if !after.moved_path() && !after.moved_subpackage() {
        return true;
    }

    let mut msg = if after.moved_path() {
        format!("{} moved to {}", before.localpath, after.localpath)
    } else {
        format!("{} kept its path", after.localpath)
    };
    if after.moved_subpackage() {
        msg.push_str(&format!(
            ", from subpackage {} to {}",
            before.package_name(),
            after.package_name()
        ));
    }
    msg.push_str(&format!(" on {}", view.arch()));

    let mut params = params
        .clone()
        .file(&after.localpath)
        .arch(view.arch())
        .noun(after.package_name())
        .message(msg);
    if let Some(kind) = after.matched_by() {
        params = params.details(format!("Matched by {kind}"));
    }

    // Moving something into a protected location needs a second look.
    let ok = !(ctx.config.is_security_path(&after.localpath)
        && !ctx.config.is_security_path(&before.localpath));
    if ok {
        results.add(params.severity(Severity::Info));
    } else {
        results.add(
            params
                .severity(Severity::Verify)
                .waiverauth(WaiverAuth::WaivableBySecurity),
        );
    }
    ok
}

pub(crate) fn inspect_movedfiles(ctx: &InspectionContext<'_>, results: &mut Results) -> bool {
    let params = ResultParams::new(HEADER)
        .waiverauth(WaiverAuth::WaivableByAnyone)
        .verb(Verb::Changed);
    let ok = ctx
        .driver()
        .filter(PeerFilter::WithPeer)
        .run(|v| check_moved(ctx, &params, v, results));
    finish(results, HEADER, ok)
}

#[cfg(test)]
mod test {
    use crate::config::Config;
    use crate::files::testutil::*;
    use crate::inspections::testutil::run_one;
    use crate::results::Severity;

    #[test]
    fn test_subpackage_move() {
        let a = header("pkgA", "1.0", "1", "x86_64");
        let b = header("pkgB", "1.0", "1", "x86_64");
        let (ok, results) = run_one(
            "movedfiles",
            &Config::default(),
            vec![regfile(&a, "/opt/pkgA/README", "text/plain")],
            vec![regfile(&b, "/opt/pkgB/README", "text/plain")],
        );
        assert!(ok);
        let first = results.iter().next().unwrap();
        assert_eq!(first.severity, Severity::Info);
        assert_eq!(
            first.message.as_deref(),
            Some("/opt/pkgA/README moved to /opt/pkgB/README, from subpackage pkgA to pkgB on x86_64")
        );
        assert_eq!(first.details.as_deref(), Some("Matched by subpackage"));
    }

    #[test]
    fn test_nothing_moved() {
        let hb = header("foo", "1.0", "1", "x86_64");
        let ha = header("foo", "1.0", "2", "x86_64");
        let (ok, results) = run_one(
            "movedfiles",
            &Config::default(),
            vec![regfile(&hb, "/usr/bin/foo", "application/x-executable")],
            vec![regfile(&ha, "/usr/bin/foo", "application/x-executable")],
        );
        assert!(ok);
        assert_eq!(results.len(), 1);
        assert_eq!(results.worst(), Some(Severity::Ok));
    }

    #[test]
    fn test_into_security_path() {
        let a = header("pkgA", "1.0", "1", "x86_64");
        let b = header("pkgB", "1.0", "1", "x86_64");
        let config = Config {
            security_paths: vec!["/etc/sudoers.d/".into()],
            ..Default::default()
        };
        let (ok, results) = run_one(
            "movedfiles",
            &config,
            vec![regfile(&a, "/usr/share/pkgA/wheel", "text/plain")],
            vec![regfile(&b, "/etc/sudoers.d/wheel", "text/plain")],
        );
        assert!(!ok);
        assert_eq!(results.worst(), Some(Severity::Verify));
    }
}
