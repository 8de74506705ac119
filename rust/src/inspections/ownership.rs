//! Owner and group changes between peers.

// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::finish;
use crate::files::FileRecord;
use crate::inspect::{FileView, InspectionContext, PeerFilter};
use crate::results::{ResultParams, Results, Severity, Verb, WaiverAuth};

const HEADER: &str = "ownership";

/// Owner as recorded in the header, else the numeric ids from the payload.
fn owner_of(file: &FileRecord) -> (String, String) {
    match file.owner() {
        Some((u, g)) if !u.is_empty() && !g.is_empty() => (u.to_string(), g.to_string()),
        _ => (file.stat.uid.to_string(), file.stat.gid.to_string()),
    }
}

fn check_ownership(params: &ResultParams, view: &FileView<'_>, results: &mut Results) -> bool {
    let (before, after) = match (view.before(), view.after()) {
        (Some(b), Some(a)) => (b, a),
        _ => return true,
    };
    let (bu, bg) = owner_of(before);
    let (au, ag) = owner_of(after);
    if bu == au && bg == ag {
        return true;
    }
    results.add(
        params
            .clone()
            .severity(Severity::Verify)
            .file(&after.localpath)
            .arch(view.arch())
            .noun(after.package_name())
            .message(format!(
                "{} on {} changed owner from {bu}:{bg} to {au}:{ag}",
                after.localpath,
                view.arch()
            )),
    );
    false
}

pub(crate) fn inspect_ownership(ctx: &InspectionContext<'_>, results: &mut Results) -> bool {
    let params = ResultParams::new(HEADER)
        .waiverauth(WaiverAuth::WaivableByAnyone)
        .verb(Verb::Changed);
    let ok = ctx
        .driver()
        .filter(PeerFilter::WithPeer)
        .run(|v| check_ownership(&params, v, results));
    finish(results, HEADER, ok)
}
