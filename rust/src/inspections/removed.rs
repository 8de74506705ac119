//! Files present in the before build only.

// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::finish;
use crate::header::FileFlags;
use crate::inspect::{FileView, InspectionContext, PeerFilter, Side};
use crate::peers::MatchOptions;
use crate::results::{ResultParams, Results, Severity, Verb, WaiverAuth};

const HEADER: &str = "removedfiles";

fn check_removed(
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

    if file.is_regular() && opts.is_shared_lib(&file.localpath) {
        results.add(
            params
                .severity(Severity::Verify)
                .message(format!(
                    "Shared library {} removed from {} on {}",
                    file.localpath,
                    file.package_name(),
                    view.arch()
                ))
                .remedy("Make sure removing the library is intended and that nothing still links against it."),
        );
        return false;
    }
    if ctx.config.is_security_path(&file.localpath) {
        results.add(
            params
                .severity(Severity::Verify)
                .waiverauth(WaiverAuth::WaivableBySecurity)
                .message(format!(
                    "{} removed from {} on {}, below a security path",
                    file.localpath,
                    file.package_name(),
                    view.arch()
                )),
        );
        return false;
    }
    results.add(params.severity(Severity::Info).message(format!(
        "{} removed from {} on {}",
        file.localpath,
        file.package_name(),
        view.arch()
    )));
    true
}

pub(crate) fn inspect_removedfiles(ctx: &InspectionContext<'_>, results: &mut Results) -> bool {
    let params = ResultParams::new(HEADER)
        .waiverauth(WaiverAuth::WaivableByAnyone)
        .verb(Verb::Removed);
    let opts = ctx.config.match_options();
    let ok = ctx
        .driver()
        .side(Side::Before)
        .filter(PeerFilter::WithoutPeer)
        .run(|v| check_removed(ctx, &opts, &params, v, results));
    finish(results, HEADER, ok)
}
