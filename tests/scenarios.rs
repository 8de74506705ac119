// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End to end: manifests in, peers and findings out.

use indoc::indoc;
use rpminspect_rust::config::Config;
use rpminspect_rust::inspect::{run_inspections, InspectionContext, InspectionDriver, Side};
use rpminspect_rust::manifest::{self, BuildManifest};
use rpminspect_rust::pathindex::PathIndex;
use rpminspect_rust::results::Verb;
use rpminspect_rust::utils::{parse_stream, InputFormat};
use rpminspect_rust::{MatchKind, MatchOptions, PackageFileSet, PeerSet, Results, Severity};

fn build(yaml: &str) -> BuildManifest {
    parse_stream(&InputFormat::YAML, &mut yaml.as_bytes()).unwrap()
}

fn match_one(before: &str, after: &str) -> PeerSet {
    let mut sets = manifest::peer_sets(&build(before), &build(after), &MatchOptions::default());
    assert_eq!(sets.len(), 1);
    sets.remove(0)
}

fn pairs(ps: &PeerSet) -> Vec<(&str, &str, MatchKind)> {
    ps.pairs()
        .map(|(b, a)| {
            let kind = b.matched_by().unwrap();
            assert_eq!(a.matched_by(), Some(kind));
            (b.localpath.as_str(), a.localpath.as_str(), kind)
        })
        .collect()
}

#[test]
fn soname_generalization() {
    let ps = match_one(
        indoc! { "
            packages:
              - {name: foo, version: '3.1', release: '1', arch: x86_64, files: [
                  {localpath: /usr/lib/libfoo.so.1.0.0, mode: 0o100755, mime: application/x-sharedlib}]}
        " },
        indoc! { "
            packages:
              - {name: foo, version: '3.2', release: '1', arch: x86_64, files: [
                  {localpath: /usr/lib/libfoo.so.2.0.0, mode: 0o100755, mime: application/x-sharedlib}]}
        " },
    );
    assert_eq!(
        pairs(&ps),
        vec![(
            "/usr/lib/libfoo.so.1.0.0",
            "/usr/lib/libfoo.so.2.0.0",
            MatchKind::Generalized
        )]
    );
    let b = ps.before().get(0).unwrap();
    let a = ps.after().get(0).unwrap();
    assert!(b.moved_path() && a.moved_path());
    assert!(!b.moved_subpackage() && !a.moved_subpackage());
}

#[test]
fn version_substitution() {
    let ps = match_one(
        indoc! { "
            packages:
              - {name: tool, version: '1.2', release: '1', arch: x86_64, files: [
                  {localpath: /usr/bin/tool-1.2/data.txt, mode: 0o100644}]}
        " },
        indoc! { "
            packages:
              - {name: tool, version: '1.3', release: '1', arch: x86_64, files: [
                  {localpath: /usr/bin/tool-1.3/data.txt, mode: 0o100644}]}
        " },
    );
    assert_eq!(
        pairs(&ps),
        vec![(
            "/usr/bin/tool-1.2/data.txt",
            "/usr/bin/tool-1.3/data.txt",
            MatchKind::Version
        )]
    );
}

#[test]
fn subpackage_relocation() {
    let ps = match_one(
        indoc! { "
            packages:
              - {name: pkgA, version: '1', release: '1', arch: noarch, files: [
                  {localpath: /opt/pkgA/README, mode: 0o100644, mime: text/plain}]}
        " },
        indoc! { "
            packages:
              - {name: pkgB, version: '1', release: '1', arch: noarch, files: [
                  {localpath: /opt/pkgB/README, mode: 0o100644, mime: text/plain}]}
        " },
    );
    assert_eq!(
        pairs(&ps),
        vec![("/opt/pkgA/README", "/opt/pkgB/README", MatchKind::Subpackage)]
    );
    assert!(ps.before().get(0).unwrap().moved_subpackage());
    assert!(ps.after().get(0).unwrap().moved_subpackage());
}

#[test]
fn removed_file() {
    let before = indoc! { "
        packages:
          - {name: foo, version: '1', release: '1', arch: x86_64, files: [
              {localpath: /usr/bin/foo, mode: 0o100755, mime: application/x-executable},
              {localpath: /usr/share/foo/obsolete, mode: 0o100644, mime: text/plain}]}
    " };
    let after = indoc! { "
        packages:
          - {name: foo, version: '1', release: '2', arch: x86_64, files: [
              {localpath: /usr/bin/foo, mode: 0o100755, mime: application/x-executable}]}
    " };
    let ps = match_one(before, after);
    let gone = ps.before().find("/usr/share/foo/obsolete").unwrap();
    assert_eq!(gone.peer(), None);
    assert_eq!(ps.summary().unmatched, 1);

    // Reporting it is up to an inspection.
    let peers = vec![ps];
    let config = Config::default();
    let ctx = InspectionContext::new(&config, &peers);
    let mut results = Results::new();
    assert!(run_inspections(&ctx, &["removedfiles".into()], &mut results));
    let e = results.iter().next().unwrap();
    assert_eq!(e.severity, Severity::Info);
    assert_eq!(e.file.as_deref(), Some("/usr/share/foo/obsolete"));
}

#[test]
fn duplicate_paths() {
    let b = build(indoc! { "
        packages:
          - {name: foo, version: '1', release: '1', arch: x86_64, files: [
              {localpath: /etc/conf, mode: 0o100644, mime: text/plain},
              {localpath: /etc/conf, mode: 0o100600, mime: text/plain}]}
    " });
    let set = PackageFileSet::from_packages(&b.packages);
    let mut index = PathIndex::build(&set);
    assert_eq!(index.duplicates(), &[1]);
    assert_eq!(index.lookup_and_consume("/etc/conf"), Some(0));
    assert_eq!(index.lookup_and_consume("/etc/conf"), None);

    // Matching against it still works and pairs the first copy.
    let mut before = b.clone();
    before.packages[0].files.pop();
    let sets = manifest::peer_sets(&before, &b, &MatchOptions::default());
    let a = sets[0].after();
    assert!(a.get(0).unwrap().has_peer());
    assert!(!a.get(1).unwrap().has_peer());
    assert!(a.get(1).unwrap().is_duplicate());

    // The path exists in both builds, so the repeat is not an added file.
    let config = Config::default();
    let ctx = InspectionContext::new(&config, &sets);
    let mut results = Results::new();
    assert!(run_inspections(&ctx, &["addedfiles".into()], &mut results));
    assert!(!results
        .iter()
        .any(|e| e.verb == Verb::Added && e.file.as_deref() == Some("/etc/conf")));
}

#[test]
fn driver_completeness() {
    let ps = match_one(
        indoc! { "
            packages:
              - {name: foo, version: '1', release: '1', arch: x86_64, files: [
                  {localpath: /a, mode: 0o100644}, {localpath: /b, mode: 0o100644}]}
        " },
        indoc! { "
            packages:
              - {name: foo, version: '1', release: '2', arch: x86_64, files: [
                  {localpath: /a, mode: 0o100644}, {localpath: /c, mode: 0o100644},
                  {localpath: /d, mode: 0o40755}]}
        " },
    );
    let peers = vec![ps];
    let mut calls = 0;
    let mut d = InspectionDriver::new(&peers);
    assert!(!d.run(|_| {
        calls += 1;
        false
    }));
    assert_eq!(calls, 3);

    let mut calls = 0;
    let mut d = InspectionDriver::new(&peers).side(Side::Before);
    assert!(d.run(|_| {
        calls += 1;
        true
    }));
    assert_eq!(calls, 2);
}

#[test]
fn full_run_threshold() {
    let before = indoc! { "
        packages:
          - {name: foo, version: '1', release: '1', arch: x86_64, files: [
              {localpath: /usr/bin/foo, mode: 0o100755},
              {localpath: /usr/lib64/libfoo.so.1, mode: 0o100755, mime: application/x-sharedlib}]}
    " };
    let after = indoc! { "
        packages:
          - {name: foo, version: '1', release: '2', arch: x86_64, files: [
              {localpath: /usr/bin/foo, mode: 0o104755}]}
    " };
    let peers = manifest::peer_sets(&build(before), &build(after), &MatchOptions::default());
    let config = Config::default();
    let ctx = InspectionContext::new(&config, &peers);
    let mut results = Results::new();
    assert!(!run_inspections(&ctx, &[], &mut results));
    assert_eq!(
        results.headers(),
        vec!["addedfiles", "removedfiles", "movedfiles", "permissions", "ownership"]
    );
    assert_eq!(results.worst(), Some(Severity::Bad));
    assert!(results.exceeds(config.threshold));
}
