mod common;

use common::{read_manifest, TestWorkspace};
use indexmap::IndexMap;
use proptest::prelude::*;
use rollkit_core::context::VersionBump;
use rollkit_core::manifest::ManifestCache;
use rollkit_core::package::DepKind;
use rollkit_core::propagate::{updated_range, RangePropagator};
use rollkit_core::range::{is_wildcard, satisfies};
use semver::Version;
use serde_json::json;

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn bumps(entries: &[(&str, &str, &str)]) -> IndexMap<String, VersionBump> {
    entries
        .iter()
        .map(|(name, from, to)| {
            (
                name.to_string(),
                VersionBump {
                    from: v(from),
                    to: v(to),
                },
            )
        })
        .collect()
}

#[test]
fn test_npm_range_evaluation() {
    assert_eq!(satisfies(&v("1.4.0"), "^1.2.0"), Some(true));
    assert_eq!(satisfies(&v("2.0.0"), "^1.2.0"), Some(false));
    assert_eq!(satisfies(&v("1.2.9"), "~1.2.0"), Some(true));
    assert_eq!(satisfies(&v("1.3.0"), "~1.2.0"), Some(false));
    assert_eq!(satisfies(&v("1.5.0"), ">=1.0.0 <2.0.0"), Some(true));
    assert_eq!(satisfies(&v("3.1.0"), "^1.0.0 || ^3.0.0"), Some(true));
    assert_eq!(satisfies(&v("1.9.9"), "1.x"), Some(true));
    assert_eq!(satisfies(&v("1.2.3"), "1.2.3"), Some(true));
    assert_eq!(satisfies(&v("1.2.4"), "1.2.3"), Some(false));
    assert_eq!(satisfies(&v("1.5.0"), "1.0.0 - 2.0.0"), Some(true));
    assert_eq!(satisfies(&v("1.0.0"), "file:../lib"), None);
    assert_eq!(satisfies(&v("1.0.0"), "github:org/lib#main"), None);

    assert!(is_wildcard("*"));
    assert!(is_wildcard(""));
    assert!(!is_wildcard("^1.0.0"));
}

#[test]
fn test_updated_range() {
    assert_eq!(updated_range("^1.2.0", &v("2.0.0")), Some("^2.0.0".to_string()));
    assert_eq!(updated_range("^1.2.0", &v("1.3.0")), None);
    assert_eq!(updated_range("*", &v("1.3.0")), Some("1.3.0".to_string()));
    assert_eq!(updated_range("", &v("1.3.0")), Some("1.3.0".to_string()));
    assert_eq!(updated_range("file:../lib", &v("1.3.0")), None);
    assert_eq!(
        updated_range("^1.2.0", &v("1.3.0-beta.0")),
        Some("^1.3.0-beta.0".to_string())
    );
}

#[test]
fn test_breaking_bump_rewrites_dependent() {
    let ws = TestWorkspace::new();
    let x = ws.add_package("x", "1.0.0", &[("y", "^1.2.0"), ("lodash", "^4.0.0")]);
    ws.add_package("y", "1.2.0", &[]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("x").unwrap();

    let updates = RangePropagator::new(&manifests)
        .propagate(package, &bumps(&[("y", "1.2.0", "2.0.0")]), false)
        .unwrap();

    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].dependency, "y");
    assert_eq!(updates[0].kind, DepKind::Production);
    assert_eq!(updates[0].old_range, "^1.2.0");
    assert_eq!(updates[0].new_range, "^2.0.0");
    assert_eq!(
        updates[0].to_string(),
        "dependency range changed: new version 2.0.0 of module y no longer matches range ^1.2.0, upgraded to ^2.0.0"
    );

    let written = read_manifest(&x);
    assert_eq!(written["dependencies"]["y"], "^2.0.0");
    assert_eq!(written["dependencies"]["lodash"], "^4.0.0");
    assert_eq!(written["version"], "1.0.0");
}

#[test]
fn test_satisfied_range_left_alone() {
    let ws = TestWorkspace::new();
    let x = ws.add_package("x", "1.0.0", &[("y", "^1.2.0")]);
    ws.add_package("y", "1.2.0", &[]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("x").unwrap();
    let before = std::fs::read_to_string(x.join("package.json")).unwrap();

    let updates = RangePropagator::new(&manifests)
        .propagate(package, &bumps(&[("y", "1.2.0", "1.3.0")]), false)
        .unwrap();

    assert!(updates.is_empty());
    assert_eq!(std::fs::read_to_string(x.join("package.json")).unwrap(), before);
}

#[test]
fn test_wildcard_pinned_in_every_kind() {
    let ws = TestWorkspace::new();
    let x = ws.add_manifest(
        "x",
        json!({
            "name": "x",
            "version": "1.0.0",
            "devDependencies": { "y": "*" },
            "peerDependencies": { "y": "^0.9.0" }
        }),
    );
    ws.add_package("y", "1.2.0", &[]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("x").unwrap();

    let updates = RangePropagator::new(&manifests)
        .propagate(package, &bumps(&[("y", "1.2.0", "1.2.1")]), false)
        .unwrap();

    assert_eq!(updates.len(), 2);
    assert_eq!(
        updates[0].to_string(),
        "dependency range changed: y pinned from '*' to 1.2.1"
    );
    let written = read_manifest(&x);
    assert_eq!(written["devDependencies"]["y"], "1.2.1");
    assert_eq!(written["peerDependencies"]["y"], "^1.2.1");
}

#[test]
fn test_unparseable_range_untouched() {
    let ws = TestWorkspace::new();
    let x = ws.add_package("x", "1.0.0", &[("y", "file:../y")]);
    ws.add_package("y", "1.2.0", &[]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("x").unwrap();

    let updates = RangePropagator::new(&manifests)
        .propagate(package, &bumps(&[("y", "1.2.0", "2.0.0")]), false)
        .unwrap();

    assert!(updates.is_empty());
    assert_eq!(read_manifest(&x)["dependencies"]["y"], "file:../y");
}

#[test]
fn test_dry_run_does_not_write() {
    let ws = TestWorkspace::new();
    let x = ws.add_package("x", "1.0.0", &[("y", "^1.2.0")]);
    ws.add_package("y", "1.2.0", &[]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("x").unwrap();

    let updates = RangePropagator::new(&manifests)
        .propagate(package, &bumps(&[("y", "1.2.0", "2.0.0")]), true)
        .unwrap();

    assert_eq!(updates.len(), 1);
    assert_eq!(read_manifest(&x)["dependencies"]["y"], "^1.2.0");
}

fn gen_version() -> impl Strategy<Value = Version> {
    (0u64..20, 0u64..20, 0u64..20).prop_map(|(a, b, c)| Version::new(a, b, c))
}

fn gen_range() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("*".to_string()),
        gen_version().prop_map(|v| format!("^{}", v)),
        gen_version().prop_map(|v| format!("~{}", v)),
        gen_version().prop_map(|v| v.to_string()),
        gen_version().prop_map(|v| format!(">={}", v)),
    ]
}

proptest! {
    #[test]
    fn test_range_satisfied_after_update(range in gen_range(), version in gen_version()) {
        let after = updated_range(&range, &version).unwrap_or_else(|| range.clone());
        prop_assert_eq!(satisfies(&version, &after), Some(true), "range {} -> {}", range, after);
    }
}
