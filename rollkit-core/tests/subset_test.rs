mod common;

use std::path::PathBuf;
use std::sync::Arc;

use common::{write_file, TestWorkspace};
use rollkit_core::error::Error;
use rollkit_core::manifest::ManifestCache;
use rollkit_core::package::Package;
use rollkit_core::subset::{
    AllFilesSubset, BuildSubset, PackListCache, PublishSubset, Subset, BUILD_TAG, PUBLISH_TAG,
};
use serde_json::{json, Value};

fn included(subset: &dyn Subset) -> Vec<String> {
    let mut files = Vec::new();
    subset
        .walk(&mut |path, _| {
            let relative = path.strip_prefix(subset.root()).unwrap();
            files.push(relative.to_string_lossy().replace('\\', "/"));
        })
        .unwrap();
    files.sort();
    files
}

fn package_with(ws: &TestWorkspace, manifest: Value, files: &[&str]) -> (ManifestCache, PathBuf) {
    let dir = ws.add_manifest("lib", manifest);
    for file in files {
        write_file(&dir.join(file), "content");
    }
    (ManifestCache::new(), dir)
}

#[test]
fn test_build_subset_patterns() {
    let ws = TestWorkspace::new();
    let (manifests, _) = package_with(
        &ws,
        json!({
            "name": "lib",
            "version": "1.0.0",
            "rollkit": { "buildTriggers": ["*.ts", "config/*.json", "./scripts/build.sh"] }
        }),
        &[
            "src/index.ts",
            "src/deep/util.ts",
            "config/app.json",
            "other/app.json",
            "scripts/build.sh",
            "scripts/deploy.sh",
            "README.md",
        ],
    );
    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("lib").unwrap();
    let subset = BuildSubset::new(package).unwrap();

    assert_eq!(subset.tag(), BUILD_TAG);
    assert_eq!(
        included(&subset),
        vec!["config/app.json", "scripts/build.sh", "src/deep/util.ts", "src/index.ts"]
    );
    assert!(!subset.is_included(&PathBuf::from("/elsewhere/index.ts")));
}

#[test]
fn test_build_subset_without_triggers_is_empty() {
    let ws = TestWorkspace::new();
    let (manifests, _) = package_with(
        &ws,
        json!({ "name": "lib", "version": "1.0.0" }),
        &["src/index.ts"],
    );
    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("lib").unwrap();

    assert!(included(&BuildSubset::new(package).unwrap()).is_empty());
}

#[test]
fn test_build_subset_invalid_trigger() {
    let mut package = Package::new("/work/lib", Some("lib".to_string()));
    package.build_triggers = vec!["src/[".to_string()];

    assert!(matches!(
        BuildSubset::new(&package),
        Err(Error::InvalidManifest { .. })
    ));
}

#[test]
fn test_build_subset_star_stays_in_directory() {
    let ws = TestWorkspace::new();
    let (manifests, dir) = package_with(
        &ws,
        json!({
            "name": "lib",
            "version": "1.0.0",
            "rollkit": { "buildTriggers": ["src/*.ts", "assets/**/*.css"] }
        }),
        &["src/a.ts", "src/deep/b.ts", "assets/site.css", "assets/theme/dark.css"],
    );
    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("lib").unwrap();
    let subset = BuildSubset::new(package).unwrap();

    assert!(subset.is_included(&package.path.join("src/a.ts")));
    assert!(!subset.is_included(&package.path.join("src/deep/b.ts")));
    assert_eq!(
        included(&subset),
        vec!["assets/site.css", "assets/theme/dark.css", "src/a.ts"]
    );
    assert!(dir.join("src/deep/b.ts").is_file());
}

#[test]
fn test_all_files_subset() {
    let ws = TestWorkspace::new();
    let (manifests, _) = package_with(
        &ws,
        json!({ "name": "lib", "version": "1.0.0" }),
        &["src/index.ts", "node_modules/dep/index.js"],
    );
    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("lib").unwrap();

    assert_eq!(
        included(&AllFilesSubset::new(package)),
        vec!["package.json", "src/index.ts"]
    );
}

#[test]
fn test_publish_subset_defaults() {
    let ws = TestWorkspace::new();
    let (manifests, _) = package_with(
        &ws,
        json!({ "name": "lib", "version": "1.0.0" }),
        &["index.js", "README.md", ".npmrc", "package-lock.json", "notes.txt.orig"],
    );
    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("lib").unwrap();
    let subset = PublishSubset::new(package, &manifests, &PackListCache::new()).unwrap();

    assert_eq!(subset.tag(), PUBLISH_TAG);
    assert_eq!(included(&subset), vec!["README.md", "index.js", "package.json"]);
}

#[test]
fn test_publish_subset_honors_npmignore() {
    let ws = TestWorkspace::new();
    let (manifests, dir) = package_with(
        &ws,
        json!({ "name": "lib", "version": "1.0.0" }),
        &["lib/index.js", "test/index.test.js", "debug.log", "README.md"],
    );
    write_file(&dir.join(".npmignore"), "test/\n*.log\n");
    write_file(&dir.join(".gitignore"), "lib/\n");

    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("lib").unwrap();
    let subset = PublishSubset::new(package, &manifests, &PackListCache::new()).unwrap();

    assert_eq!(
        included(&subset),
        vec![".gitignore", ".npmignore", "README.md", "lib/index.js", "package.json"]
    );
}

#[test]
fn test_publish_subset_falls_back_to_gitignore() {
    let ws = TestWorkspace::new();
    let (manifests, dir) = package_with(
        &ws,
        json!({ "name": "lib", "version": "1.0.0" }),
        &["lib/index.js", "coverage/lcov.info"],
    );
    write_file(&dir.join(".gitignore"), "coverage/\n");

    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("lib").unwrap();
    let subset = PublishSubset::new(package, &manifests, &PackListCache::new()).unwrap();

    assert_eq!(
        included(&subset),
        vec![".gitignore", "lib/index.js", "package.json"]
    );
}

#[test]
fn test_publish_subset_files_list() {
    let ws = TestWorkspace::new();
    let (manifests, _) = package_with(
        &ws,
        json!({ "name": "lib", "version": "1.0.0", "files": ["dist", "bin/cli.js"] }),
        &[
            "dist/index.js",
            "dist/types/index.d.ts",
            "bin/cli.js",
            "bin/dev.js",
            "src/index.ts",
            "LICENSE",
            "CHANGELOG.md",
        ],
    );
    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("lib").unwrap();
    let subset = PublishSubset::new(package, &manifests, &PackListCache::new()).unwrap();

    assert_eq!(
        included(&subset),
        vec![
            "CHANGELOG.md",
            "LICENSE",
            "bin/cli.js",
            "dist/index.js",
            "dist/types/index.d.ts",
            "package.json",
        ]
    );
}

#[test]
fn test_publish_subset_custom_ignore() {
    let ws = TestWorkspace::new();
    let (manifests, dir) = package_with(
        &ws,
        json!({
            "name": "lib",
            "version": "1.0.0",
            "rollkit": { "npmIgnore": "publish.ignore" }
        }),
        &["lib/index.js", "lib/index.js.map"],
    );
    write_file(&dir.join("publish.ignore"), "*.map\n");

    let workspace = ws.load(&manifests);
    let package = workspace.package_by_name("lib").unwrap();
    let subset = PublishSubset::new(package, &manifests, &PackListCache::new()).unwrap();

    assert_eq!(
        included(&subset),
        vec!["lib/index.js", "package.json", "publish.ignore"]
    );
}

#[test]
fn test_pack_list_cached_per_root() {
    let ws = TestWorkspace::new();
    let (_, dir) = package_with(
        &ws,
        json!({ "name": "lib", "version": "1.0.0" }),
        &["index.js"],
    );
    let cache = PackListCache::new();

    let first = cache.pack_list(&dir, None).unwrap();
    write_file(&dir.join("later.js"), "");
    let second = cache.pack_list(&dir, None).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(!second.contains(&PathBuf::from("later.js")));
}
