mod common;

use common::TestWorkspace;
use rollkit_core::error::Error;
use rollkit_core::graph::{DependencyGraph, GraphWalker, WalkAction, WalkOutcome};
use rollkit_core::manifest::{ManifestCache, ManifestStore};
use rollkit_core::package::DepKind;
use serde_json::json;

fn names(order: &[&rollkit_core::Package]) -> Vec<String> {
    order.iter().map(|p| p.display_name()).collect()
}

#[test]
fn test_dependencies_walked_first() {
    let ws = TestWorkspace::new();
    ws.add_package("x", "1.0.0", &[("y", "^1.0.0")]);
    ws.add_package("y", "1.0.0", &[("z", "^1.0.0")]);
    ws.add_package("z", "1.0.0", &[]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let order = GraphWalker::new(&workspace, &manifests).walk_order().unwrap();

    assert_eq!(names(&order), vec!["z", "y", "x"]);
}

#[test]
fn test_shared_dependency_visited_once() {
    let ws = TestWorkspace::new();
    ws.add_package("app", "1.0.0", &[("left", "^1.0.0"), ("right", "^1.0.0")]);
    ws.add_package("left", "1.0.0", &[("shared", "^1.0.0")]);
    ws.add_package("right", "1.0.0", &[("shared", "^1.0.0")]);
    ws.add_package("shared", "1.0.0", &[]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let order = GraphWalker::new(&workspace, &manifests).walk_order().unwrap();

    assert_eq!(names(&order), vec!["shared", "left", "right", "app"]);
}

#[test]
fn test_independent_packages_in_declaration_order() {
    let ws = TestWorkspace::new();
    ws.add_package("b", "1.0.0", &[]);
    ws.add_package("a", "1.0.0", &[]);
    ws.add_package("c", "1.0.0", &[]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let order = GraphWalker::new(&workspace, &manifests).walk_order().unwrap();

    assert_eq!(names(&order), vec!["a", "b", "c"]);
}

#[test]
fn test_external_dependencies_ignored() {
    let ws = TestWorkspace::new();
    ws.add_package("app", "1.0.0", &[("lodash", "^4.17.0"), ("lib", "^1.0.0")]);
    ws.add_package("lib", "1.0.0", &[("left-pad", "1.3.0")]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let order = GraphWalker::new(&workspace, &manifests).walk_order().unwrap();

    assert_eq!(names(&order), vec!["lib", "app"]);
}

#[test]
fn test_unnamed_packages_not_walked() {
    let ws = TestWorkspace::new();
    ws.add_package("named", "1.0.0", &[]);
    ws.add_manifest("anonymous", json!({ "version": "1.0.0" }));

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    assert_eq!(workspace.packages().len(), 2);

    let order = GraphWalker::new(&workspace, &manifests).walk_order().unwrap();
    assert_eq!(names(&order), vec!["named"]);
}

#[test]
fn test_dev_and_peer_dependencies_are_edges() {
    let ws = TestWorkspace::new();
    ws.add_manifest(
        "app",
        json!({
            "name": "app",
            "version": "1.0.0",
            "devDependencies": { "tooling": "^1.0.0" },
            "peerDependencies": { "core": "^1.0.0" }
        }),
    );
    ws.add_package("core", "1.0.0", &[]);
    ws.add_package("tooling", "1.0.0", &[]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let order = GraphWalker::new(&workspace, &manifests).walk_order().unwrap();

    assert_eq!(names(&order), vec!["tooling", "core", "app"]);
}

#[test]
fn test_cycle_reported_with_chain() {
    let ws = TestWorkspace::new();
    ws.add_package("a", "1.0.0", &[("b", "^1.0.0")]);
    ws.add_package("b", "1.0.0", &[("a", "^1.0.0")]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);

    let mut visited = Vec::new();
    let result = GraphWalker::new(&workspace, &manifests).walk(|p| {
        visited.push(p.display_name());
        Ok(WalkAction::Continue)
    });

    match result {
        Err(Error::CircularDependency { chain }) => assert_eq!(chain, "a -> b -> a"),
        other => panic!("expected a cycle error, got {:?}", other),
    }
    assert!(visited.is_empty());
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let ws = TestWorkspace::new();
    ws.add_package("a", "1.0.0", &[("a", "^1.0.0")]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let result = GraphWalker::new(&workspace, &manifests).walk_order();

    match result {
        Err(Error::CircularDependency { chain }) => assert_eq!(chain, "a -> a"),
        other => panic!("expected a cycle error, got {:?}", other),
    }
}

#[test]
fn test_cycle_below_acyclic_prefix() {
    let ws = TestWorkspace::new();
    ws.add_package("app", "1.0.0", &[("b", "^1.0.0")]);
    ws.add_package("b", "1.0.0", &[("c", "^1.0.0")]);
    ws.add_package("c", "1.0.0", &[("d", "^1.0.0")]);
    ws.add_package("d", "1.0.0", &[("b", "^1.0.0")]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let err = GraphWalker::new(&workspace, &manifests)
        .walk_order()
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("b -> c -> d -> b"), "{}", message);
}

#[test]
fn test_visitor_can_stop_walk() {
    let ws = TestWorkspace::new();
    ws.add_package("a", "1.0.0", &[]);
    ws.add_package("b", "1.0.0", &[]);
    ws.add_package("c", "1.0.0", &[]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);

    let mut visited = Vec::new();
    let outcome = GraphWalker::new(&workspace, &manifests)
        .walk(|p| {
            visited.push(p.display_name());
            if p.name.as_deref() == Some("b") {
                Ok(WalkAction::Stop)
            } else {
                Ok(WalkAction::Continue)
            }
        })
        .unwrap();

    assert_eq!(outcome, WalkOutcome::Stopped);
    assert_eq!(visited, vec!["a", "b"]);
}

#[test]
fn test_visitor_error_aborts_walk() {
    let ws = TestWorkspace::new();
    ws.add_package("a", "1.0.0", &[]);
    ws.add_package("b", "1.0.0", &[]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);

    let mut visited = 0;
    let result = GraphWalker::new(&workspace, &manifests).walk(|_| {
        visited += 1;
        Err(Error::Release("boom".to_string()))
    });

    assert!(matches!(result, Err(Error::Release(_))));
    assert_eq!(visited, 1);
}

#[test]
fn test_walk_observes_rewritten_manifests() {
    let ws = TestWorkspace::new();
    ws.add_package("a", "1.0.0", &[]);
    ws.add_package("b", "1.0.0", &[]);

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let walker = GraphWalker::new(&workspace, &manifests);
    assert_eq!(names(&walker.walk_order().unwrap()), vec!["a", "b"]);

    let a = workspace.package_by_name("a").unwrap();
    let mut manifest = manifests.read_required(&a.path).unwrap();
    let mut data = manifest.as_value().clone();
    data.insert("dependencies".to_string(), json!({ "b": "^1.0.0" }));
    manifest = rollkit_core::Manifest::from_value(data);
    manifests.write(&a.path, &manifest).unwrap();

    assert_eq!(names(&walker.walk_order().unwrap()), vec!["b", "a"]);
}

#[test]
fn test_dependency_graph_queries() {
    let ws = TestWorkspace::new();
    ws.add_package("x", "1.0.0", &[("y", "^1.0.0")]);
    ws.add_package("y", "1.0.0", &[("z", "^1.0.0")]);
    ws.add_package("z", "1.0.0", &[]);
    ws.add_manifest(
        "w",
        json!({ "name": "w", "version": "1.0.0", "devDependencies": { "z": "^1.0.0" } }),
    );

    let manifests = ManifestCache::new();
    let workspace = ws.load(&manifests);
    let graph = DependencyGraph::build(&workspace, &manifests).unwrap();

    assert_eq!(
        graph.dependencies("x").unwrap(),
        vec![("y".to_string(), DepKind::Production)]
    );
    assert_eq!(
        graph.dependencies("w").unwrap(),
        vec![("z".to_string(), DepKind::Development)]
    );
    assert!(graph.dependencies("z").unwrap().is_empty());

    assert_eq!(graph.dependents("z").unwrap(), vec!["w", "y"]);

    let all = graph.all_dependents("z").unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.contains("x") && all.contains("y") && all.contains("w"));

    let mut roots = graph.roots();
    roots.sort();
    assert_eq!(roots, vec!["w", "x"]);

    assert!(matches!(
        graph.dependents("missing"),
        Err(Error::PackageNotFound { .. })
    ));
}
