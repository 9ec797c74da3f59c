//! Core library for incremental builds, versioning and releases of
//! multi-package repositories.

pub mod build;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod lockfile;
pub mod manifest;
pub mod package;
pub mod process;
pub mod propagate;
pub mod range;
pub mod registry;
pub mod release;
pub mod release_reporter;
pub mod retry;
pub mod runner;
pub mod state;
pub mod subset;
pub mod sync;
pub mod vcs;
pub mod version;
pub mod workspace;

pub use build::{BuildDecision, BuildEngine, BuildOutcome};
pub use config::{Config, PackageSettings, WorkspaceConfig};
pub use context::{ReleaseContext, VersionBump};
pub use error::{Error, Result};
pub use graph::{DependencyGraph, GraphWalker, WalkAction, WalkOutcome};
pub use lockfile::{KnownPackages, LocalPackageMeta, LockfileGenerator};
pub use manifest::{Manifest, ManifestCache, ManifestStore};
pub use package::{DepKind, DependencyEdge, Package};
pub use process::{CommandOutput, ProcessRunner};
pub use propagate::{RangePropagator, RangeUpdate};
pub use registry::{PackageInfo, Registry};
pub use release::{ReleaseEngine, ReleaseOptions, ReleaseReport, UncommittedPolicy};
pub use release_reporter::{ReleaseReporter, SilentReporter};
pub use retry::RetryPolicy;
pub use runner::{PackageFilter, Script, TaskResult, TaskRunner};
pub use state::{ModuleStateStore, Snapshot};
pub use subset::{AllFilesSubset, BuildSubset, PackListCache, PublishSubset, Subset};
pub use sync::{DependentUpdate, PublishReason, SyncEngine, SyncOutcome};
pub use vcs::{CommitInfo, Repository, VersionControl};
pub use version::{BumpType, Resolution, VersionResolver};
pub use workspace::{LocalDependency, Workspace};
