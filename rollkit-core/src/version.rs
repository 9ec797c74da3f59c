//! Next-version computation from tags, commit history and local updates.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};
use tracing::info;

use crate::error::{Error, Result};
use crate::manifest::ManifestStore;
use crate::package::Package;
use crate::vcs::{CommitInfo, Repository};

static CONVENTIONAL_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<type>[a-zA-Z]+)(?:\((?P<scope>[^)]+)\))?(?P<breaking>!)?: (?P<description>.+)$")
        .expect("valid conventional header regex")
});

static BREAKING_FOOTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^BREAKING[ -]CHANGE: .+$").expect("valid breaking footer regex")
});

pub const LATEST_TAG: &str = "latest";
pub const RECENT_TAG: &str = "recent";

pub const NO_REASON: &str = "no reason found to change package version";

/// Type of semantic version bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BumpType {
    /// Patch version bump (1.0.0 -> 1.0.1).
    Patch,
    /// Minor version bump (1.0.0 -> 1.1.0).
    Minor,
    /// Major version bump (1.0.0 -> 2.0.0).
    Major,
}

impl fmt::Display for BumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BumpType::Major => "major",
            BumpType::Minor => "minor",
            BumpType::Patch => "patch",
        };
        write!(f, "{}", s)
    }
}

/// A commit header following the conventional commit format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionalCommit {
    pub kind: String,
    pub scope: Option<String>,
    pub breaking: bool,
    pub description: String,
}

impl ConventionalCommit {
    pub fn is_feature(&self) -> bool {
        matches!(self.kind.as_str(), "feat" | "feature")
    }
}

/// Parses a full commit message; `None` if the header is not conventional.
pub fn parse_conventional(message: &str) -> Option<ConventionalCommit> {
    let header = message.lines().next()?.trim();
    let caps = CONVENTIONAL_HEADER.captures(header)?;

    Some(ConventionalCommit {
        kind: caps.name("type")?.as_str().to_lowercase(),
        scope: caps.name("scope").map(|m| m.as_str().to_string()),
        breaking: caps.name("breaking").is_some() || BREAKING_FOOTER.is_match(message),
        description: caps.name("description")?.as_str().to_string(),
    })
}

/// A commit whose subject is a bare version marks a previous release.
pub fn is_version_marker(subject: &str) -> bool {
    parse_tag_version(subject.trim()).is_some()
}

/// Parses `v1.2.3` or `1.2.3`.
pub fn parse_tag_version(tag: &str) -> Option<Version> {
    let raw = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(raw).ok()
}

/// Summary of the semantic commits since the baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitAnalysis {
    pub semantic_commits: usize,
    pub breaking: usize,
    pub features: usize,
}

impl CommitAnalysis {
    pub fn from_commits(commits: &[CommitInfo]) -> Self {
        let mut analysis = Self::default();
        for commit in commits {
            if is_version_marker(&commit.summary) {
                continue;
            }
            let Some(parsed) = parse_conventional(&commit.message) else {
                continue;
            };
            analysis.semantic_commits += 1;
            if parsed.breaking {
                analysis.breaking += 1;
            } else if parsed.is_feature() {
                analysis.features += 1;
            }
        }
        analysis
    }

    /// Bump implied by the commits, `None` if there are none.
    pub fn bump(&self) -> Option<BumpType> {
        if self.semantic_commits == 0 {
            None
        } else if self.breaking > 0 {
            Some(BumpType::Major)
        } else if self.features > 0 {
            Some(BumpType::Minor)
        } else {
            Some(BumpType::Patch)
        }
    }

    pub fn reason(&self) -> String {
        let changes = if self.breaking == 1 {
            format!("there is 1 BREAKING CHANGE and {} features", self.features)
        } else {
            format!(
                "there are {} BREAKING CHANGES and {} features",
                self.breaking, self.features
            )
        };
        format!("bumped by {} semantic commits: {}", self.semantic_commits, changes)
    }
}

fn prerelease(base: &Version, id: &str) -> Result<Prerelease> {
    Prerelease::new(&format!("{}.0", id)).map_err(|e| Error::InvalidVersion {
        package: "prerelease identifier".to_string(),
        version: format!("{}-{}.0", base, id),
        message: e.to_string(),
    })
}

/// Increments `version` like npm's `semver.inc`.
///
/// With a prerelease identifier the increment is `pre<bump>`: the plain
/// component is bumped and `-<id>.0` appended.
pub fn bump_version(version: &Version, bump: BumpType, prerelease_id: Option<&str>) -> Result<Version> {
    let mut next = version.clone();
    next.build = BuildMetadata::EMPTY;

    if let Some(id) = prerelease_id {
        match bump {
            BumpType::Major => {
                next.major += 1;
                next.minor = 0;
                next.patch = 0;
            }
            BumpType::Minor => {
                next.minor += 1;
                next.patch = 0;
            }
            BumpType::Patch => next.patch += 1,
        }
        next.pre = prerelease(&next, id)?;
        return Ok(next);
    }

    let on_prerelease = !version.pre.is_empty();
    match bump {
        BumpType::Major => {
            if !(on_prerelease && version.minor == 0 && version.patch == 0) {
                next.major += 1;
            }
            next.minor = 0;
            next.patch = 0;
        }
        BumpType::Minor => {
            if !(on_prerelease && version.patch == 0) {
                next.minor += 1;
            }
            next.patch = 0;
        }
        BumpType::Patch => {
            if !on_prerelease {
                next.patch += 1;
            }
        }
    }
    next.pre = Prerelease::EMPTY;
    Ok(next)
}

/// Highest version among the tags; prerelease tags only count when a
/// prerelease identifier is requested.
pub fn highest_tag_version<'a>(
    tags: impl IntoIterator<Item = &'a str>,
    prerelease_id: Option<&str>,
) -> Option<(Version, String)> {
    tags.into_iter()
        .filter_map(|tag| parse_tag_version(tag).map(|v| (v, tag.to_string())))
        .filter(|(v, _)| prerelease_id.is_some() || v.pre.is_empty())
        .max_by(|a, b| a.0.cmp(&b.0))
}

/// Outcome of version resolution for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub current: Version,
    pub new: Version,
    pub reasons: Vec<String>,
}

impl Resolution {
    pub fn is_bump(&self) -> bool {
        self.current != self.new
    }

    pub fn tag_name(&self) -> String {
        format!("v{}", self.new)
    }
}

/// Pure decision: commits first, then local updates, else unchanged.
pub fn decide(
    current: &Version,
    analysis: &CommitAnalysis,
    prerelease_id: Option<&str>,
    local_updates: &[String],
) -> Result<Resolution> {
    if let Some(bump) = analysis.bump() {
        return Ok(Resolution {
            current: current.clone(),
            new: bump_version(current, bump, prerelease_id)?,
            reasons: vec![analysis.reason()],
        });
    }

    if !local_updates.is_empty() {
        return Ok(Resolution {
            current: current.clone(),
            new: bump_version(current, BumpType::Patch, prerelease_id)?,
            reasons: local_updates.to_vec(),
        });
    }

    Ok(Resolution {
        current: current.clone(),
        new: current.clone(),
        reasons: vec![NO_REASON.to_string()],
    })
}

/// Publish dist-tag for a new version.
///
/// `published` is `None` when the package has never been published.
pub fn select_publish_tag(published: Option<&[Version]>, new_version: &Version) -> String {
    let Some(published) = published else {
        return LATEST_TAG.to_string();
    };

    if let Some(first) = new_version.pre.as_str().split('.').next().filter(|s| !s.is_empty()) {
        return first.to_string();
    }

    if published.iter().all(|v| v < new_version) {
        LATEST_TAG.to_string()
    } else {
        RECENT_TAG.to_string()
    }
}

/// Resolves and applies new versions using the manifest store and a repository.
pub struct VersionResolver<'a> {
    manifests: &'a dyn ManifestStore,
}

impl<'a> VersionResolver<'a> {
    pub fn new(manifests: &'a dyn ManifestStore) -> Self {
        Self { manifests }
    }

    /// Baseline version: highest eligible tag, else the manifest version.
    ///
    /// Returns the version and the tag it came from.
    ///
    /// # Errors
    ///
    /// Fails if neither a tag nor a valid manifest version exists.
    pub fn current_version(
        &self,
        package: &Package,
        repo: Option<&dyn Repository>,
        prerelease_id: Option<&str>,
    ) -> Result<(Version, Option<String>)> {
        if let Some(repo) = repo {
            let tags = repo.tags()?;
            if let Some((version, tag)) = highest_tag_version(tags.iter().map(String::as_str), prerelease_id) {
                return Ok((version, Some(tag)));
            }
        }

        let manifest = self.manifests.read_required(&package.path)?;
        let declared = manifest.version().ok_or_else(|| Error::InvalidManifest {
            path: package.path.join("package.json"),
            message: "missing \"version\"".to_string(),
        })?;
        let version = Version::parse(declared).map_err(|e| Error::InvalidVersion {
            package: package.display_name(),
            version: declared.to_string(),
            message: e.to_string(),
        })?;
        Ok((version, None))
    }

    /// Computes the next version for `package`.
    pub fn resolve(
        &self,
        package: &Package,
        repo: Option<&dyn Repository>,
        prerelease_id: Option<&str>,
        local_updates: &[String],
    ) -> Result<Resolution> {
        let (current, baseline_tag) = self.current_version(package, repo, prerelease_id)?;
        let commits = match repo {
            Some(repo) => repo.commits_since(baseline_tag.as_deref())?,
            None => Vec::new(),
        };
        let analysis = CommitAnalysis::from_commits(&commits);
        decide(&current, &analysis, prerelease_id, local_updates)
    }

    /// Writes the new version, optionally commits it as `v<version>`, and
    /// tags the current commit.
    ///
    /// Returns the tag name. Nothing is written on a dry run or when the
    /// version did not change.
    pub fn apply(
        &self,
        package: &Package,
        repo: Option<&dyn Repository>,
        resolution: &Resolution,
        commit: bool,
        dry_run: bool,
    ) -> Result<Option<String>> {
        if !resolution.is_bump() {
            info!(package = %package.display_name(), "no reason to bump version from {}", resolution.current);
            return Ok(None);
        }

        info!(
            package = %package.display_name(),
            "bumping version ({} -> {}): {}",
            resolution.current,
            resolution.new,
            resolution.reasons.join("; ")
        );

        let tag = resolution.tag_name();
        if dry_run {
            return Ok(Some(tag));
        }

        let mut manifest = self.manifests.read_required(&package.path)?;
        manifest.set_version(&resolution.new.to_string());
        self.manifests.write(&package.path, &manifest)?;

        if let Some(repo) = repo {
            if commit {
                repo.commit_all(&tag)?;
            }
            repo.create_tag(&tag)?;
        }
        Ok(Some(tag))
    }
}
