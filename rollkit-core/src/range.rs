//! Evaluation of npm-style semver ranges on top of `semver::VersionReq`.

use semver::{Version, VersionReq};

/// An npm range: a disjunction (`||`) of comparator sets.
#[derive(Debug, Clone)]
pub struct NpmRange {
    sets: Vec<VersionReq>,
}

/// `*` and the empty range accept any version.
pub fn is_wildcard(range: &str) -> bool {
    matches!(range.trim(), "" | "*")
}

fn is_operator(token: &str) -> bool {
    matches!(token, "<" | "<=" | ">" | ">=" | "=" | "~" | "^")
}

fn has_wildcard_part(version: &str) -> bool {
    version
        .split('.')
        .any(|part| matches!(part, "x" | "X" | "*"))
}

/// Rewrites one npm comparator into `semver` crate syntax.
fn normalize_comparator(token: &str) -> String {
    let op_len = token
        .find(|c: char| c.is_ascii_alphanumeric() || c == '*')
        .unwrap_or(token.len());
    let (op, version) = token.split_at(op_len);
    let version = version.trim_start_matches(['v', 'V']);

    if op.is_empty() || op == "=" {
        if has_wildcard_part(version) {
            version.to_string()
        } else {
            format!("={}", version)
        }
    } else {
        format!("{}{}", op, version)
    }
}

fn parse_set(set: &str) -> Option<VersionReq> {
    let set = set.trim();
    if set.is_empty() || set == "*" {
        return Some(VersionReq::STAR);
    }

    if let Some((low, high)) = set.split_once(" - ") {
        let req = format!(">={}, <={}", low.trim().trim_start_matches('v'), high.trim().trim_start_matches('v'));
        return VersionReq::parse(&req).ok();
    }

    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in set.split_whitespace() {
        if is_operator(token) {
            pending_op = Some(token);
            continue;
        }
        let joined = match pending_op.take() {
            Some(op) => format!("{}{}", op, token),
            None => token.to_string(),
        };
        comparators.push(normalize_comparator(&joined));
    }

    if pending_op.is_some() || comparators.is_empty() {
        return None;
    }

    VersionReq::parse(&comparators.join(", ")).ok()
}

impl NpmRange {
    /// Parses a range; `None` for non-semver specs such as `file:` or git URLs.
    pub fn parse(range: &str) -> Option<Self> {
        let sets = range
            .split("||")
            .map(parse_set)
            .collect::<Option<Vec<_>>>()?;
        Some(Self { sets })
    }

    pub fn satisfies(&self, version: &Version) -> bool {
        self.sets.iter().any(|req| req.matches(version))
    }
}

/// Whether `version` satisfies `range`; `None` if the range cannot be evaluated.
pub fn satisfies(version: &Version, range: &str) -> Option<bool> {
    NpmRange::parse(range).map(|r| r.satisfies(version))
}
