//! Build and version information
//!
//! Values are stamped in at compile time by the build script. Anything it
//! could not determine (no git checkout, for instance) is left empty.

use chrono::DateTime;
use serde::Serialize;

/// Everything known about how this binary was built
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub git_commit: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub git_commit_date: String,
    pub git_branch: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub git_state: String,
    pub build_date: String,
    pub rustc_version: String,
    /// `<arch>-<vendor>-<os>` target triple
    pub platform: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prerelease: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub build_metadata: String,
}

/// Raw build-script values, before interpretation
#[derive(Debug, Clone, Copy, Default)]
struct Stamp {
    version: &'static str,
    git_commit: &'static str,
    git_commit_stamp: &'static str,
    git_branch: &'static str,
    git_state: &'static str,
    build_stamp: &'static str,
    rustc_version: &'static str,
    target: &'static str,
}

const STAMP: Stamp = Stamp {
    version: match option_env!("STOREKIT_BUILD_VERSION") {
        Some(v) => v,
        None => env!("CARGO_PKG_VERSION"),
    },
    git_commit: match option_env!("STOREKIT_GIT_COMMIT") {
        Some(v) => v,
        None => "",
    },
    git_commit_stamp: match option_env!("STOREKIT_GIT_COMMIT_STAMP") {
        Some(v) => v,
        None => "",
    },
    git_branch: match option_env!("STOREKIT_GIT_BRANCH") {
        Some(v) => v,
        None => "",
    },
    git_state: match option_env!("STOREKIT_GIT_STATE") {
        Some(v) => v,
        None => "",
    },
    build_stamp: match option_env!("STOREKIT_BUILD_STAMP") {
        Some(v) => v,
        None => "",
    },
    rustc_version: match option_env!("STOREKIT_RUSTC_VERSION") {
        Some(v) => v,
        None => "",
    },
    target: match option_env!("STOREKIT_TARGET") {
        Some(v) => v,
        None => "",
    },
};

/// Build information for this binary
pub fn get() -> BuildInfo {
    BuildInfo::from_stamp(STAMP)
}

/// The bare version string
pub fn string() -> &'static str {
    STAMP.version
}

/// `<version>-<first 7 of commit>`, or just the version without a commit
pub fn short() -> String {
    short_form(STAMP.version, STAMP.git_commit)
}

/// Two-column table, labels right-aligned
pub fn text() -> String {
    get().to_table()
}

/// Pretty-printed JSON
pub fn json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&get())
}

fn short_form(version: &str, commit: &str) -> String {
    match commit.get(..7) {
        Some(prefix) => format!("{}-{}", version, prefix),
        None => version.to_string(),
    }
}

/// Format a unix timestamp string as `YYYY-MM-DD HH:MM:SS` (UTC)
fn format_stamp(stamp: &str) -> String {
    stamp
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Prerelease and build metadata of a semantic version, if it is one
fn parse_semver(version: &str) -> Option<(String, String)> {
    let version = version.strip_prefix('v').unwrap_or(version);
    let (rest, build) = match version.split_once('+') {
        Some((rest, build)) => (rest, build),
        None => (version, ""),
    };
    let (core, prerelease) = match rest.split_once('-') {
        Some((core, pre)) => (core, pre),
        None => (rest, ""),
    };

    let numeric = core.split('.').collect::<Vec<_>>();
    let valid = numeric.len() == 3
        && numeric
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    valid.then(|| (prerelease.to_string(), build.to_string()))
}

impl BuildInfo {
    fn from_stamp(stamp: Stamp) -> Self {
        let (prerelease, build_metadata) = parse_semver(stamp.version).unwrap_or_default();
        Self {
            version: stamp.version.to_string(),
            git_commit: stamp.git_commit.to_string(),
            git_commit_date: format_stamp(stamp.git_commit_stamp),
            git_branch: stamp.git_branch.to_string(),
            git_state: stamp.git_state.to_string(),
            build_date: format_stamp(stamp.build_stamp),
            rustc_version: stamp.rustc_version.to_string(),
            platform: stamp.target.to_string(),
            prerelease,
            build_metadata,
        }
    }

    fn to_table(&self) -> String {
        let rows = [
            ("version", &self.version),
            ("git commit", &self.git_commit),
            ("git commit date", &self.git_commit_date),
            ("git branch", &self.git_branch),
            ("git state", &self.git_state),
            ("build date", &self.build_date),
            ("rustc version", &self.rustc_version),
            ("platform", &self.platform),
        ];
        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        rows.iter()
            .map(|(label, value)| format!("{:>width$} {}", label, value, width = width))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_semver() {
        assert_eq!(
            parse_semver("1.2.3-rc.1+build.5"),
            Some(("rc.1".to_string(), "build.5".to_string()))
        );
        assert_eq!(
            parse_semver("v0.1.0"),
            Some((String::new(), String::new()))
        );
        assert_eq!(parse_semver("1.2"), None);
        assert_eq!(parse_semver("dev"), None);
    }

    #[test]
    fn test_short_form() {
        assert_eq!(short_form("1.0.0", "0123456789abcdef"), "1.0.0-0123456");
        assert_eq!(short_form("1.0.0", ""), "1.0.0");
        assert_eq!(short_form("1.0.0", "abc"), "1.0.0");
    }

    #[test]
    fn test_format_stamp() {
        assert_eq!(format_stamp("0"), "1970-01-01 00:00:00");
        assert_eq!(format_stamp(""), "");
        assert_eq!(format_stamp("soon"), "");
    }

    #[test]
    fn test_from_stamp_without_git() {
        let info = BuildInfo::from_stamp(Stamp {
            version: "2.0.0-beta+exp",
            ..Stamp::default()
        });
        assert_eq!(info.prerelease, "beta");
        assert_eq!(info.build_metadata, "exp");
        assert!(info.git_commit.is_empty());
        assert!(info.git_commit_date.is_empty());

        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("git_state").is_none());
        assert_eq!(json["git_commit"], "");
    }

    #[test]
    fn test_table_right_aligns_labels() {
        let info = BuildInfo::from_stamp(Stamp {
            version: "1.0.0",
            ..Stamp::default()
        });
        let table = info.to_table();
        let first = table.lines().next().unwrap();
        assert_eq!(first, "        version 1.0.0");
        assert!(table.lines().any(|l| l.starts_with("git commit date")));
    }

    #[test]
    fn test_current_build() {
        let info = get();
        assert_eq!(info.version, string());
        assert!(short().starts_with(string()));
        assert!(json().unwrap().contains("\"version\""));
        assert!(text().contains("version"));
    }
}
