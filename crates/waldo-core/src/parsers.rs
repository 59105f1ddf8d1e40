//! Parsers for toolchain introspection output.
//!
//! None of these fail on unrecognized lines; they skip them.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Parses a `gradlew properties` dump into a key/value map.
///
/// Each line is split on its first `": "`; lines without the separator or
/// with an empty key or value are dropped.
pub fn parse_gradle_properties(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(": "))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, value)| !key.is_empty() && !value.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Parses the `subprojects` property, formatted
/// `[project ':m1', project ':m2']`, into module paths without the leading
/// colon.
pub fn parse_gradle_subprojects(value: &str) -> Vec<String> {
    let inner = value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    inner
        .split(',')
        .filter_map(|item| {
            let item = item.trim();
            let item = item.strip_prefix("project").unwrap_or(item).trim();
            let name = item.trim_matches(|c| c == '\'' || c == '"');
            let name = name.strip_prefix(':').unwrap_or(name).trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

/// A task from a `gradlew tasks --all` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradleTask {
    /// Module path, `app` or `feature:login`.
    pub module: String,
    pub name: String,
}

/// Parses lines of the form `<module>:<task>[ description]`.
///
/// Lines without a module prefix are skipped.
pub fn parse_gradle_tasks(text: &str) -> Vec<GradleTask> {
    text.lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|path| path.rsplit_once(':'))
        .filter(|(module, name)| !module.is_empty() && !name.is_empty())
        .map(|(module, name)| GradleTask {
            module: module.trim_start_matches(':').to_string(),
            name: name.to_string(),
        })
        .collect()
}

/// `xcodebuild -list -json` output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XcodeList {
    #[serde(default)]
    pub project: Option<XcodeListEntry>,
    #[serde(default)]
    pub workspace: Option<XcodeListEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XcodeListEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub schemes: Vec<String>,
    #[serde(default)]
    pub configurations: Vec<String>,
}

impl XcodeList {
    /// The workspace entry when present, otherwise the project entry.
    pub fn into_entry(self) -> Option<XcodeListEntry> {
        self.workspace.or(self.project)
    }
}

pub fn parse_xcode_list(bytes: &[u8]) -> Result<XcodeList, serde_json::Error> {
    serde_json::from_slice(bytes)
}

#[derive(Debug, Deserialize)]
struct BuildSettingsEntry {
    #[serde(rename = "buildSettings", default)]
    build_settings: BTreeMap<String, serde_json::Value>,
}

/// Parses `xcodebuild -showBuildSettings -json` output and returns the first
/// target's string-valued settings.
pub fn parse_build_settings(bytes: &[u8]) -> Result<BTreeMap<String, String>, serde_json::Error> {
    let entries: Vec<BuildSettingsEntry> = serde_json::from_slice(bytes)?;
    Ok(entries
        .into_iter()
        .next()
        .map(|entry| {
            entry
                .build_settings
                .into_iter()
                .filter_map(|(key, value)| match value {
                    serde_json::Value::String(value) => Some((key, value)),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default())
}

/// The parts of `package.json` waldo reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageJson {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
}

pub fn parse_package_json(bytes: &[u8]) -> Result<PackageJson, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Reads the top-level `name` from a `pubspec.yaml`.
pub fn parse_pubspec_name(text: &str) -> Result<Option<String>, serde_yaml::Error> {
    let doc: serde_yaml::Value = serde_yaml::from_str(text)?;
    Ok(doc
        .get("name")
        .and_then(serde_yaml::Value::as_str)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty()))
}
