//! Xcode simulator builds
//!
//! Containers are directories holding an `.xcworkspace` or `.xcodeproj`.
//! Introspection uses `xcodebuild -list -json`; the artifact location comes
//! from `xcodebuild -showBuildSettings -json`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::common::{BuildContext, BuildTarget, verify_app_bundle};
use super::{Builder, BuilderRecord, Driver, Made};
use crate::parsers::{parse_build_settings, parse_xcode_list};
use crate::prompt::{choose_optional, choose_string};
use crate::runner::ToolchainProcess;
use crate::types::{BuildPath, BuildToolFamily, Platform, Support, WaldoError};

const XCODEBUILD: &str = "xcodebuild";
const SIMULATOR_SDK: &str = "iphonesimulator";

/// Identifiers needed to reproduce an Xcode simulator build.
///
/// Exactly one of `workspace` and `project` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XcodeBuilder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
}

/// Result of `xcodebuild -list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XcodeBuildInfo {
    pub name: String,
    pub schemes: Vec<String>,
    /// Empty for workspaces.
    pub configurations: Vec<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl XcodeBuilder {
    pub fn for_workspace(workspace: impl Into<String>) -> Self {
        Self {
            workspace: Some(workspace.into()),
            ..Self::default()
        }
    }

    pub fn for_project(project: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            ..Self::default()
        }
    }

    /// Picks the right constructor from the file's extension.
    pub fn for_file(file_name: &str) -> Self {
        if file_name.ends_with(".xcworkspace") {
            Self::for_workspace(file_name)
        } else {
            Self::for_project(file_name)
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn with_configuration(mut self, configuration: Option<String>) -> Self {
        self.configuration = configuration.filter(|c| !c.trim().is_empty());
        self
    }

    /// Checks that exactly one of `workspace` / `project` is set.
    pub fn validate(&self) -> Result<(), String> {
        match (non_empty(&self.workspace), non_empty(&self.project)) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err("xcode builder sets both workspace and project".to_string()),
            (None, None) => Err("xcode builder needs a workspace or a project".to_string()),
        }
    }

    fn file_args(&self) -> Vec<String> {
        if let Some(workspace) = non_empty(&self.workspace) {
            vec!["-workspace".to_string(), workspace.to_string()]
        } else if let Some(project) = non_empty(&self.project) {
            vec!["-project".to_string(), project.to_string()]
        } else {
            Vec::new()
        }
    }

    /// `-workspace|-project`, then `-scheme` and `-configuration` when set.
    fn identifier_args(&self) -> Vec<String> {
        let mut args = self.file_args();
        if let Some(scheme) = non_empty(&self.scheme) {
            args.extend(["-scheme".to_string(), scheme.to_string()]);
        }
        if let Some(configuration) = non_empty(&self.configuration) {
            args.extend(["-configuration".to_string(), configuration.to_string()]);
        }
        args
    }

    /// Lists the schemes and configurations of the workspace or project.
    pub fn detect_build_info(
        &self,
        base_path: &Path,
        ctx: &mut BuildContext<'_>,
    ) -> Result<XcodeBuildInfo, WaldoError> {
        let process = ToolchainProcess::new(XCODEBUILD, base_path)
            .args(["-list", "-json"])
            .args(self.file_args());
        let output = ctx.probe_raw(&process, "Xcode project")?;
        let entry = parse_xcode_list(&output.stdout)
            .map_err(|e| WaldoError::introspection("Xcode project", e))?
            .into_entry()
            .ok_or_else(|| {
                WaldoError::introspection(
                    "Xcode project",
                    "xcodebuild -list reported neither a workspace nor a project",
                )
            })?;
        Ok(XcodeBuildInfo {
            name: entry.name,
            schemes: entry.schemes,
            configurations: entry.configurations,
        })
    }

    /// Build settings of the first target for a simulator build.
    pub fn detect_build_settings(
        &self,
        base_path: &Path,
        ctx: &mut BuildContext<'_>,
    ) -> Result<BTreeMap<String, String>, WaldoError> {
        let process = ToolchainProcess::new(XCODEBUILD, base_path)
            .args(["-showBuildSettings", "-sdk", SIMULATOR_SDK, "-json"])
            .args(self.identifier_args())
            .arg("build");
        let output = ctx.probe_raw(&process, "Xcode build settings")?;
        parse_build_settings(&output.stdout)
            .map_err(|e| WaldoError::introspection("Xcode build settings", e))
    }

    /// `CONFIGURATION_BUILD_DIR/FULL_PRODUCT_NAME` as reported by Xcode.
    pub fn artifact_path(
        &self,
        base_path: &Path,
        ctx: &mut BuildContext<'_>,
    ) -> Result<PathBuf, WaldoError> {
        let settings = self.detect_build_settings(base_path, ctx)?;
        artifact_path_from_settings(&settings)
    }

    fn action(&self, base_path: &Path, action: &str, verbose: bool) -> ToolchainProcess {
        ToolchainProcess::new(XCODEBUILD, base_path)
            .args(self.identifier_args())
            .args(["-sdk", SIMULATOR_SDK])
            .arg(if verbose { "-verbose" } else { "-quiet" })
            .arg(action)
    }
}

fn artifact_path_from_settings(settings: &BTreeMap<String, String>) -> Result<PathBuf, WaldoError> {
    let build_dir = settings
        .get("CONFIGURATION_BUILD_DIR")
        .or_else(|| settings.get("TARGET_BUILD_DIR"))
        .ok_or_else(|| {
            WaldoError::introspection("Xcode build settings", "missing CONFIGURATION_BUILD_DIR")
        })?;
    let product = settings.get("FULL_PRODUCT_NAME").ok_or_else(|| {
        WaldoError::introspection("Xcode build settings", "missing FULL_PRODUCT_NAME")
    })?;
    Ok(Path::new(build_dir).join(product))
}

impl Builder for XcodeBuilder {
    fn summarize(&self) -> String {
        let mut parts = Vec::new();
        if let Some(workspace) = non_empty(&self.workspace) {
            parts.push(format!("workspace: {workspace}"));
        }
        if let Some(project) = non_empty(&self.project) {
            parts.push(format!("project: {project}"));
        }
        if let Some(scheme) = non_empty(&self.scheme) {
            parts.push(format!("scheme: {scheme}"));
        }
        if let Some(configuration) = non_empty(&self.configuration) {
            parts.push(format!("configuration: {configuration}"));
        }
        parts.join(", ")
    }

    fn clean(&self, target: BuildTarget<'_>, ctx: &mut BuildContext<'_>) -> Result<(), WaldoError> {
        ctx.say("Cleaning Xcode build...")?;
        let process = self.action(target.base_path, "clean", ctx.verbose);
        ctx.stream(&process, "Xcode clean")
    }

    fn build(
        &self,
        target: BuildTarget<'_>,
        clean: bool,
        ctx: &mut BuildContext<'_>,
    ) -> Result<PathBuf, WaldoError> {
        let artifact = self.artifact_path(target.base_path, ctx)?;
        if clean {
            self.clean(target, ctx)?;
        }

        ctx.say("Building with xcodebuild...")?;
        let process = self.action(target.base_path, "build", ctx.verbose);
        ctx.stream(&process, "Xcode build")?;

        verify_app_bundle(&artifact)
    }
}

/// Discovers and introspects Xcode containers.
pub struct XcodeDriver;

impl XcodeDriver {
    /// Workspace and project directory names at the container root, sorted.
    pub fn container_files(path: &Path) -> (Vec<String>, Vec<String>) {
        let mut workspaces = Vec::new();
        let mut projects = Vec::new();
        let Ok(entries) = fs::read_dir(path) else {
            return (workspaces, projects);
        };
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".xcworkspace") {
                workspaces.push(name);
            } else if name.ends_with(".xcodeproj") {
                projects.push(name);
            }
        }
        workspaces.sort();
        projects.sort();
        (workspaces, projects)
    }
}

impl Driver for XcodeDriver {
    fn family(&self) -> BuildToolFamily {
        BuildToolFamily::Xcode
    }

    fn is_container(&self, path: &Path) -> Option<Support> {
        let (workspaces, projects) = Self::container_files(path);
        (!workspaces.is_empty() || !projects.is_empty()).then_some(Support::IOS)
    }

    fn make(&self, build_path: &BuildPath, ctx: &mut BuildContext<'_>) -> Result<Made, WaldoError> {
        let base_path = &build_path.abs_path;
        let (workspaces, projects) = Self::container_files(base_path);
        let files = if workspaces.is_empty() { projects } else { workspaces };
        let file = choose_string(ctx.io, &files, "Xcode workspace or project")?;

        ctx.say(format_args!("Searching for schemes in {file}..."))?;
        let builder = XcodeBuilder::for_file(&file);
        let info = builder.detect_build_info(base_path, ctx)?;
        let scheme = choose_string(ctx.io, &info.schemes, "Xcode scheme")?;
        let configuration = choose_optional(ctx.io, &info.configurations, "Xcode configuration")?;

        Ok(Made {
            builder: BuilderRecord::Xcode(
                builder
                    .with_scheme(scheme.clone())
                    .with_configuration(configuration),
            ),
            app_name: scheme,
            platform: Platform::Ios,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedRunner, test_io};

    const LIST_WORKSPACE: &str = "xcodebuild -list -json -workspace App.xcworkspace";
    const SETTINGS_APP: &str = "xcodebuild -showBuildSettings -sdk iphonesimulator -json -workspace App.xcworkspace -scheme App build";

    fn container() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("App.xcworkspace")).unwrap();
        fs::create_dir(dir.path().join("App.xcodeproj")).unwrap();
        dir
    }

    fn settings_json(build_dir: &Path) -> String {
        format!(
            r#"[{{"target":"App","buildSettings":{{"CONFIGURATION_BUILD_DIR":"{}","FULL_PRODUCT_NAME":"App.app"}}}}]"#,
            build_dir.display()
        )
    }

    fn build_path(dir: &Path) -> BuildPath {
        BuildPath {
            abs_path: dir.to_path_buf(),
            rel_path: PathBuf::from("."),
            family: BuildToolFamily::Xcode,
            android_support: false,
            ios_support: true,
        }
    }

    #[test]
    fn container_needs_workspace_or_project_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(XcodeDriver.is_container(dir.path()), None);
        fs::write(dir.path().join("Fake.xcodeproj"), b"").unwrap();
        assert_eq!(XcodeDriver.is_container(dir.path()), None);
        fs::create_dir(dir.path().join("Real.xcodeproj")).unwrap();
        assert_eq!(XcodeDriver.is_container(dir.path()), Some(Support::IOS));
    }

    #[test]
    fn validate_requires_exactly_one_file() {
        assert!(XcodeBuilder::for_workspace("App.xcworkspace").validate().is_ok());
        assert!(XcodeBuilder::default().validate().is_err());
        let both = XcodeBuilder {
            project: Some("App.xcodeproj".into()),
            ..XcodeBuilder::for_workspace("App.xcworkspace")
        };
        assert!(both.validate().is_err());
        let blank = XcodeBuilder::for_project("  ");
        assert!(blank.validate().is_err());
    }

    #[test]
    fn make_prefers_workspaces_and_uses_scheme_as_app_name() {
        let dir = container();
        let runner = ScriptedRunner::new().respond(
            LIST_WORKSPACE,
            r#"{"workspace":{"name":"App","schemes":["App","AppUITests"]}}"#,
        );
        let (mut io, out, _) = test_io("1\n");
        let mut ctx = BuildContext::new(&runner, &mut io);

        let made = XcodeDriver.make(&build_path(dir.path()), &mut ctx).unwrap();
        assert_eq!(made.app_name, "App");
        assert_eq!(made.platform, Platform::Ios);
        assert_eq!(
            made.builder,
            BuilderRecord::Xcode(XcodeBuilder::for_workspace("App.xcworkspace").with_scheme("App"))
        );
        assert!(out.contents().contains("Using Xcode workspace or project: App.xcworkspace"));
        assert_eq!(runner.calls()[0].working_dir, dir.path());
    }

    #[test]
    fn make_offers_project_configurations() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Runner.xcodeproj")).unwrap();
        let runner = ScriptedRunner::new().respond(
            "xcodebuild -list -json -project Runner.xcodeproj",
            r#"{"project":{"name":"Runner","schemes":["Runner"],"configurations":["Release","Debug"]}}"#,
        );
        let (mut io, _, _) = test_io("1\n");
        let mut ctx = BuildContext::new(&runner, &mut io);

        let made = XcodeDriver.make(&build_path(dir.path()), &mut ctx).unwrap();
        let BuilderRecord::Xcode(builder) = made.builder else {
            panic!("expected an xcode builder");
        };
        assert_eq!(builder.configuration.as_deref(), Some("Debug"));
        assert_eq!(builder.project.as_deref(), Some("Runner.xcodeproj"));
    }

    #[test]
    fn make_fails_on_empty_scheme_list() {
        let dir = container();
        let runner = ScriptedRunner::new()
            .respond(LIST_WORKSPACE, r#"{"workspace":{"name":"App","schemes":[]}}"#);
        let (mut io, _, _) = test_io("");
        let mut ctx = BuildContext::new(&runner, &mut io);
        let err = XcodeDriver.make(&build_path(dir.path()), &mut ctx).unwrap_err();
        assert!(matches!(err, WaldoError::EmptySet(what) if what == "Xcode scheme"));
    }

    #[test]
    fn list_failure_is_introspection_failure() {
        let dir = container();
        let runner = ScriptedRunner::new().fail(LIST_WORKSPACE, 66);
        let (mut io, _, _) = test_io("");
        let mut ctx = BuildContext::new(&runner, &mut io);
        let err = XcodeDriver.make(&build_path(dir.path()), &mut ctx).unwrap_err();
        assert!(matches!(err, WaldoError::IntrospectionFailed { .. }));
    }

    #[test]
    fn build_locates_and_verifies_the_app_bundle() {
        let dir = container();
        let build_dir = dir.path().join("build/Debug-iphonesimulator");
        fs::create_dir_all(build_dir.join("App.app")).unwrap();
        let runner = ScriptedRunner::new().respond(SETTINGS_APP, &settings_json(&build_dir));
        let (mut io, _, _) = test_io("");
        let mut ctx = BuildContext::new(&runner, &mut io);

        let builder = XcodeBuilder::for_workspace("App.xcworkspace").with_scheme("App");
        let target = BuildTarget::new(dir.path(), Platform::Ios);
        let artifact = builder.build(target, true, &mut ctx).unwrap();
        assert_eq!(artifact, build_dir.join("App.app"));
        assert_eq!(
            runner.command_lines(),
            vec![
                SETTINGS_APP.to_string(),
                "xcodebuild -workspace App.xcworkspace -scheme App -sdk iphonesimulator -quiet clean".to_string(),
                "xcodebuild -workspace App.xcworkspace -scheme App -sdk iphonesimulator -quiet build".to_string(),
            ]
        );

        // A second build without clean reaches the same artifact.
        let again = builder.build(target, false, &mut ctx).unwrap();
        assert_eq!(again, artifact);
    }

    #[test]
    fn build_without_bundle_is_artifact_missing() {
        let dir = container();
        let build_dir = dir.path().join("build/Debug-iphonesimulator");
        let runner = ScriptedRunner::new().respond(SETTINGS_APP, &settings_json(&build_dir));
        let (mut io, _, _) = test_io("");
        let mut ctx = BuildContext::new(&runner, &mut io).verbose(true);

        let builder = XcodeBuilder::for_workspace("App.xcworkspace").with_scheme("App");
        let err = builder
            .build(BuildTarget::new(dir.path(), Platform::Ios), false, &mut ctx)
            .unwrap_err();
        assert!(matches!(err, WaldoError::ArtifactMissing { .. }));
        assert!(runner.command_lines()[1].ends_with("-verbose build"));
    }

    #[test]
    fn settings_fall_back_to_target_build_dir() {
        let mut settings = BTreeMap::new();
        settings.insert("TARGET_BUILD_DIR".to_string(), "/out".to_string());
        settings.insert("FULL_PRODUCT_NAME".to_string(), "App.app".to_string());
        assert_eq!(
            artifact_path_from_settings(&settings).unwrap(),
            PathBuf::from("/out/App.app")
        );
        settings.remove("FULL_PRODUCT_NAME");
        assert!(artifact_path_from_settings(&settings).is_err());
    }

    #[test]
    fn summary_lists_identifiers() {
        let builder = XcodeBuilder::for_project("App.xcodeproj")
            .with_scheme("App")
            .with_configuration(Some("Debug".into()));
        assert_eq!(
            builder.summarize(),
            "project: App.xcodeproj, scheme: App, configuration: Debug"
        );
    }
}
