//! React Native builds through `npx react-native`
//!
//! Clean, artifact location and verification are delegated to the Gradle
//! builder on `android/` or the Xcode builder on `ios/`, constructed with
//! React Native's project conventions.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::common::{BuildContext, BuildTarget, dir_name, verify_app_bundle};
use super::gradle::{self, GradleBuilder, GradleDriver};
use super::xcode::{XcodeBuilder, XcodeDriver};
use super::{Builder, BuilderRecord, Driver, Made};
use crate::parsers::{PackageJson, parse_package_json};
use crate::prompt::{choose, choose_string};
use crate::runner::ToolchainProcess;
use crate::types::{BuildPath, BuildToolFamily, Platform, Support, WaldoError};

const NPX: &str = "npx";
const ANDROID_MODULE: &str = "app";

/// Identifiers needed to reproduce a React Native build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactNativeBuilder {
    /// Gradle variant (Android) or Xcode configuration (iOS).
    pub mode: String,
}

/// Result of React Native introspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactNativeBuildInfo {
    pub package: PackageJson,
    pub modes: Vec<String>,
}

/// Reads and parses `package.json` in `base_path`.
pub fn read_package_json(base_path: &Path) -> Result<PackageJson, WaldoError> {
    let bytes = fs::read(base_path.join("package.json"))?;
    Ok(parse_package_json(&bytes)?)
}

impl ReactNativeBuilder {
    pub fn new(mode: impl Into<String>) -> Self {
        Self { mode: mode.into() }
    }

    fn package_name(base_path: &Path) -> Result<String, WaldoError> {
        let package = read_package_json(base_path)?;
        if package.name.trim().is_empty() {
            Ok(dir_name(base_path))
        } else {
            Ok(package.name)
        }
    }

    fn gradle(&self) -> GradleBuilder {
        GradleBuilder::new(ANDROID_MODULE, self.mode.clone())
    }

    fn xcode(&self, name: &str) -> XcodeBuilder {
        XcodeBuilder::for_workspace(format!("{name}.xcworkspace"))
            .with_scheme(name)
            .with_configuration(Some(self.mode.clone()))
    }

    fn build_process(&self, base_path: &Path, platform: Platform, verbose: bool) -> ToolchainProcess {
        let mut process = ToolchainProcess::new(NPX, base_path).args(["--no-install", "react-native"]);
        if platform == Platform::Android {
            process = process.args(["build-android", "--mode", self.mode.as_str(), "--no-packager"]);
        } else {
            process = process
                .args(["build-ios", "--mode", self.mode.as_str()])
                .env("FORCE_BUNDLING", "1");
        }
        if verbose {
            process = process.arg("--verbose");
        }
        process
    }
}

fn unsupported_target(platform: Platform) -> WaldoError {
    WaldoError::BuildFailed {
        what: "React Native build".to_string(),
        code: None,
        reason: format!("{platform} is not a React Native target platform"),
    }
}

impl Builder for ReactNativeBuilder {
    fn summarize(&self) -> String {
        format!("mode: {}", self.mode)
    }

    fn clean(&self, target: BuildTarget<'_>, ctx: &mut BuildContext<'_>) -> Result<(), WaldoError> {
        match target.platform {
            Platform::Android => {
                let android = target.base_path.join("android");
                self.gradle()
                    .clean(BuildTarget::new(&android, Platform::Android), ctx)
            }
            Platform::Ios => {
                let name = Self::package_name(target.base_path)?;
                let ios = target.base_path.join("ios");
                self.xcode(&name)
                    .clean(BuildTarget::new(&ios, Platform::Ios), ctx)
            }
            other => Err(unsupported_target(other)),
        }
    }

    fn build(
        &self,
        target: BuildTarget<'_>,
        clean: bool,
        ctx: &mut BuildContext<'_>,
    ) -> Result<PathBuf, WaldoError> {
        let base_path = target.base_path;
        let android = base_path.join("android");
        let ios = base_path.join("ios");

        let artifact = match target.platform {
            Platform::Android => self.gradle().artifact_root(&android, ctx)?,
            Platform::Ios => {
                let name = Self::package_name(base_path)?;
                self.xcode(&name).artifact_path(&ios, ctx)?
            }
            other => return Err(unsupported_target(other)),
        };
        if clean {
            self.clean(target, ctx)?;
        }

        ctx.say(format_args!("Building {} app with React Native...", target.platform))?;
        let process = self.build_process(base_path, target.platform, ctx.verbose);
        ctx.stream(&process, "React Native build")?;

        match target.platform {
            Platform::Android => self.gradle().verify(&artifact),
            _ => verify_app_bundle(&artifact),
        }
    }
}

/// Android modes: Gradle variants of `app` named `release`.
fn android_modes(base_path: &Path, ctx: &mut BuildContext<'_>) -> Vec<String> {
    match gradle::detect_variants(&base_path.join("android"), ANDROID_MODULE, ctx) {
        Ok(variants) => variants
            .into_iter()
            .filter(|v| v.eq_ignore_ascii_case("release"))
            .collect(),
        Err(err) => {
            tracing::warn!(error = %err, "falling back to default React Native Android mode");
            vec!["release".to_string()]
        }
    }
}

/// iOS modes: Xcode configurations of `<name>.xcodeproj` named `debug`.
fn ios_modes(base_path: &Path, name: &str, ctx: &mut BuildContext<'_>) -> Vec<String> {
    let project = XcodeBuilder::for_project(format!("{name}.xcodeproj"));
    match project.detect_build_info(&base_path.join("ios"), ctx) {
        Ok(info) => info
            .configurations
            .into_iter()
            .filter(|c| c.eq_ignore_ascii_case("debug"))
            .collect(),
        Err(err) => {
            tracing::warn!(error = %err, "falling back to default React Native iOS mode");
            vec!["Debug".to_string()]
        }
    }
}

/// Discovers and introspects React Native containers.
pub struct ReactNativeDriver;

impl ReactNativeDriver {
    pub fn detect_build_info(
        base_path: &Path,
        platform: Platform,
        ctx: &mut BuildContext<'_>,
    ) -> Result<ReactNativeBuildInfo, WaldoError> {
        let package = read_package_json(base_path)?;
        let name = if package.name.trim().is_empty() {
            dir_name(base_path)
        } else {
            package.name.clone()
        };
        let modes = match platform {
            Platform::Android => android_modes(base_path, ctx),
            _ => ios_modes(base_path, &name, ctx),
        };
        Ok(ReactNativeBuildInfo { package, modes })
    }
}

impl Driver for ReactNativeDriver {
    fn family(&self) -> BuildToolFamily {
        BuildToolFamily::ReactNative
    }

    fn is_container(&self, path: &Path) -> Option<Support> {
        let package = read_package_json(path).ok()?;
        if !package.dependencies.contains_key("react-native")
            || package.dependencies.contains_key("expo")
        {
            return None;
        }
        let support = Support {
            android: GradleDriver.is_container(&path.join("android")).is_some(),
            ios: XcodeDriver.is_container(&path.join("ios")).is_some(),
        };
        support.any().then_some(support)
    }

    fn make(&self, build_path: &BuildPath, ctx: &mut BuildContext<'_>) -> Result<Made, WaldoError> {
        let base_path = &build_path.abs_path;
        let platform = choose(ctx.io, &build_path.support().platforms(), "platform", |p| {
            p.to_string()
        })?;

        ctx.say(format_args!("Searching for {platform} build modes..."))?;
        let info = ReactNativeDriver::detect_build_info(base_path, platform, ctx)?;
        let mode = choose_string(ctx.io, &info.modes, "React Native mode")?;

        let app_name = if info.package.name.trim().is_empty() {
            dir_name(base_path)
        } else {
            info.package.name
        };
        Ok(Made {
            builder: BuilderRecord::ReactNative(ReactNativeBuilder::new(mode)),
            app_name,
            platform,
        })
    }
}
