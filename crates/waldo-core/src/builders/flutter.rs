//! Flutter builds
//!
//! Flavors are discovered by delegating to the Gradle builder on `android/`
//! (module `app`) or the Xcode builder on `ios/` (`Runner.xcodeproj`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::common::{BuildContext, BuildTarget, dir_name, verify_apk_file, verify_app_bundle};
use super::gradle::{self, GradleDriver};
use super::xcode::{XcodeBuilder, XcodeDriver};
use super::{Builder, BuilderRecord, Driver, Made};
use crate::parsers::parse_pubspec_name;
use crate::prompt::{choose, choose_string};
use crate::runner::ToolchainProcess;
use crate::types::{BuildPath, BuildToolFamily, Platform, Support, WaldoError};

const FLUTTER: &str = "flutter";
const RUNNER_PROJECT: &str = "Runner.xcodeproj";
const BUILD_MODES: [&str; 3] = ["debug", "profile", "release"];

/// Identifiers needed to reproduce a Flutter build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlutterBuilder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
}

impl FlutterBuilder {
    pub fn new(flavor: Option<String>) -> Self {
        Self {
            flavor: flavor.filter(|f| !f.trim().is_empty()),
        }
    }

    fn flavor_or_default(&self) -> &str {
        self.flavor.as_deref().unwrap_or("debug")
    }

    /// Where `flutter build` leaves the artifact for `platform`.
    pub fn artifact_path(&self, base_path: &Path, platform: Platform) -> Result<PathBuf, WaldoError> {
        match platform {
            Platform::Android => Ok(base_path
                .join("build/app/outputs/flutter-apk")
                .join(format!("app-{}.apk", self.flavor_or_default().to_lowercase()))),
            Platform::Ios => Ok(base_path.join("build/ios/iphonesimulator/Runner.app")),
            other => Err(WaldoError::BuildFailed {
                what: "Flutter build".to_string(),
                code: None,
                reason: format!("{other} is not a Flutter target platform"),
            }),
        }
    }

    fn build_process(&self, base_path: &Path, platform: Platform, verbose: bool) -> ToolchainProcess {
        let mut process = ToolchainProcess::new(FLUTTER, base_path).arg("build");
        if platform == Platform::Android {
            let flavor = self.flavor_or_default();
            let mode = BUILD_MODES
                .iter()
                .find(|mode| mode.eq_ignore_ascii_case(flavor));
            process = process.arg("apk");
            process = match mode {
                Some(mode) => process.arg(format!("--{mode}")),
                None => process.args(["--flavor", flavor]),
            };
            process = process.arg("--no-tree-shake-icons");
        } else {
            process = process.args(["ios", "--simulator", "--no-codesign", "--no-tree-shake-icons"]);
        }
        if verbose {
            process = process.arg("--verbose");
        }
        process
    }
}

impl Builder for FlutterBuilder {
    fn summarize(&self) -> String {
        match &self.flavor {
            Some(flavor) => format!("flavor: {flavor}"),
            None => "default flavor".to_string(),
        }
    }

    fn clean(&self, target: BuildTarget<'_>, ctx: &mut BuildContext<'_>) -> Result<(), WaldoError> {
        ctx.say("Cleaning Flutter build...")?;
        let mut process = ToolchainProcess::new(FLUTTER, target.base_path).arg("clean");
        if ctx.verbose {
            process = process.arg("--verbose");
        }
        ctx.stream(&process, "Flutter clean")
    }

    fn build(
        &self,
        target: BuildTarget<'_>,
        clean: bool,
        ctx: &mut BuildContext<'_>,
    ) -> Result<PathBuf, WaldoError> {
        let artifact = self.artifact_path(target.base_path, target.platform)?;
        if clean {
            self.clean(target, ctx)?;
        }

        ctx.say(format_args!("Building {} app with Flutter...", target.platform))?;
        let process = self.build_process(target.base_path, target.platform, ctx.verbose);
        ctx.stream(&process, "Flutter build")?;

        if target.platform == Platform::Android {
            verify_apk_file(&artifact)
        } else {
            verify_app_bundle(&artifact)
        }
    }
}

/// Reads the package name from `pubspec.yaml`.
pub fn read_pubspec_name(base_path: &Path) -> Result<Option<String>, WaldoError> {
    let text = fs::read_to_string(base_path.join("pubspec.yaml"))?;
    Ok(parse_pubspec_name(&text)?)
}

/// Android flavors: every variant Gradle reports for module `app`.
fn android_flavors(base_path: &Path, ctx: &mut BuildContext<'_>) -> Vec<String> {
    match gradle::detect_variants(&base_path.join("android"), "app", ctx) {
        Ok(variants) => variants,
        Err(err) => {
            tracing::warn!(error = %err, "falling back to default Flutter Android flavors");
            vec!["debug".to_string(), "release".to_string()]
        }
    }
}

/// iOS flavors: Runner configurations other than Profile and Release.
fn ios_flavors(base_path: &Path, ctx: &mut BuildContext<'_>) -> Vec<String> {
    let runner = XcodeBuilder::for_project(RUNNER_PROJECT);
    match runner.detect_build_info(&base_path.join("ios"), ctx) {
        Ok(info) => info
            .configurations
            .into_iter()
            .filter(|c| {
                let lower = c.to_lowercase();
                lower != "profile" && lower != "release"
            })
            .collect(),
        Err(err) => {
            tracing::warn!(error = %err, "falling back to default Flutter iOS flavors");
            vec!["Debug".to_string()]
        }
    }
}

/// Discovers and introspects Flutter containers.
pub struct FlutterDriver;

impl Driver for FlutterDriver {
    fn family(&self) -> BuildToolFamily {
        BuildToolFamily::Flutter
    }

    fn is_container(&self, path: &Path) -> Option<Support> {
        if !path.join("pubspec.yaml").is_file() {
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
        let name = read_pubspec_name(base_path)?.unwrap_or_else(|| dir_name(base_path));

        let platform = choose(ctx.io, &build_path.support().platforms(), "platform", |p| {
            p.to_string()
        })?;

        ctx.say(format_args!("Searching for {platform} flavors of '{name}'..."))?;
        let flavors = match platform {
            Platform::Android => android_flavors(base_path, ctx),
            _ => ios_flavors(base_path, ctx),
        };
        let flavor = choose_string(ctx.io, &flavors, "Flutter flavor")?;

        Ok(Made {
            builder: BuilderRecord::Flutter(FlutterBuilder::new(Some(flavor))),
            app_name: name,
            platform,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::gradle::wrapper_name;
    use crate::runner::Environment;
    use crate::testing::{ScriptedRunner, test_io};

    fn flutter_app(android: bool, ios: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pubspec.yaml"), "name: demo\n").unwrap();
        if android {
            let android = dir.path().join("android");
            fs::create_dir(&android).unwrap();
            fs::write(android.join(wrapper_name()), b"").unwrap();
            fs::write(android.join("build.gradle"), b"").unwrap();
        }
        if ios {
            fs::create_dir_all(dir.path().join("ios/Runner.xcodeproj")).unwrap();
        }
        dir
    }

    fn build_path(dir: &Path) -> BuildPath {
        BuildPath {
            abs_path: dir.to_path_buf(),
            rel_path: PathBuf::from("."),
            family: BuildToolFamily::Flutter,
            android_support: FlutterDriver.is_container(dir).is_some_and(|s| s.android),
            ios_support: FlutterDriver.is_container(dir).is_some_and(|s| s.ios),
        }
    }

    #[test]
    fn container_requires_pubspec_and_a_platform() {
        let dir = flutter_app(false, false);
        assert_eq!(FlutterDriver.is_container(dir.path()), None);

        let dir = flutter_app(true, true);
        assert_eq!(
            FlutterDriver.is_container(dir.path()),
            Some(Support {
                android: true,
                ios: true
            })
        );

        fs::remove_file(dir.path().join("pubspec.yaml")).unwrap();
        assert_eq!(FlutterDriver.is_container(dir.path()), None);
    }

    #[test]
    fn android_flavor_from_gradle_variants() {
        let dir = flutter_app(true, false);
        let runner = ScriptedRunner::new().respond(
            "gradlew tasks --all --console=plain --quiet",
            "app:assembleDebug\napp:assembleProfile\napp:assembleRelease\n",
        );
        let (mut io, _, _) = test_io("3\n");
        let mut ctx = BuildContext::new(&runner, &mut io);

        let made = FlutterDriver.make(&build_path(dir.path()), &mut ctx).unwrap();
        assert_eq!(made.app_name, "demo");
        assert_eq!(made.platform, Platform::Android);
        assert_eq!(
            made.builder,
            BuilderRecord::Flutter(FlutterBuilder::new(Some("release".into())))
        );
        assert_eq!(runner.calls()[0].working_dir, dir.path().join("android"));
    }

    #[test]
    fn android_flavors_default_when_gradle_fails() {
        let dir = flutter_app(true, false);
        let runner = ScriptedRunner::new();
        let (mut io, out, _) = test_io("1\n");
        let mut ctx = BuildContext::new(&runner, &mut io);

        let made = FlutterDriver.make(&build_path(dir.path()), &mut ctx).unwrap();
        assert_eq!(
            made.builder,
            BuilderRecord::Flutter(FlutterBuilder::new(Some("debug".into())))
        );
        assert!(out.contents().contains("2) release"));
    }

    #[test]
    fn ios_flavors_drop_profile_and_release() {
        let dir = flutter_app(false, true);
        let runner = ScriptedRunner::new().respond(
            "xcodebuild -list -json -project Runner.xcodeproj",
            r#"{"project":{"name":"Runner","schemes":["Runner"],"configurations":["Debug","Profile","Release"]}}"#,
        );
        let (mut io, out, _) = test_io("");
        let mut ctx = BuildContext::new(&runner, &mut io);

        let made = FlutterDriver.make(&build_path(dir.path()), &mut ctx).unwrap();
        assert_eq!(made.platform, Platform::Ios);
        assert_eq!(
            made.builder,
            BuilderRecord::Flutter(FlutterBuilder::new(Some("Debug".into())))
        );
        assert!(out.contents().contains("Using Flutter flavor: Debug"));
    }

    #[test]
    fn android_release_build() {
        let dir = tempfile::tempdir().unwrap();
        let apk_dir = dir.path().join("build/app/outputs/flutter-apk");
        fs::create_dir_all(&apk_dir).unwrap();
        fs::write(apk_dir.join("app-release.apk"), b"apk").unwrap();
        let runner = ScriptedRunner::new();
        let (mut io, _, _) = test_io("");
        let mut ctx = BuildContext::new(&runner, &mut io);

        let builder = FlutterBuilder::new(Some("release".into()));
        let apk = builder
            .build(BuildTarget::new(dir.path(), Platform::Android), false, &mut ctx)
            .unwrap();
        assert_eq!(apk, apk_dir.join("app-release.apk"));
        assert_eq!(
            runner.command_lines(),
            vec!["flutter build apk --release --no-tree-shake-icons".to_string()]
        );
    }

    #[test]
    fn android_custom_flavor_passes_flavor_flag() {
        let builder = FlutterBuilder::new(Some("staging".into()));
        let process = builder.build_process(Path::new("/app"), Platform::Android, true);
        assert_eq!(
            process.command_line(),
            "flutter build apk --flavor staging --no-tree-shake-icons --verbose"
        );
        assert_eq!(
            builder.artifact_path(Path::new("/app"), Platform::Android).unwrap(),
            PathBuf::from("/app/build/app/outputs/flutter-apk/app-staging.apk")
        );
    }

    #[test]
    fn ios_simulator_build_with_clean() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("build/ios/iphonesimulator/Runner.app");
        fs::create_dir_all(&app).unwrap();
        let runner = ScriptedRunner::new();
        let (mut io, _, _) = test_io("");
        let mut ctx = BuildContext::new(&runner, &mut io);

        let builder = FlutterBuilder::new(Some("Debug".into()));
        let built = builder
            .build(BuildTarget::new(dir.path(), Platform::Ios), true, &mut ctx)
            .unwrap();
        assert_eq!(built, app);
        assert_eq!(
            runner.command_lines(),
            vec![
                "flutter clean".to_string(),
                "flutter build ios --simulator --no-codesign --no-tree-shake-icons".to_string(),
            ]
        );
        assert_eq!(runner.calls()[1].environment, Environment::Inherit);
    }

    #[test]
    fn missing_apk_is_artifact_missing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let (mut io, _, _) = test_io("");
        let mut ctx = BuildContext::new(&runner, &mut io);
        let err = FlutterBuilder::new(Some("debug".into()))
            .build(BuildTarget::new(dir.path(), Platform::Android), false, &mut ctx)
            .unwrap_err();
        assert!(matches!(err, WaldoError::ArtifactMissing { .. }));
    }
}
