//! Gradle (Android) builds through the project's wrapper script
//!
//! Module names come from the root `properties` task, variants from
//! `tasks --all`, and the APK output root from the module's `buildDir`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::common::{BuildContext, BuildTarget, dir_name, lower_first, title_case};
use super::{Builder, BuilderRecord, Driver, Made};
use crate::parsers::{GradleTask, parse_gradle_properties, parse_gradle_subprojects, parse_gradle_tasks};
use crate::prompt::choose_string;
use crate::runner::ToolchainProcess;
use crate::types::{BuildPath, BuildToolFamily, Platform, Support, WaldoError};

/// Identifiers needed to reproduce a Gradle build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradleBuilder {
    /// Module path without the leading colon, e.g. `app`.
    pub module: String,
    /// Variant with a lower-case first letter, e.g. `freeDebug`.
    pub variant: String,
}

/// Name of the wrapper script on this host.
pub fn wrapper_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "gradlew.bat"
    } else {
        "gradlew"
    }
}

fn gradlew(base_path: &Path) -> ToolchainProcess {
    ToolchainProcess::new(base_path.join(wrapper_name()), base_path)
}

/// Runs `[<module>:]properties` and parses the listing.
pub fn detect_properties(
    base_path: &Path,
    module: Option<&str>,
    ctx: &mut BuildContext<'_>,
) -> Result<BTreeMap<String, String>, WaldoError> {
    let task = match module {
        Some(module) => format!("{module}:properties"),
        None => "properties".to_string(),
    };
    let process = gradlew(base_path).args([task.as_str(), "--console=plain", "--quiet"]);
    let output = ctx.probe(&process, "Gradle properties")?;
    Ok(parse_gradle_properties(&output.stdout))
}

/// Runs `tasks --all` and derives the variants of `module`.
pub fn detect_variants(
    base_path: &Path,
    module: &str,
    ctx: &mut BuildContext<'_>,
) -> Result<Vec<String>, WaldoError> {
    let process = gradlew(base_path).args(["tasks", "--all", "--console=plain", "--quiet"]);
    let output = ctx.probe(&process, "Gradle tasks")?;
    Ok(variants_from_tasks(&parse_gradle_tasks(&output.stdout), module))
}

/// Keeps `assemble*` tasks of `module` that are not test tasks, strips the
/// prefix, removes affix duplicates and lowers the first letter.
pub fn variants_from_tasks(tasks: &[GradleTask], module: &str) -> Vec<String> {
    let candidates: Vec<String> = tasks
        .iter()
        .filter(|task| task.module == module)
        .filter_map(|task| task.name.strip_prefix("assemble"))
        .filter(|variant| !variant.is_empty() && !variant.ends_with("Test"))
        .map(str::to_string)
        .collect();
    dedup_by_affix(candidates)
        .iter()
        .map(|variant| lower_first(variant))
        .collect()
}

/// Drops every candidate that is a prefix or suffix of another candidate.
///
/// `Debug` is dropped in favour of `FreeDebug`; first-seen order is kept.
pub fn dedup_by_affix(candidates: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
        .iter()
        .filter(|candidate| {
            !unique.iter().any(|other| {
                other != *candidate
                    && (other.starts_with(candidate.as_str()) || other.ends_with(candidate.as_str()))
            })
        })
        .cloned()
        .collect()
}

impl GradleBuilder {
    pub fn new(module: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            variant: variant.into(),
        }
    }

    /// `<module>:assemble<Variant>`
    pub fn assemble_task(&self) -> String {
        format!("{}:assemble{}", self.module, title_case(&self.variant))
    }

    /// `buildDir/outputs/apk` of the module, as reported by Gradle.
    pub fn artifact_root(
        &self,
        base_path: &Path,
        ctx: &mut BuildContext<'_>,
    ) -> Result<PathBuf, WaldoError> {
        let properties = detect_properties(base_path, Some(&self.module), ctx)?;
        let build_dir = properties.get("buildDir").ok_or_else(|| {
            WaldoError::introspection(
                "Gradle properties",
                format!("module '{}' reports no buildDir", self.module),
            )
        })?;
        Ok(Path::new(build_dir).join("outputs").join("apk"))
    }

    /// Finds the APK for this variant under `apk_root`.
    ///
    /// An APK matches when its directory, relative to `apk_root` and with
    /// separators removed, equals the variant ignoring case
    /// (`free/debug/app-free-debug.apk` matches `freeDebug`).
    pub fn verify(&self, apk_root: &Path) -> Result<PathBuf, WaldoError> {
        let wanted = self.variant.to_lowercase();
        let found = WalkDir::new(apk_root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "apk"))
            .find(|entry| {
                let dir = entry.path().parent().unwrap_or(apk_root);
                let rel = dir.strip_prefix(apk_root).unwrap_or(dir);
                let flattened: String = rel
                    .to_string_lossy()
                    .chars()
                    .filter(|c| *c != '/' && *c != '\\')
                    .collect();
                flattened.to_lowercase() == wanted
            });

        match found {
            Some(entry) => Ok(entry.into_path()),
            None => Err(WaldoError::ArtifactMissing {
                path: apk_root.to_path_buf(),
                expected: "an .apk file for the chosen variant",
            }),
        }
    }

    fn task_process(&self, base_path: &Path, task: &str, verbose: bool) -> ToolchainProcess {
        let process = gradlew(base_path).args([task, "--console=plain"]);
        if verbose {
            process
        } else {
            process.arg("--quiet")
        }
    }
}

impl Builder for GradleBuilder {
    fn summarize(&self) -> String {
        format!("module: {}, variant: {}", self.module, self.variant)
    }

    fn clean(&self, target: BuildTarget<'_>, ctx: &mut BuildContext<'_>) -> Result<(), WaldoError> {
        ctx.say("Cleaning Gradle build...")?;
        let process = self.task_process(target.base_path, "clean", ctx.verbose);
        ctx.stream(&process, "Gradle clean")
    }

    fn build(
        &self,
        target: BuildTarget<'_>,
        clean: bool,
        ctx: &mut BuildContext<'_>,
    ) -> Result<PathBuf, WaldoError> {
        let apk_root = self.artifact_root(target.base_path, ctx)?;
        if clean {
            self.clean(target, ctx)?;
        }

        let task = self.assemble_task();
        ctx.say(format_args!("Building with Gradle ({task})..."))?;
        let process = self.task_process(target.base_path, &task, ctx.verbose);
        ctx.stream(&process, "Gradle build")?;

        self.verify(&apk_root)
    }
}

/// Discovers and introspects Gradle containers.
pub struct GradleDriver;

impl Driver for GradleDriver {
    fn family(&self) -> BuildToolFamily {
        BuildToolFamily::Gradle
    }

    fn is_container(&self, path: &Path) -> Option<Support> {
        let has_wrapper = path.join(wrapper_name()).is_file();
        let has_build_file =
            path.join("build.gradle").is_file() || path.join("build.gradle.kts").is_file();
        (has_wrapper && has_build_file).then_some(Support::ANDROID)
    }

    fn make(&self, build_path: &BuildPath, ctx: &mut BuildContext<'_>) -> Result<Made, WaldoError> {
        let base_path = &build_path.abs_path;
        ctx.say("Searching for Gradle modules...")?;
        let properties = detect_properties(base_path, None, ctx)?;
        let modules = properties
            .get("subprojects")
            .map(|value| parse_gradle_subprojects(value))
            .unwrap_or_default();
        let module = choose_string(ctx.io, &modules, "Gradle module")?;

        ctx.say(format_args!("Searching for variants of module '{module}'..."))?;
        let variants = detect_variants(base_path, &module, ctx)?;
        let variant = choose_string(ctx.io, &variants, "Gradle variant")?;

        let app_name = properties
            .get("name")
            .cloned()
            .unwrap_or_else(|| dir_name(base_path));
        Ok(Made {
            builder: BuilderRecord::Gradle(GradleBuilder::new(module, variant)),
            app_name,
            platform: Platform::Android,
        })
    }
}
