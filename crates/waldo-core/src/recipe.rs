//! Recipes: named, persisted build descriptions.
//!
//! On disk a recipe carries one optional field per family, of which exactly
//! one must be set ([`RecipeRecord`]). In memory the family is a tag on
//! [`BuilderRecord`], and conversion between the two enforces the invariant.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::builders::{
    BuildContext, BuildTarget, BuilderRecord, CustomBuilder, ExpoBuilder, FlutterBuilder,
    GradleBuilder, IonicBuilder, ReactNativeBuilder, XcodeBuilder, driver_for,
};
use crate::detect::relative_to;
use crate::prompt::read_yes_no;
use crate::runner::{ToolchainProcess, resolve_in};
use crate::types::{ArtifactMetadata, BuildPath, BuildToolFamily, Platform, WaldoError};

/// A validated recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecipeRecord", into = "RecipeRecord")]
pub struct Recipe {
    pub name: String,
    pub app_name: String,
    pub platform: Platform,
    /// Container path relative to the configuration base.
    pub base_path: PathBuf,
    pub upload_token: Option<String>,
    /// Shell fragment run in the base path before building.
    pub pre_build: Option<String>,
    /// Shell fragment run in the base path after a successful build.
    pub post_build: Option<String>,
    pub builder: BuilderRecord,
}

/// The persisted shape of a [`Recipe`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeRecord {
    pub name: String,
    pub app_name: String,
    pub platform: Platform,
    pub base_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_build: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_build: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xcode: Option<XcodeBuilder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradle: Option<GradleBuilder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flutter: Option<FlutterBuilder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub react_native: Option<ReactNativeBuilder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expo: Option<ExpoBuilder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ionic: Option<IonicBuilder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomBuilder>,
}

/// Checks a recipe name against `^[a-zA-Z][0-9a-zA-Z_-]*$`.
pub fn validate_recipe_name(name: &str) -> Result<(), WaldoError> {
    static NAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let name_re =
        NAME_REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z][0-9a-zA-Z_-]*$").expect("valid regex"));
    if name_re.is_match(name) {
        Ok(())
    } else {
        Err(WaldoError::InvalidRecipe {
            name: name.to_string(),
            reason: "names start with a letter and contain only letters, digits, '_' and '-'"
                .to_string(),
        })
    }
}

/// Platforms a family can build for, or `None` when the family is not checked.
fn target_platforms(family: BuildToolFamily) -> Option<&'static [Platform]> {
    match family {
        BuildToolFamily::Xcode => Some(&[Platform::Ios]),
        BuildToolFamily::Gradle => Some(&[Platform::Android]),
        BuildToolFamily::Flutter | BuildToolFamily::ReactNative => {
            Some(&[Platform::Android, Platform::Ios])
        }
        _ => None,
    }
}

impl TryFrom<RecipeRecord> for Recipe {
    type Error = WaldoError;

    fn try_from(record: RecipeRecord) -> Result<Self, Self::Error> {
        validate_recipe_name(&record.name)?;
        let invalid = |reason: String| WaldoError::InvalidRecipe {
            name: record.name.clone(),
            reason,
        };

        let mut builders = Vec::new();
        if let Some(builder) = record.xcode {
            builder.validate().map_err(invalid)?;
            builders.push(BuilderRecord::Xcode(builder));
        }
        if let Some(builder) = record.gradle {
            builders.push(BuilderRecord::Gradle(builder));
        }
        if let Some(builder) = record.flutter {
            builders.push(BuilderRecord::Flutter(builder));
        }
        if let Some(builder) = record.react_native {
            builders.push(BuilderRecord::ReactNative(builder));
        }
        if let Some(builder) = record.expo {
            builders.push(BuilderRecord::Expo(builder));
        }
        if let Some(builder) = record.ionic {
            builders.push(BuilderRecord::Ionic(builder));
        }
        if let Some(builder) = record.custom {
            builders.push(BuilderRecord::Custom(builder));
        }

        if builders.len() > 1 {
            let keys: Vec<_> = builders.iter().map(|b| b.family().as_str()).collect();
            return Err(invalid(format!("sets more than one builder: {}", keys.join(", "))));
        }
        let Some(builder) = builders.pop() else {
            return Err(invalid("sets no builder".to_string()));
        };
        let family = builder.family();
        if let Some(targets) = target_platforms(family)
            && !targets.contains(&record.platform)
        {
            return Err(invalid(format!(
                "{family} cannot build for platform {}",
                record.platform.as_str()
            )));
        }

        Ok(Recipe {
            name: record.name,
            app_name: record.app_name,
            platform: record.platform,
            base_path: record.base_path,
            upload_token: record.upload_token,
            pre_build: record.pre_build,
            post_build: record.post_build,
            builder,
        })
    }
}

impl From<Recipe> for RecipeRecord {
    fn from(recipe: Recipe) -> Self {
        let mut record = RecipeRecord {
            name: recipe.name,
            app_name: recipe.app_name,
            platform: recipe.platform,
            base_path: recipe.base_path,
            upload_token: recipe.upload_token,
            pre_build: recipe.pre_build,
            post_build: recipe.post_build,
            ..RecipeRecord::default()
        };
        match recipe.builder {
            BuilderRecord::Xcode(builder) => record.xcode = Some(builder),
            BuilderRecord::Gradle(builder) => record.gradle = Some(builder),
            BuilderRecord::Flutter(builder) => record.flutter = Some(builder),
            BuilderRecord::ReactNative(builder) => record.react_native = Some(builder),
            BuilderRecord::Expo(builder) => record.expo = Some(builder),
            BuilderRecord::Ionic(builder) => record.ionic = Some(builder),
            BuilderRecord::Custom(builder) => record.custom = Some(builder),
        }
        record
    }
}

impl Recipe {
    /// The family of the recipe's builder.
    pub fn derived_family(&self) -> BuildToolFamily {
        self.builder.family()
    }

    /// Multi-line description shown before confirmation and by `list --long`.
    pub fn summary(&self) -> String {
        let token = if self.upload_token.is_some() {
            "set"
        } else {
            "not set"
        };
        let mut lines = vec![
            format!("Recipe:       {}", self.name),
            format!("Build tool:   {}", self.derived_family()),
            format!("App name:     {}", self.app_name),
            format!("Platform:     {}", self.platform),
            format!("Base path:    {}", self.base_path.display()),
            format!("Upload token: {token}"),
            format!("Builder:      {}", self.builder.as_builder().summarize()),
        ];
        if let Some(hook) = &self.pre_build {
            lines.push(format!("Pre-build:    {hook}"));
        }
        if let Some(hook) = &self.post_build {
            lines.push(format!("Post-build:   {hook}"));
        }
        lines.join("\n")
    }
}

/// User-supplied parts of a new recipe.
#[derive(Debug, Clone, Default)]
pub struct RecipeRequest {
    pub name: String,
    /// Overrides the app name reported by introspection.
    pub app_name: Option<String>,
    pub upload_token: Option<String>,
}

/// Introspects `build_path` and assembles a recipe, after the user confirms
/// its summary.
///
/// `config_base` is the directory recipe base paths are relative to.
pub fn make_recipe(
    build_path: &BuildPath,
    config_base: &Path,
    request: RecipeRequest,
    ctx: &mut BuildContext<'_>,
) -> Result<Recipe, WaldoError> {
    validate_recipe_name(&request.name)?;
    let driver =
        driver_for(build_path.family).ok_or(WaldoError::Unsupported(build_path.family))?;
    let made = driver.make(build_path, ctx)?;

    let recipe = Recipe {
        name: request.name,
        app_name: request.app_name.unwrap_or(made.app_name),
        platform: made.platform,
        base_path: relative_to(&build_path.abs_path, config_base),
        upload_token: request.upload_token,
        pre_build: None,
        post_build: None,
        builder: made.builder,
    };

    ctx.say("")?;
    ctx.say(recipe.summary())?;
    ctx.say("")?;
    if !read_yes_no(ctx.io, "Add this recipe?")? {
        return Err(WaldoError::Cancelled);
    }
    Ok(recipe)
}

/// Builds `recipe`, running its hooks around the builder.
pub fn build_recipe(
    recipe: &Recipe,
    config_base: &Path,
    clean: bool,
    ctx: &mut BuildContext<'_>,
) -> Result<ArtifactMetadata, WaldoError> {
    let family = recipe.derived_family();
    let base_path = resolve_in(config_base, &recipe.base_path);

    if family.is_buildable() {
        let qualifies = driver_for(family)
            .and_then(|driver| driver.is_container(&base_path))
            .is_some();
        if !qualifies {
            return Err(WaldoError::NotFound(format!(
                "{family} project at {}",
                base_path.display()
            )));
        }
    }

    tracing::info!(recipe = %recipe.name, %family, platform = %recipe.platform, "building recipe");
    ctx.say(format_args!(
        "Building recipe '{}' ({} app for {})...",
        recipe.name, family, recipe.platform
    ))?;

    if let Some(hook) = &recipe.pre_build {
        run_hook("pre_build hook", hook, &base_path, ctx)?;
    }
    let target = BuildTarget::new(&base_path, recipe.platform);
    let artifact = recipe.builder.as_builder().build(target, clean, ctx)?;
    if let Some(hook) = &recipe.post_build {
        run_hook("post_build hook", hook, &base_path, ctx)?;
    }

    ctx.say(format_args!("Built {}", artifact.display()))?;
    Ok(ArtifactMetadata::new(artifact))
}

fn run_hook(
    what: &str,
    command: &str,
    base_path: &Path,
    ctx: &mut BuildContext<'_>,
) -> Result<(), WaldoError> {
    ctx.say(format_args!("Running {what}: {command}"))?;
    let process = ToolchainProcess::shell(command, base_path);
    ctx.stream(&process, what)
}
