//! Repository configuration and user profile.
//!
//! ## Repository configuration
//!
//! Recipes live in `.waldo.yml`. The file is searched for in the current
//! directory and then its ancestors. The search stops at the repository root
//! (a directory containing `.git`); when no file is found, a new one is
//! created there, or in the starting directory outside a repository.
//!
//! The directory holding the file is the *configuration base*: every
//! recipe's `base_path` is relative to it.
//!
//! ```yaml
//! recipes:
//!   - name: ios-debug
//!     app_name: App
//!     platform: ios
//!     base_path: ios
//!     xcode:
//!       workspace: App.xcworkspace
//!       scheme: App
//! ```
//!
//! ## User profile
//!
//! `~/.waldo/profile.yml` remembers the last artifact built or uploaded for
//! each recipe, keyed by `<configuration base>#<recipe name>`.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use waldo_core::{ArtifactMetadata, Recipe};

/// The repository configuration file name.
pub const CONFIG_FILE_NAME: &str = ".waldo.yml";

/// Directory under the home directory holding the user profile.
pub const PROFILE_DIR_NAME: &str = ".waldo";

pub const PROFILE_FILE_NAME: &str = "profile.yml";

/// Root structure of `.waldo.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaldoConfig {
    #[serde(default)]
    pub recipes: Vec<Recipe>,
}

impl WaldoConfig {
    /// Loads a configuration file, rejecting duplicate recipe names.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: WaldoConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        let mut seen = BTreeSet::new();
        for recipe in &config.recipes {
            if !seen.insert(recipe.name.as_str()) {
                bail!(
                    "Config file {:?} defines recipe '{}' more than once",
                    path,
                    recipe.name
                );
            }
        }
        Ok(config)
    }

    /// Searches `start_dir` and its ancestors for `.waldo.yml`.
    ///
    /// Returns the loaded file and its path, or `None` together with the
    /// repository root the search stopped at, if any.
    pub fn discover_from(start_dir: &Path) -> Result<Discovery> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Discovery::Found(config, config_path));
            }

            if current.join(".git").exists() {
                return Ok(Discovery::Missing {
                    repo_root: Some(current),
                });
            }
            if !current.pop() {
                return Ok(Discovery::Missing { repo_root: None });
            }
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents =
            serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    pub fn find_recipe(&self, name: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|recipe| recipe.name == name)
    }

    /// Appends `recipe`, refusing a name that is already taken.
    pub fn add_recipe(&mut self, recipe: Recipe) -> Result<()> {
        if self.find_recipe(&recipe.name).is_some() {
            bail!("Recipe '{}' already exists", recipe.name);
        }
        self.recipes.push(recipe);
        Ok(())
    }

    pub fn remove_recipe(&mut self, name: &str) -> Result<Recipe> {
        let index = self
            .recipes
            .iter()
            .position(|recipe| recipe.name == name)
            .ok_or_else(|| anyhow!("no recipe named '{}' found", name))?;
        Ok(self.recipes.remove(index))
    }
}

/// Outcome of [`WaldoConfig::discover_from`].
#[derive(Debug)]
pub enum Discovery {
    Found(WaldoConfig, PathBuf),
    Missing { repo_root: Option<PathBuf> },
}

/// The configuration in effect for a command, whether or not it exists on
/// disk yet.
#[derive(Debug)]
pub struct ConfigResolver {
    pub config: WaldoConfig,

    /// Where the configuration is, or will be, stored.
    pub config_path: PathBuf,

    /// Whether `config_path` existed when the resolver was created.
    pub exists: bool,
}

impl ConfigResolver {
    /// Resolves the configuration for the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Self::from_dir(&cwd)
    }

    pub fn from_dir(start_dir: &Path) -> Result<Self> {
        match WaldoConfig::discover_from(start_dir)? {
            Discovery::Found(config, config_path) => Ok(Self {
                config,
                config_path,
                exists: true,
            }),
            Discovery::Missing { repo_root } => {
                let base = repo_root.unwrap_or_else(|| start_dir.to_path_buf());
                Ok(Self {
                    config: WaldoConfig::default(),
                    config_path: base.join(CONFIG_FILE_NAME),
                    exists: false,
                })
            }
        }
    }

    /// The configuration base.
    pub fn base(&self) -> &Path {
        self.config_path.parent().unwrap_or(Path::new("."))
    }

    pub fn save(&mut self) -> Result<()> {
        self.config.save_to_file(&self.config_path)?;
        self.exists = true;
        Ok(())
    }
}

/// Per-user state kept outside the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub artifacts: BTreeMap<String, ArtifactMetadata>,
}

impl Profile {
    /// `~/.waldo/profile.yml`.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to locate the home directory")?;
        Ok(home.join(PROFILE_DIR_NAME).join(PROFILE_FILE_NAME))
    }

    /// Loads the profile, or an empty one when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile: {:?}", path))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse profile: {:?}", path))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let contents = serde_yaml::to_string(self).context("Failed to serialize profile")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write profile: {:?}", path))?;
        Ok(())
    }

    fn key(base: &Path, recipe: &str) -> String {
        format!("{}#{}", base.display(), recipe)
    }

    pub fn last_artifact(&self, base: &Path, recipe: &str) -> Option<&ArtifactMetadata> {
        self.artifacts.get(&Self::key(base, recipe))
    }

    pub fn record(&mut self, base: &Path, recipe: &str, metadata: ArtifactMetadata) {
        self.artifacts.insert(Self::key(base, recipe), metadata);
    }

    pub fn forget(&mut self, base: &Path, recipe: &str) {
        self.artifacts.remove(&Self::key(base, recipe));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use waldo_core::BuildToolFamily;

    const CONFIG: &str = "\
recipes:
- name: ios-debug
  app_name: App
  platform: ios
  base_path: ios
  xcode:
    workspace: App.xcworkspace
    scheme: App
- name: android-debug
  app_name: demo
  platform: android
  base_path: android
  gradle:
    module: app
    variant: debug
";

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, CONFIG).unwrap();

        let config = WaldoConfig::load_from_file(&path).unwrap();
        assert_eq!(config.recipes.len(), 2);
        let recipe = config.find_recipe("android-debug").unwrap();
        assert_eq!(recipe.derived_family(), BuildToolFamily::Gradle);
        assert!(config.find_recipe("missing").is_none());
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        let duplicated = CONFIG.replace("android-debug", "ios-debug");
        std::fs::write(&path, duplicated).unwrap();

        let err = WaldoConfig::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_invalid_recipe_fails_to_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "recipes:\n- name: x\n  app_name: X\n  platform: ios\n  base_path: .\n",
        )
        .unwrap();
        let err = WaldoConfig::load_from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("sets no builder"));
    }

    #[test]
    fn test_discover_config_in_ancestor() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, CONFIG).unwrap();
        let nested = temp_dir.path().join("ios/App");
        std::fs::create_dir_all(&nested).unwrap();

        let resolver = ConfigResolver::from_dir(&nested).unwrap();
        assert!(resolver.exists);
        assert_eq!(resolver.config_path, config_path);
        assert_eq!(resolver.base(), temp_dir.path());
    }

    #[test]
    fn test_new_config_goes_to_repo_root() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();
        let nested = temp_dir.path().join("mobile");
        std::fs::create_dir(&nested).unwrap();

        let resolver = ConfigResolver::from_dir(&nested).unwrap();
        assert!(!resolver.exists);
        assert!(resolver.config.recipes.is_empty());
        assert_eq!(resolver.base(), temp_dir.path());
    }

    #[test]
    fn test_add_save_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();
        let source = WaldoConfig::load_from_file(&{
            let path = temp_dir.path().join("seed.yml");
            std::fs::write(&path, CONFIG).unwrap();
            path
        })
        .unwrap();

        let mut resolver = ConfigResolver::from_dir(temp_dir.path()).unwrap();
        for recipe in source.recipes.clone() {
            resolver.config.add_recipe(recipe).unwrap();
        }
        assert!(resolver.config.add_recipe(source.recipes[0].clone()).is_err());
        resolver.save().unwrap();

        let reloaded = WaldoConfig::load_from_file(&resolver.config_path).unwrap();
        assert_eq!(reloaded, source);

        let removed = resolver.config.remove_recipe("ios-debug").unwrap();
        assert_eq!(removed.name, "ios-debug");
        assert!(resolver.config.remove_recipe("ios-debug").is_err());
    }

    #[test]
    fn test_profile_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(PROFILE_DIR_NAME).join(PROFILE_FILE_NAME);
        let base = Path::new("/work/repo");

        let mut profile = Profile::load_from(&path).unwrap();
        assert!(profile.last_artifact(base, "ios-debug").is_none());

        let metadata = ArtifactMetadata {
            upload_time: Some("2024-05-01T10:00:00Z".into()),
            upload_token: Some("token".into()),
            ..ArtifactMetadata::new("/work/repo/ios/build/App.app")
        };
        profile.record(base, "ios-debug", metadata.clone());
        profile.save_to(&path).unwrap();

        let reloaded = Profile::load_from(&path).unwrap();
        assert_eq!(reloaded.last_artifact(base, "ios-debug"), Some(&metadata));
        assert!(reloaded.artifacts.contains_key("/work/repo#ios-debug"));
        assert!(reloaded.last_artifact(Path::new("/elsewhere"), "ios-debug").is_none());
    }
}
