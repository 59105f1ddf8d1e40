//! # waldo
//!
//! Command-line tool for building mobile apps from saved recipes and
//! uploading them to Waldo.
//!
//! ## Overview
//!
//! A *recipe* names one way of building one app: the toolchain (Xcode,
//! Gradle, Flutter or React Native), the platform, and the scheme, variant,
//! flavor or mode to build. Recipes are created interactively by inspecting
//! the project and are stored in `.waldo.yml` at the repository root.
//!
//! - **Detect** - Finds every buildable project under a directory
//! - **Add** - Inspects a project and records a recipe after confirmation
//! - **Build** - Replays a recipe to produce an `.apk` or simulator `.app`
//! - **Upload** - Sends the last build (or a given artifact) to Waldo
//!
//! ## Quick Start
//!
//! ```bash
//! # See what can be built
//! waldo detect
//!
//! # Record a recipe
//! waldo add ios-debug --upload-token "$WALDO_UPLOAD_TOKEN"
//!
//! # Build and upload it
//! waldo sync ios-debug
//! ```
//!
//! ## Environment
//!
//! - `WALDO_UPLOAD_TOKEN` - upload token when neither `--upload-token` nor the
//!   recipe provides one
//! - `WALDO_API_URL` - overrides the API base URL
//! - `WALDO_LOG_LEVEL` - diagnostic log level (`RUST_LOG` takes precedence)
//!
//! Variables may also be placed in `.env.local` next to `.waldo.yml`.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use prettytable::format::FormatBuilder;
use prettytable::{Row, Table};
use std::io::Write;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use waldo_core::builders::BuildContext;
use waldo_core::io::IoStreams;
use waldo_core::prompt::{choose, read_yes_no};
use waldo_core::runner::SystemRunner;
use waldo_core::{
    ArtifactMetadata, BuildPath, Recipe, RecipeRequest, WaldoError, build_recipe, detect,
    make_recipe, validate_recipe_name,
};

pub mod config;
pub mod logging;
pub mod upload;

use config::{ConfigResolver, Profile};
use logging::LoggingConfig;
use upload::WaldoClient;

/// Environment variable supplying the default upload token.
pub const UPLOAD_TOKEN_ENV: &str = "WALDO_UPLOAD_TOKEN";

/// Build mobile apps from saved recipes and upload them to Waldo.
#[derive(Parser, Debug)]
#[command(name = "waldo", author, version, about = "Build mobile apps from saved recipes and upload them to Waldo", long_about = None)]
pub struct Cli {
    /// Show toolchain commands and their full output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Inspect a project and save a new build recipe.
    Add {
        /// Recipe name (letters, digits, '_' and '-', starting with a letter).
        name: String,
        #[arg(long, help = "App name to record instead of the detected one")]
        app_name: Option<String>,
        #[arg(long, help = "Upload token to store with the recipe")]
        upload_token: Option<String>,
        #[arg(long, help = "Directory to search for projects")]
        root: Option<PathBuf>,
    },
    /// Build the app described by a recipe.
    Build {
        name: Option<String>,
        #[arg(long, help = "Clean before building")]
        clean: bool,
    },
    /// Upload the last build of a recipe, or the given artifact.
    Upload {
        name: Option<String>,
        #[arg(long, help = "Path of the .apk or .app to upload")]
        path: Option<PathBuf>,
        #[arg(long)]
        upload_token: Option<String>,
    },
    /// Build a recipe and upload the result.
    Sync {
        name: Option<String>,
        #[arg(long, help = "Clean before building")]
        clean: bool,
        #[arg(long)]
        upload_token: Option<String>,
    },
    /// List saved recipes.
    List {
        #[arg(long, help = "Include builder details")]
        long: bool,
    },
    /// Delete a saved recipe.
    Remove { name: String },
    /// Show the buildable projects under a directory.
    Detect {
        #[arg(long, help = "Directory to search (default: current directory)")]
        root: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut resolver = ConfigResolver::new()?;
    load_dotenv(resolver.base());
    logging::init_logging(LoggingConfig::from_env(cli.verbose));
    tracing::debug!(config = %resolver.config_path.display(), exists = resolver.exists, "resolved configuration");

    let mut io = IoStreams::system();
    let mut session = Session {
        resolver: &mut resolver,
        io: &mut io,
        verbose: cli.verbose,
    };
    match cli.command {
        Command::Add {
            name,
            app_name,
            upload_token,
            root,
        } => session.add(
            RecipeRequest {
                name,
                app_name,
                upload_token,
            },
            root,
        ),
        Command::Build { name, clean } => session.build(name.as_deref(), clean).map(|_| ()),
        Command::Upload {
            name,
            path,
            upload_token,
        } => session.upload(name.as_deref(), path, upload_token),
        Command::Sync {
            name,
            clean,
            upload_token,
        } => {
            let (recipe, metadata) = session.build(name.as_deref(), clean)?;
            session.upload(Some(&recipe.name), Some(metadata.build_path), upload_token)
        }
        Command::List { long } => session.list(long),
        Command::Remove { name } => session.remove(&name),
        Command::Detect { root } => session.detect(root),
    }
}

/// Exit status for a failed command: the status of the failed build step
/// when there was one, `1` otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<WaldoError>())
        .and_then(WaldoError::exit_code)
        .unwrap_or(1)
}

fn load_dotenv(base: &Path) {
    let path = base.join(".env.local");
    let _ = dotenvy::from_path(path);
}

struct Session<'a> {
    resolver: &'a mut ConfigResolver,
    io: &'a mut IoStreams,
    verbose: bool,
}

impl Session<'_> {
    fn context(&mut self) -> BuildContext<'_> {
        BuildContext::new(&SystemRunner, self.io).verbose(self.verbose)
    }

    fn base(&self) -> PathBuf {
        self.resolver.base().to_path_buf()
    }

    fn add(&mut self, request: RecipeRequest, root: Option<PathBuf>) -> Result<()> {
        validate_recipe_name(&request.name)?;
        if self.resolver.config.find_recipe(&request.name).is_some() {
            bail!("Recipe '{}' already exists", request.name);
        }

        let base = self.base();
        let root = match root {
            Some(root) => root,
            None if self.resolver.exists => base.clone(),
            None => std::env::current_dir().context("Failed to get current directory")?,
        };
        writeln!(self.io.out, "Searching for projects in {}...", root.display())?;
        let found = detect(&root)?;
        let build_path = choose(self.io, &found, "project", BuildPath::to_string)?;

        let recipe = make_recipe(&build_path, &base, request, &mut self.context())?;
        let name = recipe.name.clone();
        self.resolver.config.add_recipe(recipe)?;
        self.resolver.save()?;
        writeln!(
            self.io.out,
            "Added recipe '{}' to {}",
            name,
            self.resolver.config_path.display()
        )?;
        Ok(())
    }

    fn build(&mut self, name: Option<&str>, clean: bool) -> Result<(Recipe, ArtifactMetadata)> {
        let recipe = self.resolve_recipe(name)?;
        let base = self.base();
        let metadata = build_recipe(&recipe, &base, clean, &mut self.context())?;

        let profile_path = Profile::default_path()?;
        let mut profile = Profile::load_from(&profile_path)?;
        profile.record(&base, &recipe.name, metadata.clone());
        profile.save_to(&profile_path)?;
        Ok((recipe, metadata))
    }

    fn upload(
        &mut self,
        name: Option<&str>,
        path: Option<PathBuf>,
        upload_token: Option<String>,
    ) -> Result<()> {
        let recipe = self.resolve_recipe(name)?;
        let base = self.base();
        let profile_path = Profile::default_path()?;
        let mut profile = Profile::load_from(&profile_path)?;

        let artifact = match path {
            Some(path) => path,
            None => match profile.last_artifact(&base, &recipe.name) {
                Some(metadata) => metadata.build_path.clone(),
                None => bail!(
                    "no build found for recipe '{}'; run `waldo build {}` first",
                    recipe.name,
                    recipe.name
                ),
            },
        };
        let token = resolve_upload_token(
            upload_token,
            &recipe,
            std::env::var(UPLOAD_TOKEN_ENV).ok(),
        )?;

        let client = WaldoClient::new(token.clone())?;
        let receipt = client.upload(&artifact, recipe.platform, &mut self.context())?;
        let upload_time = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("formatting upload time")?;

        profile.record(
            &base,
            &recipe.name,
            ArtifactMetadata {
                build_path: artifact,
                upload_time: Some(upload_time),
                upload_token: Some(token),
            },
        );
        profile.save_to(&profile_path)?;

        match receipt.id {
            Some(id) => writeln!(self.io.out, "Uploaded recipe '{}' as version {}", recipe.name, id)?,
            None => writeln!(self.io.out, "Uploaded recipe '{}'", recipe.name)?,
        }
        Ok(())
    }

    fn list(&mut self, long: bool) -> Result<()> {
        if self.resolver.config.recipes.is_empty() {
            writeln!(self.io.out, "No recipes found. Add one with `waldo add <name>`.")?;
            return Ok(());
        }
        write!(self.io.out, "{}", recipe_table(&self.resolver.config.recipes, long))?;
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        if self.resolver.config.find_recipe(name).is_none() {
            return Err(WaldoError::NotFound(format!("recipe named '{name}'")).into());
        }
        if !read_yes_no(self.io, &format!("Remove recipe '{name}'?"))? {
            return Err(WaldoError::Cancelled.into());
        }
        self.resolver.config.remove_recipe(name)?;
        self.resolver.save()?;

        let profile_path = Profile::default_path()?;
        let mut profile = Profile::load_from(&profile_path)?;
        if profile.last_artifact(self.resolver.base(), name).is_some() {
            profile.forget(self.resolver.base(), name);
            profile.save_to(&profile_path)?;
        }
        writeln!(self.io.out, "Removed recipe '{name}'")?;
        Ok(())
    }

    fn detect(&mut self, root: Option<PathBuf>) -> Result<()> {
        let root = match root {
            Some(root) => root,
            None => std::env::current_dir().context("Failed to get current directory")?,
        };
        let found = detect(&root)?;
        write!(self.io.out, "{}", build_path_table(&found))?;
        Ok(())
    }

    fn resolve_recipe(&mut self, name: Option<&str>) -> Result<Recipe> {
        let recipes = &self.resolver.config.recipes;
        match name {
            Some(name) => self
                .resolver
                .config
                .find_recipe(name)
                .cloned()
                .ok_or_else(|| WaldoError::NotFound(format!("recipe named '{name}'")).into()),
            None => Ok(choose(self.io, recipes, "recipe", |recipe: &Recipe| {
                recipe.name.clone()
            })?),
        }
    }
}

/// Picks the upload token: the command-line flag, then the recipe, then the
/// environment.
fn resolve_upload_token(
    flag: Option<String>,
    recipe: &Recipe,
    env: Option<String>,
) -> Result<String> {
    flag.or_else(|| recipe.upload_token.clone())
        .or(env)
        .filter(|token| !token.trim().is_empty())
        .with_context(|| {
            format!(
                "no upload token for recipe '{}'; pass --upload-token or set {}",
                recipe.name, UPLOAD_TOKEN_ENV
            )
        })
}

fn recipe_table(recipes: &[Recipe], long: bool) -> String {
    let mut headers = vec!["NAME", "BUILD TOOL", "PLATFORM", "APP", "BASE PATH"];
    if long {
        headers.push("BUILDER");
    }
    let mut table = plain_table(&headers);
    for recipe in recipes {
        let mut row = vec![
            recipe.name.clone(),
            recipe.derived_family().to_string(),
            recipe.platform.to_string(),
            recipe.app_name.clone(),
            recipe.base_path.display().to_string(),
        ];
        if long {
            row.push(recipe.builder.as_builder().summarize());
        }
        table.add_row(Row::from(row));
    }
    table.to_string()
}

fn build_path_table(found: &[BuildPath]) -> String {
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };
    let mut table = plain_table(&["PATH", "BUILD TOOL", "ANDROID", "IOS"]);
    for build_path in found {
        table.add_row(Row::from([
            build_path.rel_path.display().to_string(),
            build_path.family.to_string(),
            yes_no(build_path.android_support).to_string(),
            yes_no(build_path.ios_support).to_string(),
        ]));
    }
    table.to_string()
}

/// Borderless table with two spaces between columns.
fn plain_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_format(FormatBuilder::new().padding(0, 2).build());
    table.set_titles(Row::from(headers));
    table
}
