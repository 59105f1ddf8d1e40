//! Build-target discovery, introspection and dispatch for waldo.
//!
//! `waldo-core` finds mobile app projects in a source tree, asks their
//! toolchains what they can build, records the user's choices as a
//! [`Recipe`], and later replays that recipe to produce an uploadable
//! artifact: an `.apk` for Android or a simulator `.app` for iOS.
//!
//! # Architecture
//!
//! - **Detect**: walks a tree and reports every build container ([`detect::detect`])
//! - **Builders**: one driver and one builder per toolchain family ([`builders`])
//! - **Recipe**: persisted build descriptions and the make/build entry points ([`recipe`])
//! - **Runner**: subprocess execution behind the [`runner::TaskRunner`] seam
//! - **Prompt**: numbered-menu and yes/no prompts over [`io::IoStreams`]
//! - **Parsers**: pure parsers for toolchain probe output ([`parsers`])
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use waldo_core::builders::BuildContext;
//! use waldo_core::io::IoStreams;
//! use waldo_core::runner::SystemRunner;
//! use waldo_core::{RecipeRequest, detect, make_recipe};
//!
//! let mut io = IoStreams::system();
//! let mut ctx = BuildContext::new(&SystemRunner, &mut io);
//! let root = Path::new(".");
//! let found = detect(root)?;
//! let request = RecipeRequest {
//!     name: "ios-debug".to_string(),
//!     ..RecipeRequest::default()
//! };
//! let recipe = make_recipe(&found[0], root, request, &mut ctx)?;
//! println!("{}", recipe.summary());
//! # Ok::<(), waldo_core::WaldoError>(())
//! ```

pub mod builders;
pub mod detect;
pub mod io;
pub mod parsers;
pub mod prompt;
pub mod recipe;
pub mod runner;
pub mod types;

#[cfg(test)]
mod testing;

pub use builders::{BuildContext, Builder, BuilderRecord, Driver};
pub use detect::detect;
pub use recipe::{Recipe, RecipeRequest, build_recipe, make_recipe, validate_recipe_name};
pub use types::{ArtifactMetadata, BuildPath, BuildToolFamily, Platform, Support, WaldoError};

/// Library version, matching `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
