//! Toolchain drivers and builders.
//!
//! Each supported build toolchain has two halves:
//!
//! - a [`Driver`] that recognizes containers on disk and introspects them
//!   into a builder record (used when a recipe is created)
//! - a [`Builder`], the record itself, that cleans, builds and verifies the
//!   artifact (used every time a recipe is built)
//!
//! ## Families
//!
//! | Driver | Builder | Platforms | Output |
//! |--------|---------|-----------|--------|
//! | [`XcodeDriver`] | [`XcodeBuilder`] | iOS | `.app` for the simulator |
//! | [`GradleDriver`] | [`GradleBuilder`] | Android | `.apk` |
//! | [`FlutterDriver`] | [`FlutterBuilder`] | Android, iOS | `.apk` or `.app` |
//! | [`ReactNativeDriver`] | [`ReactNativeBuilder`] | Android, iOS | `.apk` or `.app` |
//! | [`UnsupportedDriver`] | [`ExpoBuilder`], [`IonicBuilder`], [`CustomBuilder`] | - | always fails |
//!
//! Flutter and React Native introspect, clean and verify by constructing
//! Gradle and Xcode builders for their `android/` and `ios/` subdirectories.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use waldo_core::builders::{BuildContext, BuildTarget, Builder, GradleBuilder};
//! use waldo_core::io::IoStreams;
//! use waldo_core::runner::SystemRunner;
//! use waldo_core::Platform;
//!
//! let mut io = IoStreams::system();
//! let mut ctx = BuildContext::new(&SystemRunner, &mut io).verbose(true);
//! let builder = GradleBuilder::new("app", "debug");
//! let apk = builder.build(BuildTarget::new(Path::new("android"), Platform::Android), false, &mut ctx)?;
//! println!("built {}", apk.display());
//! # Ok::<(), waldo_core::WaldoError>(())
//! ```

pub mod common;
pub mod flutter;
pub mod gradle;
pub mod react_native;
pub mod unsupported;
pub mod xcode;

use std::path::{Path, PathBuf};

use crate::types::{BuildPath, BuildToolFamily, Platform, Support, WaldoError};

pub use common::{BuildContext, BuildTarget};
pub use flutter::{FlutterBuilder, FlutterDriver};
pub use gradle::{GradleBuilder, GradleDriver};
pub use react_native::{ReactNativeBuilder, ReactNativeDriver};
pub use unsupported::{CustomBuilder, ExpoBuilder, IonicBuilder, UnsupportedDriver};
pub use xcode::{XcodeBuilder, XcodeDriver};

/// Discovery and introspection for one family.
pub trait Driver {
    fn family(&self) -> BuildToolFamily;

    /// Whether `path` is the root of a container of this family, and which
    /// platforms it can build.
    fn is_container(&self, path: &Path) -> Option<Support>;

    /// Introspects the container and reduces every choice to a builder.
    fn make(&self, build_path: &BuildPath, ctx: &mut BuildContext<'_>) -> Result<Made, WaldoError>;
}

/// Output of [`Driver::make`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Made {
    pub builder: BuilderRecord,
    pub app_name: String,
    pub platform: Platform,
}

/// Clean, build and verify for one family.
pub trait Builder {
    /// One-line description of the builder's identifiers.
    fn summarize(&self) -> String;

    fn clean(&self, target: BuildTarget<'_>, ctx: &mut BuildContext<'_>) -> Result<(), WaldoError>;

    /// Locates the artifact, optionally cleans, builds and verifies.
    ///
    /// Returns the path of the verified artifact.
    fn build(
        &self,
        target: BuildTarget<'_>,
        clean: bool,
        ctx: &mut BuildContext<'_>,
    ) -> Result<PathBuf, WaldoError>;
}

/// The family-specific part of a recipe. The variant is the family tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderRecord {
    Xcode(XcodeBuilder),
    Gradle(GradleBuilder),
    Flutter(FlutterBuilder),
    ReactNative(ReactNativeBuilder),
    Expo(ExpoBuilder),
    Ionic(IonicBuilder),
    Custom(CustomBuilder),
}

impl BuilderRecord {
    pub fn family(&self) -> BuildToolFamily {
        match self {
            BuilderRecord::Xcode(_) => BuildToolFamily::Xcode,
            BuilderRecord::Gradle(_) => BuildToolFamily::Gradle,
            BuilderRecord::Flutter(_) => BuildToolFamily::Flutter,
            BuilderRecord::ReactNative(_) => BuildToolFamily::ReactNative,
            BuilderRecord::Expo(_) => BuildToolFamily::Expo,
            BuilderRecord::Ionic(_) => BuildToolFamily::Ionic,
            BuilderRecord::Custom(_) => BuildToolFamily::Custom,
        }
    }

    pub fn as_builder(&self) -> &dyn Builder {
        match self {
            BuilderRecord::Xcode(builder) => builder,
            BuilderRecord::Gradle(builder) => builder,
            BuilderRecord::Flutter(builder) => builder,
            BuilderRecord::ReactNative(builder) => builder,
            BuilderRecord::Expo(builder) => builder,
            BuilderRecord::Ionic(builder) => builder,
            BuilderRecord::Custom(builder) => builder,
        }
    }
}

/// All drivers, outer shells before the toolchains they wrap.
///
/// The walker consults them in this order, so an Expo or Flutter project is
/// reported as such rather than as the Gradle or Xcode project inside it.
pub fn drivers() -> Vec<Box<dyn Driver>> {
    vec![
        Box::new(UnsupportedDriver(BuildToolFamily::Expo)),
        Box::new(FlutterDriver),
        Box::new(ReactNativeDriver),
        Box::new(UnsupportedDriver(BuildToolFamily::Ionic)),
        Box::new(GradleDriver),
        Box::new(XcodeDriver),
        Box::new(UnsupportedDriver(BuildToolFamily::Custom)),
    ]
}

/// The driver for `family`, if it is a known family.
pub fn driver_for(family: BuildToolFamily) -> Option<Box<dyn Driver>> {
    drivers().into_iter().find(|driver| driver.family() == family)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_family_has_a_driver() {
        for family in BuildToolFamily::KNOWN {
            let driver = driver_for(family).unwrap();
            assert_eq!(driver.family(), family);
        }
        assert!(driver_for(BuildToolFamily::Unknown).is_none());
    }

    #[test]
    fn shells_precede_primitive_toolchains() {
        let order: Vec<_> = drivers().iter().map(|d| d.family()).collect();
        let position = |family| order.iter().position(|f| *f == family).unwrap();
        for shell in [
            BuildToolFamily::Expo,
            BuildToolFamily::Flutter,
            BuildToolFamily::ReactNative,
            BuildToolFamily::Ionic,
        ] {
            assert!(position(shell) < position(BuildToolFamily::Gradle));
            assert!(position(shell) < position(BuildToolFamily::Xcode));
        }
    }

    #[test]
    fn record_tag_matches_family() {
        let records = [
            BuilderRecord::Xcode(XcodeBuilder::for_project("App.xcodeproj")),
            BuilderRecord::Gradle(GradleBuilder::new("app", "debug")),
            BuilderRecord::Flutter(FlutterBuilder::default()),
            BuilderRecord::ReactNative(ReactNativeBuilder::new("Debug")),
            BuilderRecord::Expo(ExpoBuilder {}),
            BuilderRecord::Ionic(IonicBuilder {}),
            BuilderRecord::Custom(CustomBuilder {}),
        ];
        let families: Vec<_> = records.iter().map(BuilderRecord::family).collect();
        assert_eq!(families, BuildToolFamily::KNOWN.to_vec());
        assert_eq!(records[1].as_builder().summarize(), "module: app, variant: debug");
    }
}
