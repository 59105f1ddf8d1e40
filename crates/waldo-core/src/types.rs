//! Core types for waldo-core.
//!
//! This module defines the fundamental types used throughout the crate:
//!
//! - [`WaldoError`] - Error kinds surfaced by discovery, introspection and builds
//! - [`BuildToolFamily`] - The closed set of supported toolchains
//! - [`Platform`] - Target platform of a recipe
//! - [`BuildPath`] - A candidate container found by the walker
//! - [`ArtifactMetadata`] - Output record of a successful build

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Error kinds for waldo-core operations.
///
/// Every variant renders a human-readable message; the CLI prints it behind a
/// `waldo:` prefix.
///
/// # Example
///
/// ```
/// use waldo_core::WaldoError;
///
/// let err = WaldoError::EmptySet("Xcode scheme".to_string());
/// assert_eq!(err.to_string(), "no Xcode scheme to choose from");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WaldoError {
    /// The walker found no containers, or a recipe's base path no longer
    /// holds a container of the recorded family.
    #[error("no {0} found")]
    NotFound(String),

    /// A required choice list was empty.
    #[error("no {0} to choose from")]
    EmptySet(String),

    /// The prompter reached end of input before a valid answer was given.
    #[error("no {0} chosen")]
    Ambiguous(String),

    /// The user declined a Yes/No confirmation.
    #[error("cancelled by user")]
    Cancelled,

    /// A read-only toolchain probe exited non-zero or produced output that
    /// could not be parsed.
    #[error("unable to introspect {what}: {reason}")]
    IntrospectionFailed { what: String, reason: String },

    /// A build (or clean, or hook) subprocess failed.
    ///
    /// `code` is the child's exit status when it ran to completion; the CLI
    /// reuses it as its own exit code.
    #[error("{what} failed{}: {reason}", exit_suffix(.code))]
    BuildFailed {
        what: String,
        code: Option<i32>,
        reason: String,
    },

    /// The build reported success but the artifact is absent or has the
    /// wrong shape.
    #[error("build artifact not found at {}; expected {expected}", .path.display())]
    ArtifactMissing {
        path: PathBuf,
        expected: &'static str,
    },

    /// The recipe or container belongs to a family this version cannot build.
    #[error("{0} builds are not supported by this version of waldo")]
    Unsupported(BuildToolFamily),

    /// A stored recipe violates its invariants.
    #[error("invalid recipe '{name}': {reason}")]
    InvalidRecipe { name: String, reason: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" (exit status {code})"),
        None => String::new(),
    }
}

impl WaldoError {
    pub(crate) fn introspection(what: impl Into<String>, reason: impl fmt::Display) -> Self {
        WaldoError::IntrospectionFailed {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Exit status of the failed child process, if this error wraps one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            WaldoError::BuildFailed { code, .. } => *code,
            _ => None,
        }
    }
}

/// Supported mobile build toolchains.
///
/// The serialized names match the builder keys of a stored recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildToolFamily {
    Xcode,
    Gradle,
    Flutter,
    ReactNative,
    Expo,
    Ionic,
    Custom,
    Unknown,
}

impl BuildToolFamily {
    /// All families that can appear in a recipe.
    pub const KNOWN: [BuildToolFamily; 7] = [
        BuildToolFamily::Xcode,
        BuildToolFamily::Gradle,
        BuildToolFamily::Flutter,
        BuildToolFamily::ReactNative,
        BuildToolFamily::Expo,
        BuildToolFamily::Ionic,
        BuildToolFamily::Custom,
    ];

    /// Returns the key used for this family in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildToolFamily::Xcode => "xcode",
            BuildToolFamily::Gradle => "gradle",
            BuildToolFamily::Flutter => "flutter",
            BuildToolFamily::ReactNative => "react_native",
            BuildToolFamily::Expo => "expo",
            BuildToolFamily::Ionic => "ionic",
            BuildToolFamily::Custom => "custom",
            BuildToolFamily::Unknown => "unknown",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BuildToolFamily::Xcode => "Xcode",
            BuildToolFamily::Gradle => "Gradle",
            BuildToolFamily::Flutter => "Flutter",
            BuildToolFamily::ReactNative => "React Native",
            BuildToolFamily::Expo => "Expo",
            BuildToolFamily::Ionic => "Ionic",
            BuildToolFamily::Custom => "Custom",
            BuildToolFamily::Unknown => "Unknown",
        }
    }

    /// Whether this version can introspect and build the family.
    pub fn is_buildable(&self) -> bool {
        matches!(
            self,
            BuildToolFamily::Xcode
                | BuildToolFamily::Gradle
                | BuildToolFamily::Flutter
                | BuildToolFamily::ReactNative
        )
    }

    pub fn supports_android(&self) -> bool {
        !matches!(self, BuildToolFamily::Xcode | BuildToolFamily::Unknown)
    }

    pub fn supports_ios(&self) -> bool {
        !matches!(self, BuildToolFamily::Gradle | BuildToolFamily::Unknown)
    }
}

impl fmt::Display for BuildToolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Target platform of a recipe.
///
/// # Example
///
/// ```
/// use waldo_core::Platform;
///
/// assert_eq!(Platform::Ios.as_str(), "ios");
/// assert_eq!(Platform::parse("iOS"), Platform::Ios);
/// assert_eq!(Platform::parse("tvos"), Platform::Unknown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Macos,
    Linux,
    Windows,
    #[default]
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Macos => "macos",
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::Unknown => "unknown",
        }
    }

    /// Parses a platform name case-insensitively; unrecognized names map to
    /// [`Platform::Unknown`].
    pub fn parse(value: &str) -> Platform {
        match value.trim().to_lowercase().as_str() {
            "android" => Platform::Android,
            "ios" => Platform::Ios,
            "macos" => Platform::Macos,
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            _ => Platform::Unknown,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Android => "Android",
            Platform::Ios => "iOS",
            Platform::Macos => "macOS",
            Platform::Linux => "Linux",
            Platform::Windows => "Windows",
            Platform::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Platforms a container can plausibly build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Support {
    pub android: bool,
    pub ios: bool,
}

impl Support {
    pub const ANDROID: Support = Support {
        android: true,
        ios: false,
    };

    pub const IOS: Support = Support {
        android: false,
        ios: true,
    };

    pub fn any(&self) -> bool {
        self.android || self.ios
    }

    /// Supported platforms, Android first.
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        if self.android {
            platforms.push(Platform::Android);
        }
        if self.ios {
            platforms.push(Platform::Ios);
        }
        platforms
    }
}

/// A candidate container discovered by [`crate::detect::detect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPath {
    /// Absolute path of the container.
    pub abs_path: PathBuf,
    /// Path relative to the directory the scan was requested from.
    pub rel_path: PathBuf,
    pub family: BuildToolFamily,
    pub android_support: bool,
    pub ios_support: bool,
}

impl BuildPath {
    pub fn support(&self) -> Support {
        Support {
            android: self.android_support,
            ios: self.ios_support,
        }
    }
}

impl fmt::Display for BuildPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.rel_path.display(), self.family)
    }
}

/// Record produced by a successful build, completed by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Path of the built `.app` directory or `.apk` file.
    pub build_path: PathBuf,
    /// RFC 3339 timestamp of the last upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<String>,
    /// Upload token used for the last upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_token: Option<String>,
}

impl ArtifactMetadata {
    pub fn new(build_path: impl Into<PathBuf>) -> Self {
        Self {
            build_path: build_path.into(),
            upload_time: None,
            upload_token: None,
        }
    }
}
