//! Families that recipes may name but this version cannot build.
//!
//! Their container predicates never fire and every entry point fails with
//! [`WaldoError::Unsupported`], so recipes written by newer versions load and
//! are rejected cleanly when built.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::common::{BuildContext, BuildTarget};
use super::{Builder, Driver, Made};
use crate::types::{BuildPath, BuildToolFamily, Support, WaldoError};

macro_rules! unsupported_builder {
    ($(#[$doc:meta])* $name:ident => $family:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {}

        impl Builder for $name {
            fn summarize(&self) -> String {
                format!("{} (unsupported)", $family)
            }

            fn clean(&self, _target: BuildTarget<'_>, _ctx: &mut BuildContext<'_>) -> Result<(), WaldoError> {
                Err(WaldoError::Unsupported($family))
            }

            fn build(
                &self,
                _target: BuildTarget<'_>,
                _clean: bool,
                _ctx: &mut BuildContext<'_>,
            ) -> Result<PathBuf, WaldoError> {
                Err(WaldoError::Unsupported($family))
            }
        }
    };
}

unsupported_builder!(
    /// Expo recipe marker.
    ExpoBuilder => BuildToolFamily::Expo
);
unsupported_builder!(
    /// Ionic recipe marker.
    IonicBuilder => BuildToolFamily::Ionic
);
unsupported_builder!(
    /// Custom script recipe marker.
    CustomBuilder => BuildToolFamily::Custom
);

/// Driver for a family without container detection or introspection.
pub struct UnsupportedDriver(pub BuildToolFamily);

impl Driver for UnsupportedDriver {
    fn family(&self) -> BuildToolFamily {
        self.0
    }

    fn is_container(&self, _path: &Path) -> Option<Support> {
        None
    }

    fn make(&self, _build_path: &BuildPath, _ctx: &mut BuildContext<'_>) -> Result<Made, WaldoError> {
        Err(WaldoError::Unsupported(self.0))
    }
}
