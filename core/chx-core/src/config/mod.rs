//! Configuration: static settings plus runtime feature flags.

pub mod feature_flags;
pub mod settings;

pub use feature_flags::{Feature, FeatureFlags};
pub use settings::{
    BATCH_TIMEOUT, ConnectionMode, DdlComparison, INTERACTIVE_TIMEOUT, ProfileConfig, Settings,
};

use tracing::warn;

impl Settings {
    /// Feature flags seeded from the settings, then the persisted flag file
    /// (`feature_flags_path`), then `CHX_FEATURE_*`.
    ///
    /// An unreadable flag file is logged and skipped.
    pub fn feature_flags(&self) -> FeatureFlags {
        let flags = match &self.feature_flags_path {
            Some(path) => FeatureFlags::new().with_persistence(path.clone()),
            None => FeatureFlags::new(),
        };
        flags.toggle(Feature::UseDoublers, self.use_doublers);
        flags.toggle(Feature::TestMode, self.test_mode);
        if let Err(e) = flags.load_from_file() {
            warn!(
                path = ?self.feature_flags_path,
                error = %e,
                "feature flag file ignored"
            );
        }
        flags.load_from_env();
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_flag_file_overrides_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        fs::write(&path, r#"{"use_doublers": false, "query_timing": true}"#).unwrap();

        let settings = Settings {
            use_doublers: true,
            test_mode: true,
            feature_flags_path: Some(path),
            ..Settings::default()
        };
        let flags = settings.feature_flags();

        assert!(!flags.is_enabled(Feature::UseDoublers));
        assert!(flags.is_enabled(Feature::TestMode));
        assert!(flags.is_enabled(Feature::QueryTiming));
    }

    #[test]
    fn test_broken_flag_file_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        fs::write(&path, "not json").unwrap();

        let settings = Settings {
            use_doublers: true,
            feature_flags_path: Some(path),
            ..Settings::default()
        };
        assert!(settings.feature_flags().is_enabled(Feature::UseDoublers));
    }

    #[test]
    fn test_missing_flag_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            test_mode: true,
            feature_flags_path: Some(dir.path().join("absent.json")),
            ..Settings::default()
        };
        assert!(settings.feature_flags().is_enabled(Feature::TestMode));
    }
}
