// Runtime feature flags
//
// Seeded from `Settings`, overridable from a persisted JSON file and the environment,
// and toggled by tests (doubler mode in particular) without rebuilding the context.

use crate::error::ChxResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Feature Flag 정의
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// External-source tables resolve to doublers backed by the shadow source
    UseDoublers,

    /// Test-suite mode: doublers are never created, tests mock tables instead
    TestMode,

    /// Per-query timing at debug level
    QueryTiming,
}

const ALL_FEATURES: [Feature; 3] = [Feature::UseDoublers, Feature::TestMode, Feature::QueryTiming];

impl Feature {
    /// Feature를 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::UseDoublers => "use_doublers",
            Feature::TestMode => "test_mode",
            Feature::QueryTiming => "query_timing",
        }
    }

    /// 문자열에서 Feature 파싱
    pub fn parse_feature(s: &str) -> Option<Self> {
        match s {
            "use_doublers" => Some(Feature::UseDoublers),
            "test_mode" => Some(Feature::TestMode),
            "query_timing" => Some(Feature::QueryTiming),
            _ => None,
        }
    }

    /// 환경 변수 이름
    pub fn env_var_name(&self) -> String {
        format!("CHX_FEATURE_{}", self.as_str().to_uppercase())
    }
}

/// Feature Flag 관리자
///
/// Clones share the same flag table.
#[derive(Clone)]
pub struct FeatureFlags {
    flags: Arc<RwLock<HashMap<Feature, bool>>>,

    /// 영속성 파일 경로
    persistence_path: Option<PathBuf>,
}

impl FeatureFlags {
    pub fn new() -> Self {
        Self {
            flags: Arc::new(RwLock::new(HashMap::new())),
            persistence_path: None,
        }
    }

    /// 영속성 경로 설정
    pub fn with_persistence(mut self, path: PathBuf) -> Self {
        self.persistence_path = Some(path);
        self
    }

    pub fn enable(&self, feature: Feature) {
        self.toggle(feature, true);
    }

    pub fn disable(&self, feature: Feature) {
        self.toggle(feature, false);
    }

    pub fn toggle(&self, feature: Feature, enabled: bool) {
        self.flags.write().insert(feature, enabled);
    }

    /// Unset features are disabled.
    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.flags.read().get(&feature).copied().unwrap_or(false)
    }

    /// 환경 변수에서 로드
    pub fn load_from_env(&self) {
        for feature in &ALL_FEATURES {
            if let Ok(value) = env::var(feature.env_var_name()) {
                let enabled = value.to_lowercase() == "true" || value == "1";
                self.toggle(*feature, enabled);
            }
        }
    }

    /// 파일에서 로드
    ///
    /// A missing file leaves the flags untouched; unknown keys are skipped.
    pub fn load_from_file(&self) -> ChxResult<()> {
        if let Some(path) = self.persistence_path.as_ref().filter(|p| p.exists()) {
            let json = fs::read_to_string(path)?;
            let loaded: HashMap<String, bool> = serde_json::from_str(&json)?;

            let mut flags = self.flags.write();
            for (key, value) in loaded {
                if let Some(feature) = Feature::parse_feature(&key) {
                    flags.insert(feature, value);
                }
            }
        }
        Ok(())
    }

    /// 파일에 저장
    pub fn save_to_file(&self) -> ChxResult<()> {
        if let Some(path) = &self.persistence_path {
            let serializable: HashMap<String, bool> = self
                .flags
                .read()
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), *v))
                .collect();

            let json = serde_json::to_string_pretty(&serializable)?;

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(path, json)?;
        }
        Ok(())
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_flag_enable_disable() {
        let flags = FeatureFlags::new();

        assert!(!flags.is_enabled(Feature::UseDoublers));

        flags.enable(Feature::UseDoublers);
        assert!(flags.is_enabled(Feature::UseDoublers));

        flags.disable(Feature::UseDoublers);
        assert!(!flags.is_enabled(Feature::UseDoublers));
    }

    #[test]
    fn test_clones_share_state() {
        let flags = FeatureFlags::new();
        let shared = flags.clone();

        shared.enable(Feature::TestMode);
        assert!(flags.is_enabled(Feature::TestMode));
    }

    #[test]
    fn test_feature_flag_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        let flags = FeatureFlags::new().with_persistence(path.clone());

        flags.enable(Feature::UseDoublers);
        flags.disable(Feature::QueryTiming);
        flags.save_to_file().unwrap();

        let restored = FeatureFlags::new().with_persistence(path);
        restored.load_from_file().unwrap();

        assert!(restored.is_enabled(Feature::UseDoublers));
        assert!(!restored.is_enabled(Feature::QueryTiming));
        assert!(!restored.is_enabled(Feature::TestMode));
    }

    #[test]
    fn test_feature_flag_env_var() {
        let flags = FeatureFlags::new();

        // 환경 변수 설정 (unsafe)
        unsafe {
            env::set_var("CHX_FEATURE_QUERY_TIMING", "1");
        }

        flags.load_from_env();
        assert!(flags.is_enabled(Feature::QueryTiming));

        unsafe {
            env::remove_var("CHX_FEATURE_QUERY_TIMING");
        }
    }

    #[test]
    fn test_feature_from_str() {
        assert_eq!(
            Feature::parse_feature("use_doublers"),
            Some(Feature::UseDoublers)
        );
        assert_eq!(Feature::parse_feature("invalid"), None);
        assert_eq!(
            Feature::TestMode.env_var_name(),
            "CHX_FEATURE_TEST_MODE"
        );
    }
}
