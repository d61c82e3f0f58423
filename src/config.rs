// src/config.rs
//! Read-side access to the external configuration store.
//!
//! The store itself (load/save/validation/atomic writes) is an external
//! collaborator; this module only consumes the nested JSON document it
//! produces. The registry reads `plugins.<name>` subtrees verbatim, the
//! dashboard reads the `system`, `display`, `network` and `screens` sections
//! with defaults applied here.

use alloc::string::{String, ToString};

use embassy_time::Duration;
use serde_json::Value;

/// Nested key/value mapping, both for widget configuration and pulled data.
pub type ConfigMap = serde_json::Map<String, Value>;

/// Deep merge of `user` over `defaults`: user scalars win on conflict, nested
/// mappings merge recursively, keys only present in either side survive.
pub fn merge_config(defaults: &ConfigMap, user: &ConfigMap) -> ConfigMap {
    let mut merged = defaults.clone();
    for (key, user_value) in user {
        match (merged.get_mut(key), user_value) {
            (Some(Value::Object(base)), Value::Object(overlay)) => {
                *base = merge_config(base, overlay);
            }
            _ => {
                merged.insert(key.clone(), user_value.clone());
            }
        }
    }
    merged
}

pub fn get_bool(config: &ConfigMap, key: &str, default: bool) -> bool {
    config.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub fn get_u64(config: &ConfigMap, key: &str, default: u64) -> u64 {
    config.get(key).and_then(Value::as_u64).unwrap_or(default)
}

pub fn get_str<'a>(config: &'a ConfigMap, key: &str, default: &'a str) -> &'a str {
    config.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// `root.<section>` as a mapping, empty if absent or not a mapping.
pub fn section<'a>(root: &'a Value, name: &str) -> Option<&'a ConfigMap> {
    root.get(name).and_then(Value::as_object)
}

/// Dashboard-level knobs with their defaults applied.
///
/// Widget subtrees are intentionally not represented here; they pass through
/// the registry untouched.
#[derive(Debug, Clone)]
pub struct SystemSettings {
    pub display_width: u32,
    pub display_height: u32,
    pub rotation_interval: Duration,
    pub target_fps: u32,
    pub pull_timeout: Duration,
    pub wifi_ssid: String,
    pub wifi_password: String,
    pub association_timeout: Duration,
    pub retry_delay: Duration,
    pub backoff_ceiling: Duration,
    pub probe_interval: Duration,
    pub fallback_ap: bool,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            display_width: 64,
            display_height: 64,
            rotation_interval: Duration::from_secs(10),
            target_fps: 10,
            pull_timeout: Duration::from_secs(10),
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            association_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(5),
            backoff_ceiling: Duration::from_secs(300),
            probe_interval: Duration::from_secs(30),
            fallback_ap: true,
        }
    }
}

impl SystemSettings {
    pub fn from_config(root: &Value) -> Self {
        let mut settings = Self::default();

        if let Some(system) = section(root, "system") {
            settings.wifi_ssid = get_str(system, "wifi_ssid", "").to_string();
            settings.wifi_password = get_str(system, "wifi_password", "").to_string();
            settings.rotation_interval = Duration::from_secs(
                get_u64(system, "rotation_interval", 10).max(1),
            );
        }

        if let Some(display) = section(root, "display") {
            settings.display_width = get_u64(display, "width", 64) as u32;
            settings.display_height = get_u64(display, "height", 64) as u32;
            settings.target_fps = (get_u64(display, "target_fps", 10) as u32).clamp(1, 60);
        }

        if let Some(network) = section(root, "network") {
            settings.pull_timeout = Duration::from_secs(get_u64(network, "timeout", 10).max(1));
            settings.association_timeout = settings.pull_timeout;
            settings.retry_delay = Duration::from_secs(get_u64(network, "retry_delay", 5).max(1));
            settings.backoff_ceiling =
                Duration::from_secs(get_u64(network, "backoff_ceiling", 300).max(1));
            settings.probe_interval =
                Duration::from_secs(get_u64(network, "probe_interval", 30).max(1));
            settings.fallback_ap = get_bool(network, "fallback_ap", true);
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn as_map(value: Value) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_user_scalar_wins() {
        let defaults = as_map(json!({"enabled": true, "interval": 30}));
        let user = as_map(json!({"interval": 60}));

        let merged = merge_config(&defaults, &user);
        assert_eq!(merged.get("interval"), Some(&json!(60)));
        assert_eq!(merged.get("enabled"), Some(&json!(true)));
    }

    #[test]
    fn test_nested_maps_merge() {
        let defaults = as_map(json!({"colors": {"fg": 7, "bg": 0}, "location": "auto"}));
        let user = as_map(json!({"colors": {"fg": 6}}));

        let merged = merge_config(&defaults, &user);
        let colors = merged.get("colors").unwrap().as_object().unwrap();
        assert_eq!(colors.get("fg"), Some(&json!(6)));
        assert_eq!(colors.get("bg"), Some(&json!(0)));
        assert_eq!(merged.get("location"), Some(&json!("auto")));
    }

    #[test]
    fn test_user_type_change_replaces() {
        // A user scalar over a default mapping replaces the whole subtree.
        let defaults = as_map(json!({"colors": {"fg": 7}}));
        let user = as_map(json!({"colors": "mono"}));

        let merged = merge_config(&defaults, &user);
        assert_eq!(merged.get("colors"), Some(&json!("mono")));
    }

    #[test]
    fn test_settings_defaults_without_sections() {
        let settings = SystemSettings::from_config(&json!({}));
        assert_eq!(settings.display_width, 64);
        assert_eq!(settings.target_fps, 10);
        assert_eq!(settings.rotation_interval, Duration::from_secs(10));
        assert!(settings.fallback_ap);
    }

    #[test]
    fn test_settings_from_config() {
        let root = json!({
            "system": {"wifi_ssid": "shed", "wifi_password": "hunter2", "rotation_interval": 7},
            "display": {"width": 128, "height": 32, "target_fps": 120},
            "network": {"timeout": 4, "retry_delay": 2, "fallback_ap": false},
        });
        let settings = SystemSettings::from_config(&root);
        assert_eq!(settings.wifi_ssid, "shed");
        assert_eq!(settings.display_width, 128);
        assert_eq!(settings.display_height, 32);
        // fps is clamped to the supported range
        assert_eq!(settings.target_fps, 60);
        assert_eq!(settings.rotation_interval, Duration::from_secs(7));
        assert_eq!(settings.pull_timeout, Duration::from_secs(4));
        assert_eq!(settings.retry_delay, Duration::from_secs(2));
        assert!(!settings.fallback_ap);
    }

    proptest! {
        #[test]
        fn merge_keeps_every_default_key(keys in proptest::collection::btree_set("[a-z]{1,6}", 0..8)) {
            let mut defaults = ConfigMap::new();
            for key in &keys {
                defaults.insert(key.clone(), json!(1));
            }
            let user = as_map(json!({"extra": true}));
            let merged = merge_config(&defaults, &user);
            for key in &keys {
                prop_assert!(merged.contains_key(key.as_str()));
            }
            prop_assert!(merged.contains_key("extra"));
        }
    }
}
