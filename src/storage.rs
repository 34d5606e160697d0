/// Storage keys and decoding for chrome.storage.sync

use crate::pin::PinTracker;
use crate::settings::Settings;
use serde::Deserialize;
use std::collections::HashMap;

pub const SYNC_AREA: &str = "sync";
pub const SETTINGS_KEY: &str = "settingsJson";
pub const PINNED_KEY: &str = "pinnedEnvironment";
pub const SHOW_COLOR_BADGE_KEY: &str = "showColorBadge";

/// Root of what the extension keeps in sync storage
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncData {
    #[serde(default)]
    pub settings_json: Option<serde_json::Value>,
    #[serde(default)]
    pub pinned_environment: Option<String>,
    #[serde(default)]
    pub show_color_badge: Option<bool>,
}

impl SyncData {
    /// Stored settings, if present and readable
    pub fn settings(&self) -> Option<Settings> {
        self.settings_json.clone().and_then(decode_settings)
    }

    /// Stored settings, or the defaults for a fresh install
    pub fn settings_or_default(&self) -> Settings {
        self.settings().unwrap_or_default()
    }

    pub fn pins(&self) -> PinTracker {
        PinTracker::new(self.pinned_environment.clone())
    }

    pub fn show_color_badge(&self) -> bool {
        self.show_color_badge.unwrap_or(false)
    }
}

/// Decode persisted settings; malformed fields are defaulted, a value that
/// is not a settings object with a `projects` array counts as absent.
pub fn decode_settings(value: serde_json::Value) -> Option<Settings> {
    if value.is_null() {
        return None;
    }
    match Settings::from_value(value) {
        Ok(settings) => Some(settings),
        Err(e) => {
            log::warn!("Ignoring unreadable stored settings: {}", e);
            None
        }
    }
}

/// One entry of a `storage.onChanged` notification
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageChange {
    #[serde(rename = "newValue", default)]
    pub new_value: Option<serde_json::Value>,
}

pub type StorageChanges = HashMap<String, StorageChange>;

fn sync_change<'a>(changes: &'a StorageChanges, area: &str, key: &str) -> Option<&'a StorageChange> {
    if area == SYNC_AREA {
        changes.get(key)
    } else {
        None
    }
}

/// A surface's local copy of the settings.
///
/// The copy is only a cache of what sync storage holds; every change
/// notification replaces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsCache {
    settings: Option<Settings>,
    pins: PinTracker,
}

impl SettingsCache {
    pub fn new(settings: Settings, pins: PinTracker) -> Self {
        SettingsCache {
            settings: Some(settings),
            pins,
        }
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    pub fn pins(&self) -> &PinTracker {
        &self.pins
    }

    pub fn set_pins(&mut self, pins: PinTracker) {
        self.pins = pins;
    }

    /// Apply a change notification. Returns whether anything the popup
    /// renders from changed.
    pub fn apply_changes(&mut self, area: &str, changes: &StorageChanges) -> bool {
        let mut changed = false;

        if let Some(change) = sync_change(changes, area, SETTINGS_KEY) {
            self.settings = change.new_value.clone().and_then(decode_settings);
            changed = true;
        }

        if let Some(change) = sync_change(changes, area, PINNED_KEY) {
            let pinned = change
                .new_value
                .as_ref()
                .and_then(|v| v.as_str())
                .map(String::from);
            self.pins = PinTracker::new(pinned);
            changed = true;
        }

        changed
    }
}

/// New value of the color badge switch, if this notification carries one
pub fn color_badge_change(area: &str, changes: &StorageChanges) -> Option<bool> {
    sync_change(changes, area, SHOW_COLOR_BADGE_KEY)?
        .new_value
        .as_ref()
        .and_then(|v| v.as_bool())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(json: &str) -> StorageChanges {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_sync_data_defaults() {
        let data: SyncData = serde_json::from_str("{}").unwrap();

        assert!(data.settings().is_none());
        assert_eq!(data.settings_or_default(), Settings::default());
        assert_eq!(data.pins().pinned(), None);
        assert!(!data.show_color_badge());
    }

    #[test]
    fn test_sync_data_roundtrip_values() {
        let data: SyncData = serde_json::from_str(
            r#"{
                "settingsJson": {"selectedProjectIndex": 1, "projects": [{"name": "A"}, {"name": "B"}]},
                "pinnedEnvironment": "1-0",
                "showColorBadge": true
            }"#,
        )
        .unwrap();

        let settings = data.settings().unwrap();
        assert_eq!(settings.projects.len(), 2);
        assert_eq!(settings.selected_project_index, 1);
        assert_eq!(data.pins().pinned(), Some("1-0"));
        assert!(data.show_color_badge());
    }

    #[test]
    fn test_decode_settings_rejects_non_objects() {
        assert!(decode_settings(serde_json::Value::Null).is_none());
        assert!(decode_settings(serde_json::json!([1, 2])).is_none());
        assert!(decode_settings(serde_json::json!({"projects": "nope"})).is_none());
    }

    #[test]
    fn test_decode_settings_keeps_project_with_bad_field() {
        let stored = serde_json::json!({
            "projects": [{
                "name": "Shop",
                "color": 7,
                "environments": [{"name": "Live", "domain": "shop", "tld": "ch"}]
            }]
        });

        let settings = decode_settings(stored).unwrap();

        assert_eq!(settings.projects.len(), 1);
        assert_eq!(settings.projects[0].name, "Shop");
        assert_eq!(settings.projects[0].environments[0].name, "Live");
        assert_eq!(settings.projects[0].environments[0].host(), "shop.ch");
    }

    #[test]
    fn test_cache_applies_settings_change() {
        let mut cache = SettingsCache::new(Settings::default(), PinTracker::default());
        let changed = cache.apply_changes(
            "sync",
            &changes(r#"{"settingsJson": {"newValue": {"projects": [{"name": "Fresh"}]}}}"#),
        );

        assert!(changed);
        assert_eq!(cache.settings().unwrap().projects[0].name, "Fresh");
    }

    #[test]
    fn test_cache_applies_pin_change() {
        let mut cache = SettingsCache::new(Settings::default(), PinTracker::new(Some("0-0".to_string())));

        assert!(cache.apply_changes("sync", &changes(r#"{"pinnedEnvironment": {"newValue": "0-2"}}"#)));
        assert_eq!(cache.pins().pinned(), Some("0-2"));

        assert!(cache.apply_changes("sync", &changes(r#"{"pinnedEnvironment": {"newValue": null}}"#)));
        assert_eq!(cache.pins().pinned(), None);
    }

    #[test]
    fn test_cache_ignores_other_areas_and_keys() {
        let mut cache = SettingsCache::new(Settings::default(), PinTracker::default());

        assert!(!cache.apply_changes(
            "local",
            &changes(r#"{"settingsJson": {"newValue": {"projects": []}}}"#)
        ));
        assert!(!cache.apply_changes("sync", &changes(r#"{"other": {"newValue": 1}}"#)));
        assert_eq!(cache.settings(), Some(&Settings::default()));
    }

    #[test]
    fn test_color_badge_change() {
        assert_eq!(
            color_badge_change("sync", &changes(r#"{"showColorBadge": {"newValue": false}}"#)),
            Some(false)
        );
        assert_eq!(
            color_badge_change("local", &changes(r#"{"showColorBadge": {"newValue": true}}"#)),
            None
        );
        assert_eq!(color_badge_change("sync", &changes("{}")), None);
    }
}
