/// Host permission planning for the color badge content script

use crate::settings::Settings;
use serde::{Deserialize, Serialize};

const BLANKET_ORIGINS: [&str; 2] = ["<all_urls>", "*://*/*"];

/// Deduplicated `*://domain.tld/*` patterns for every complete environment,
/// in first-seen order
pub fn origin_patterns(settings: &Settings) -> Vec<String> {
    let mut patterns: Vec<String> = Vec::new();
    for env in settings.projects.iter().flat_map(|p| p.environments.iter()) {
        if env.domain.is_empty() || env.tld.is_empty() {
            continue;
        }
        let pattern = format!("*://{}/*", env.host());
        if !patterns.contains(&pattern) {
            patterns.push(pattern);
        }
    }
    patterns
}

/// Host shown to the user for an origin pattern
pub fn display_host(pattern: &str) -> &str {
    let host = pattern.strip_prefix("*://").unwrap_or(pattern);
    host.strip_suffix("/*").unwrap_or(host)
}

/// Blanket host grants an older version left behind, dropped on update.
/// Configured origins are only requested from the settings page, where a
/// user gesture is available.
pub fn blanket_grants_to_drop(reason: &str, granted: &[String]) -> Vec<String> {
    if reason != "update" {
        return Vec::new();
    }
    granted
        .iter()
        .filter(|o| BLANKET_ORIGINS.contains(&o.as_str()))
        .cloned()
        .collect()
}

/// Origins to request and to drop so that exactly `needed` is granted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionPlan {
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
}

impl PermissionPlan {
    pub fn new(needed: &[String], granted: &[String]) -> Self {
        PermissionPlan {
            to_add: needed.iter().filter(|p| !granted.contains(p)).cloned().collect(),
            to_remove: granted.iter().filter(|p| !needed.contains(p)).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// What applying the plan achieved, given the answer to the permission
    /// prompt and whether stale origins could be dropped
    pub fn outcome(self, request_accepted: bool, removal_succeeded: bool) -> SyncResult {
        let (granted, failed) = if request_accepted {
            (self.to_add, Vec::new())
        } else {
            (Vec::new(), self.to_add)
        };
        SyncResult {
            granted,
            removed: if removal_succeeded { self.to_remove } else { Vec::new() },
            failed,
        }
    }
}

/// Outcome of applying a `PermissionPlan`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub granted: Vec<String>,
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

impl SyncResult {
    /// The user declined every origin that was asked for
    pub fn is_denied(&self) -> bool {
        !self.failed.is_empty() && self.granted.is_empty()
    }
}

/// Per-origin grant state for the settings page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginStatus {
    pub host: String,
    pub granted: bool,
}

pub fn origin_status(needed: &[String], granted: &[String]) -> Vec<OriginStatus> {
    needed
        .iter()
        .map(|pattern| OriginStatus {
            host: display_host(pattern).to_string(),
            granted: granted.contains(pattern),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Environment, Project};

    fn create_test_settings() -> Settings {
        Settings {
            selected_project_index: 0,
            projects: vec![
                Project {
                    name: "Shop".to_string(),
                    color: None,
                    environments: vec![
                        Environment::new("Local", "shop", "test"),
                        Environment::new("Live", "shop", "ch"),
                        Environment::new("Broken", "", "ch"),
                    ],
                },
                Project {
                    name: "Shop again".to_string(),
                    color: None,
                    environments: vec![Environment::new("Local", "shop", "test")],
                },
            ],
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_origin_patterns() {
        let patterns = origin_patterns(&create_test_settings());
        assert_eq!(patterns, strings(&["*://shop.test/*", "*://shop.ch/*"]));
    }

    #[test]
    fn test_origin_patterns_empty_settings() {
        let settings = Settings {
            selected_project_index: 0,
            projects: vec![],
        };
        assert!(origin_patterns(&settings).is_empty());
    }

    #[test]
    fn test_display_host() {
        assert_eq!(display_host("*://shop.test/*"), "shop.test");
        assert_eq!(display_host("shop.test"), "shop.test");
    }

    #[test]
    fn test_permission_plan() {
        let needed = strings(&["*://a.test/*", "*://b.test/*"]);
        let granted = strings(&["*://b.test/*", "*://old.test/*"]);

        let plan = PermissionPlan::new(&needed, &granted);

        assert_eq!(plan.to_add, strings(&["*://a.test/*"]));
        assert_eq!(plan.to_remove, strings(&["*://old.test/*"]));
        assert!(PermissionPlan::new(&needed, &needed).is_empty());
    }

    #[test]
    fn test_plan_outcome() {
        let needed = strings(&["*://a.test/*"]);
        let granted = strings(&["*://old.test/*"]);

        let accepted = PermissionPlan::new(&needed, &granted).outcome(true, true);
        assert_eq!(accepted.granted, strings(&["*://a.test/*"]));
        assert_eq!(accepted.removed, strings(&["*://old.test/*"]));
        assert!(accepted.failed.is_empty());

        let declined = PermissionPlan::new(&needed, &granted).outcome(false, false);
        assert!(declined.granted.is_empty());
        assert!(declined.removed.is_empty());
        assert!(declined.is_denied());

        // Nothing to ask for is never a denial
        let nothing = PermissionPlan::new(&[], &[]).outcome(false, true);
        assert!(!nothing.is_denied());
    }

    #[test]
    fn test_sync_result_denied() {
        let denied = SyncResult {
            failed: strings(&["*://a.test/*"]),
            ..Default::default()
        };
        assert!(denied.is_denied());

        let partial = SyncResult {
            granted: strings(&["*://b.test/*"]),
            failed: strings(&["*://a.test/*"]),
            ..Default::default()
        };
        assert!(!partial.is_denied());
        assert!(!SyncResult::default().is_denied());
    }

    #[test]
    fn test_update_drops_only_blanket_grants() {
        let granted = strings(&["<all_urls>", "*://a.test/*", "*://*/*"]);

        assert_eq!(
            blanket_grants_to_drop("update", &granted),
            strings(&["<all_urls>", "*://*/*"])
        );
        assert!(blanket_grants_to_drop("update", &strings(&["*://a.test/*"])).is_empty());
        assert!(blanket_grants_to_drop("install", &granted).is_empty());
    }

    #[test]
    fn test_origin_status() {
        let needed = strings(&["*://a.test/*", "*://b.test/*"]);
        let granted = strings(&["*://b.test/*"]);

        let status = origin_status(&needed, &granted);

        assert_eq!(status[0], OriginStatus { host: "a.test".to_string(), granted: false });
        assert_eq!(status[1], OriginStatus { host: "b.test".to_string(), granted: true });
    }
}
