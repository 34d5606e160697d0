/// Messages exchanged between the popup, settings page, content script and
/// the background service worker

use crate::matcher::match_host;
use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    SetUid { uid: String },
    ClearUid,
    GetUid,
    GetDomainConfig,
    SaveDomainConfig { data: Settings },
    GetColorBadgeInfo,
    SyncContentScripts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusReply {
    pub fn success() -> Self {
        StatusReply {
            status: "success".to_string(),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StatusReply {
            status: "error".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn unknown_message() -> Self {
        Self::error("Unknown message type")
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// `Err` with the worker's message for anything but success
    pub fn into_result(self) -> Result<(), String> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self.message.unwrap_or(self.status))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UidReply {
    pub uid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainConfigReply {
    pub settings_json: Settings,
}

/// Whether and in which color the content script draws the corner badge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorBadgeInfo {
    pub show_badge: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ColorBadgeInfo {
    fn hidden(reason: &str) -> Self {
        ColorBadgeInfo {
            show_badge: false,
            color: None,
            reason: Some(reason.to_string()),
        }
    }

    /// Color to draw, unless the badge is off or white
    pub fn visible_color(&self) -> Option<&str> {
        if !self.show_badge {
            return None;
        }
        self.color.as_deref().filter(|c| !is_white(c))
    }
}

pub fn is_white(color: &str) -> bool {
    matches!(color.to_lowercase().as_str(), "#ffffff" | "#fff" | "white")
}

/// Badge decision for the tab at `tab_url`
pub fn color_badge_info(show_badge: bool, tab_url: Option<&str>, settings: Option<&Settings>) -> ColorBadgeInfo {
    if !show_badge {
        return ColorBadgeInfo::hidden("setting disabled");
    }
    let Some(tab_url) = tab_url.filter(|u| !u.is_empty()) else {
        return ColorBadgeInfo::hidden("no tab url");
    };
    let Some(settings) = settings else {
        return ColorBadgeInfo::hidden("no settings");
    };

    let found = match Url::parse(tab_url) {
        Ok(url) => url.host_str().and_then(|host| match_host(host, settings)),
        Err(e) => {
            log::debug!("[EnvSwitcher] Error parsing URL {}: {}", tab_url, e);
            None
        }
    };

    match found {
        Some(found) => ColorBadgeInfo {
            show_badge: true,
            color: Some(found.environment.badge_color().to_string()),
            reason: None,
        },
        None => ColorBadgeInfo::hidden("no matching environment"),
    }
}

/// Toolbar badge contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeText {
    pub text: String,
    pub text_color: Option<&'static str>,
    pub background_color: Option<&'static str>,
}

/// State owned by the background service worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackgroundState {
    current_uid: Option<String>,
}

impl BackgroundState {
    pub fn set_uid(&mut self, uid: String) -> BadgeText {
        let badge = BadgeText {
            text: uid.clone(),
            text_color: Some("white"),
            background_color: Some("red"),
        };
        self.current_uid = Some(uid);
        badge
    }

    pub fn clear_uid(&mut self) -> BadgeText {
        self.current_uid = None;
        BadgeText {
            text: String::new(),
            text_color: None,
            background_color: None,
        }
    }

    pub fn uid(&self) -> Option<&str> {
        self.current_uid.as_deref()
    }
}
