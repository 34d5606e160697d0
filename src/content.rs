/// Content script: reports the page identifier to the background worker and
/// draws the environment color badge

use crate::messages::{ColorBadgeInfo, Request};
use crate::page_id::{PageContext, PageIdExtractor};
use crate::storage::{StorageChanges, color_badge_change};
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::Document;

pub const BADGE_ELEMENT_ID: &str = "env-switcher-color-badge";

// Import JS bridge functions
#[wasm_bindgen(module = "/content.js")]
extern "C" {
    fn isContextAlive() -> bool;

    #[wasm_bindgen(catch)]
    async fn sendMessage(message: JsValue) -> Result<JsValue, JsValue>;

    fn onNavigate(callback: &Closure<dyn Fn()>);

    fn onStorageChanged(callback: &Closure<dyn Fn(JsValue, String)>);
}

pub fn start() {
    extract_and_send_uid();
    overlay_color_badge();

    // The backend navigates client-side, so the identifier changes without
    // a new document load
    let on_navigate = Closure::wrap(Box::new(extract_and_send_uid) as Box<dyn Fn()>);
    onNavigate(&on_navigate);
    on_navigate.forget();

    let on_storage = Closure::wrap(Box::new(|changes: JsValue, area: String| {
        if !isContextAlive() {
            return;
        }
        let changes: StorageChanges = match serde_wasm_bindgen::from_value(changes) {
            Ok(changes) => changes,
            Err(_) => return,
        };
        match color_badge_change(&area, &changes) {
            Some(false) => remove_color_badge(),
            Some(true) => overlay_color_badge(),
            None => {}
        }
    }) as Box<dyn Fn(JsValue, String)>);
    onStorageChanged(&on_storage);
    on_storage.forget();
}

fn document() -> Option<Document> {
    web_sys::window()?.document()
}

fn current_url() -> Option<Url> {
    let href = web_sys::window()?.location().href().ok()?;
    Url::parse(&href).ok()
}

pub fn extract_and_send_uid() {
    let (Some(document), Some(url)) = (document(), current_url()) else {
        return;
    };

    let uid = PageIdExtractor::default().extract(&PageContext::new(&document, &url));

    // Extension context invalidated, e.g. after an extension reload
    if !isContextAlive() {
        return;
    }

    let request = match uid {
        Some(uid) => Request::SetUid { uid },
        None => Request::ClearUid,
    };

    spawn_local(async move {
        let message = match serde_wasm_bindgen::to_value(&request) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Failed to serialize message: {:?}", e);
                return;
            }
        };
        if let Err(e) = sendMessage(message).await {
            log::debug!("Message not delivered: {:?}", e);
        }
    });
}

fn overlay_color_badge() {
    let Some(document) = document() else {
        return;
    };
    if document.get_element_by_id(BADGE_ELEMENT_ID).is_some() || !isContextAlive() {
        return;
    }

    spawn_local(async move {
        let message = match serde_wasm_bindgen::to_value(&Request::GetColorBadgeInfo) {
            Ok(message) => message,
            Err(_) => return,
        };
        let info: ColorBadgeInfo = match sendMessage(message).await {
            Ok(reply) => match serde_wasm_bindgen::from_value(reply) {
                Ok(info) => info,
                Err(_) => return,
            },
            Err(e) => {
                log::debug!("Error getting color badge info: {:?}", e);
                return;
            }
        };

        if let Some(color) = info.visible_color() {
            if let Err(e) = create_color_badge(&document, color) {
                log::warn!("Failed to create color badge: {:?}", e);
            }
        }
    });
}

fn create_color_badge(document: &Document, color: &str) -> Result<(), JsValue> {
    // A second request may have raced this one
    if document.get_element_by_id(BADGE_ELEMENT_ID).is_some() {
        return Ok(());
    }
    let Some(body) = document.body() else {
        return Ok(());
    };

    let badge = document.create_element("div")?;
    badge.set_id(BADGE_ELEMENT_ID);
    badge.set_attribute("style", &badge_style(color))?;
    body.append_child(&badge)?;
    Ok(())
}

fn remove_color_badge() {
    if let Some(badge) = document().and_then(|d| d.get_element_by_id(BADGE_ELEMENT_ID)) {
        badge.remove();
    }
}

fn badge_style(color: &str) -> String {
    format!(
        "position: fixed; top: 0; left: 0; width: 0; height: 0; border-style: solid; \
         border-width: 40px 40px 0 0; border-color: {} transparent transparent transparent; \
         z-index: 2147483647; pointer-events: none;",
        color
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_style_uses_color() {
        let style = badge_style("#00ff00");
        assert!(style.contains("border-color: #00ff00 transparent"));
        assert!(style.contains("position: fixed"));
    }
}
