/// Background service worker: message dispatch, toolbar badge and content
/// script registration

use crate::messages::{
    BackgroundState, BadgeText, DomainConfigReply, Request, StatusReply, UidReply, color_badge_info,
};
use crate::permissions::blanket_grants_to_drop;
use crate::storage::{PINNED_KEY, SETTINGS_KEY, SHOW_COLOR_BADGE_KEY, SyncData};
use serde::Serialize;
use std::cell::RefCell;
use wasm_bindgen::prelude::*;

// Import JS bridge functions
#[wasm_bindgen(module = "/background.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getSyncStorage(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setSyncStorage(items: JsValue) -> Result<(), JsValue>;

    fn setBadge(text: &str, text_color: Option<String>, background_color: Option<String>);

    #[wasm_bindgen(catch)]
    async fn getGrantedOrigins() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn removeOrigins(origins: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn registerContentScripts(origins: JsValue) -> Result<(), JsValue>;
}

thread_local! {
    static STATE: RefCell<BackgroundState> = RefCell::new(BackgroundState::default());
}

/// Handle one runtime message and produce the reply object
pub async fn handle_message(request: JsValue, tab_url: Option<String>) -> Result<JsValue, JsValue> {
    let request: Request = match serde_wasm_bindgen::from_value(request) {
        Ok(request) => request,
        Err(e) => {
            log::debug!("Unhandled message: {:?}", e);
            return to_js(&StatusReply::unknown_message());
        }
    };

    match request {
        Request::SetUid { uid } => {
            let badge = STATE.with(|state| state.borrow_mut().set_uid(uid));
            show_badge(&badge);
            to_js(&StatusReply::success())
        }
        Request::ClearUid => {
            let badge = STATE.with(|state| state.borrow_mut().clear_uid());
            show_badge(&badge);
            to_js(&StatusReply::success())
        }
        Request::GetUid => {
            let uid = STATE.with(|state| state.borrow().uid().map(String::from));
            to_js(&UidReply { uid })
        }
        Request::GetDomainConfig => {
            let data = load_sync_data().await?;
            to_js(&DomainConfigReply {
                settings_json: data.settings_or_default(),
            })
        }
        Request::SaveDomainConfig { data } => {
            let items = serde_json::json!({ SETTINGS_KEY: data });
            setSyncStorage(to_js(&items)?).await?;
            log::debug!("Projects configuration saved");
            to_js(&StatusReply::success())
        }
        Request::GetColorBadgeInfo => {
            let data = load_sync_data().await?;
            let settings = data.settings();
            let info = color_badge_info(data.show_color_badge(), tab_url.as_deref(), settings.as_ref());
            to_js(&info)
        }
        Request::SyncContentScripts => {
            sync_content_scripts().await?;
            to_js(&StatusReply::success())
        }
    }
}

/// Install/update hook: drop blanket permissions left by older versions,
/// then register content scripts for what is granted.
pub async fn on_installed(reason: String) -> Result<(), JsValue> {
    let blanket = blanket_grants_to_drop(&reason, &granted_origins().await?);
    if !blanket.is_empty() {
        log::info!("Dropping blanket host permissions: {:?}", blanket);
        if let Err(e) = removeOrigins(to_js(&blanket)?).await {
            log::warn!("Failed to drop blanket permissions: {:?}", e);
        }
    }

    sync_content_scripts().await
}

/// Re-register the content script for every currently granted origin
pub async fn sync_content_scripts() -> Result<(), JsValue> {
    let origins = granted_origins().await?;
    registerContentScripts(to_js(&origins)?).await
}

async fn granted_origins() -> Result<Vec<String>, JsValue> {
    let origins = getGrantedOrigins().await?;
    serde_wasm_bindgen::from_value(origins).map_err(|e| JsValue::from_str(&e.to_string()))
}

async fn load_sync_data() -> Result<SyncData, JsValue> {
    let keys = to_js(&[SETTINGS_KEY, PINNED_KEY, SHOW_COLOR_BADGE_KEY])?;
    let data = getSyncStorage(keys).await?;
    if data.is_null() || data.is_undefined() {
        return Ok(SyncData::default());
    }
    serde_wasm_bindgen::from_value(data).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn show_badge(badge: &BadgeText) {
    setBadge(
        &badge.text,
        badge.text_color.map(String::from),
        badge.background_color.map(String::from),
    );
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
