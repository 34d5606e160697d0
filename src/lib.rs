/// Environment Switcher - browser extension for hopping between the
/// deployments of a TYPO3 project
/// Built with Rust + WASM + Yew

pub mod background;
pub mod content;
pub mod error;
pub mod links;
pub mod matcher;
pub mod messages;
pub mod page_id;
pub mod permissions;
pub mod pin;
pub mod settings;
pub mod storage;
pub mod ui;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

// Start the Yew app for the settings page
#[wasm_bindgen]
pub fn start_settings() {
    yew::Renderer::<ui::settings::SettingsPage>::new().render();
}

/// Service worker entry for `runtime.onMessage`; resolves to the reply
#[wasm_bindgen]
pub async fn handle_message(request: JsValue, tab_url: Option<String>) -> Result<JsValue, JsValue> {
    background::handle_message(request, tab_url).await
}

#[wasm_bindgen]
pub async fn on_installed(reason: String) -> Result<(), JsValue> {
    background::on_installed(reason).await
}

#[wasm_bindgen]
pub async fn sync_content_scripts() -> Result<(), JsValue> {
    background::sync_content_scripts().await
}

#[wasm_bindgen]
pub fn start_content_script() {
    content::start();
}
