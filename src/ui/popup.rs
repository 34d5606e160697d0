/// Popup UI: environment cards for the active tab

use crate::links::{Link, LinkKind, PopupView, popup_view, short_title};
use crate::messages::{DomainConfigReply, Request};
use crate::page_id::{PageContext, PageIdExtractor, PageSnapshot};
use crate::pin::{PinKey, PinTracker};
use crate::storage::{PINNED_KEY, SettingsCache, StorageChanges, SyncData};
use crate::ui::components::{EnvironmentCard, LinkAnchor};
use crate::ui::run_later;
use patternfly_yew::prelude::*;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

// Import JS bridge functions
#[wasm_bindgen(module = "/popup.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getActiveTab() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn readPageSnapshot(tab_id: i32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendMessage(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getSyncStorage(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setSyncStorage(items: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn copyToClipboard(text: &str) -> Result<(), JsValue>;

    fn openUrl(url: &str, in_current_tab: bool);

    fn openSettings(params: &str);

    fn onStorageChanged(callback: &Closure<dyn Fn(JsValue, String)>);
}

#[derive(Clone, PartialEq, Deserialize)]
struct ActiveTab {
    id: i32,
    url: String,
    #[serde(default)]
    title: String,
}

#[derive(Clone, PartialEq)]
struct PageInfo {
    title: String,
    url: Url,
    page_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum AppState {
    Loading,
    Idle,
    Error(String),
}

enum CacheAction {
    Loaded(SettingsCache),
    StorageChanged(String, StorageChanges),
    Pinned(PinTracker),
}

/// Popup-local copy of settings and pin, refreshed from storage notifications
#[derive(Clone, Default, PartialEq)]
struct PopupCache {
    cache: SettingsCache,
}

impl Reducible for PopupCache {
    type Action = CacheAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        let mut next = (*self).clone();
        match action {
            CacheAction::Loaded(cache) => next.cache = cache,
            CacheAction::StorageChanged(area, changes) => {
                if !next.cache.apply_changes(&area, &changes) {
                    return self;
                }
            }
            CacheAction::Pinned(pins) => next.cache.set_pins(pins),
        }
        Rc::new(next)
    }
}

/// Status shown above the links. A failed settings load is not cleared by
/// the tab read finishing afterwards.
fn displayed_state(load_error: Option<&String>, tab: &AppState) -> AppState {
    match load_error {
        Some(e) => AppState::Error(e.clone()),
        None => tab.clone(),
    }
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_state(|| AppState::Loading);
    let load_error = use_state(|| None::<String>);
    let cache = use_reducer(PopupCache::default);
    let page = use_state(|| None::<PageInfo>);
    let refresh = use_state(|| 0u32);
    let copied = use_state(|| false);

    // Load settings and pin; re-runs on retry
    {
        let cache = cache.clone();
        let load_error = load_error.clone();
        use_effect_with(*refresh, move |_| {
            spawn_local(async move {
                match load_cache().await {
                    Ok(loaded) => {
                        cache.dispatch(CacheAction::Loaded(loaded));
                        load_error.set(None);
                    }
                    Err(e) => load_error.set(Some(format!("Failed to load settings: {}", e))),
                }
            });
            || ()
        });
    }

    // Follow storage changes
    {
        let cache = cache.clone();
        use_effect_with((), move |_| {
            let listener = Closure::wrap(Box::new(move |changes: JsValue, area: String| {
                match serde_wasm_bindgen::from_value::<StorageChanges>(changes) {
                    Ok(changes) => cache.dispatch(CacheAction::StorageChanged(area, changes)),
                    Err(e) => log::debug!("Ignoring storage change: {:?}", e),
                }
            }) as Box<dyn Fn(JsValue, String)>);
            onStorageChanged(&listener);
            listener.forget();
            || ()
        });
    }

    // Read the active tab; re-runs on retry
    {
        let page = page.clone();
        let state = state.clone();
        use_effect_with(*refresh, move |_| {
            spawn_local(async move {
                match fetch_page().await {
                    Ok(info) => {
                        if let Some(uid) = &info.page_id {
                            // Keep the worker's badge in sync
                            let _ = send(&Request::SetUid { uid: uid.clone() }).await;
                        }
                        page.set(Some(info));
                        state.set(AppState::Idle);
                    }
                    Err(e) => state.set(AppState::Error(format!("Failed to read tab: {}", e))),
                }
            });
            || ()
        });
    }

    let on_retry = {
        let refresh = refresh.clone();
        Callback::from(move |e: MouseEvent| {
            e.prevent_default();
            refresh.set(*refresh + 1);
        })
    };

    let on_pin = {
        let cache = cache.clone();
        Callback::from(move |key: PinKey| {
            let mut pins = cache.cache.pins().clone();
            pins.toggle(&key);
            cache.dispatch(CacheAction::Pinned(pins.clone()));

            spawn_local(async move {
                if let Err(e) = save_pin(&pins).await {
                    log::warn!("Failed to save pin: {}", e);
                }
            });
        })
    };

    let on_open = Callback::from(|(href, in_current_tab): (String, bool)| {
        openUrl(&href, in_current_tab);
    });

    let on_copy = {
        let copied = copied.clone();
        Callback::from(move |text: String| {
            let copied = copied.clone();
            spawn_local(async move {
                match copyToClipboard(&text).await {
                    Ok(()) => {
                        copied.set(true);
                        run_later(1000, move || copied.set(false));
                    }
                    Err(e) => log::error!("Failed to copy: {:?}", e),
                }
            });
        })
    };

    let view = match (cache.cache.settings(), &*page) {
        (Some(settings), Some(info)) => Some(popup_view(
            &info.url,
            info.page_id.as_deref(),
            settings,
            cache.cache.pins(),
        )),
        _ => None,
    };

    let on_open_settings = {
        let params = view
            .as_ref()
            .map(|v| format!("project={}", v.project_index()))
            .unwrap_or_default();
        Callback::from(move |e: MouseEvent| {
            e.prevent_default();
            openSettings(&params);
        })
    };

    let show_footer = matches!(
        view,
        Some(PopupView::Frontend { .. } | PopupView::NoProject(_))
            | Some(PopupView::Backend { page_id: Some(_), .. })
    );

    html! {
        <div class="popup">
            {match displayed_state(load_error.as_ref(), &state) {
                AppState::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                    </div>
                },
                AppState::Error(err) => html! {
                    <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                        {err}
                    </Alert>
                },
                AppState::Idle => html! {}
            }}

            if let (Some(view), Some(info)) = (&view, &*page) {
                {render_view(view, info, *copied, &on_copy, &on_pin, &on_open, &on_retry)}
            }

            <div class="popup-footer">
                if show_footer {
                    <span class="keyboard-hint">
                        {if matches!(view, Some(PopupView::Backend { .. })) {
                            "Open backend URL in other environments"
                        } else {
                            "Hold \"Alt\" key to open links in the current tab"
                        }}
                    </span>
                }
                <a href="#" id="open-settings" onclick={on_open_settings}>{"Settings"}</a>
            </div>
        </div>
    }
}

fn render_view(
    view: &PopupView,
    info: &PageInfo,
    copied: bool,
    on_copy: &Callback<String>,
    on_pin: &Callback<PinKey>,
    on_open: &Callback<(String, bool)>,
    on_retry: &Callback<MouseEvent>,
) -> Html {
    match view {
        PopupView::ExtensionPage => html! {
            <p class="message">{"Extension page detected - no environments available."}</p>
        },
        PopupView::NoProject(suggestion) => {
            let query = suggestion.settings_query();
            let on_add = Callback::from(move |e: MouseEvent| {
                e.prevent_default();
                openSettings(&query);
            });
            html! {
                <div class="infobox">
                    {"No Project matches "}<strong>{&suggestion.host}</strong>
                    {". Add the domain in "}
                    <a href="#" id="open-settings-link" onclick={on_add}>{"Settings"}</a>
                    {"."}
                </div>
            }
        }
        PopupView::Backend { page_id: None, .. } => html! {
            <p class="message">{"No links available in this backend module"}</p>
        },
        PopupView::Backend { page_id: Some(uid), links, .. } => {
            let href = info.url.to_string();
            let on_copy_url = {
                let on_copy = on_copy.clone();
                let href = href.clone();
                Callback::from(move |_| on_copy.emit(href.clone()))
            };
            html! {
                <div id="details-container">
                    <h2 id="page-title">{short_title(&info.title)}</h2>
                    {uid_button(uid, copied, on_copy)}
                    <div id="backend-link" title="Copy URL to clipboard" onclick={on_copy_url}>
                        <span class="icon icon-clipboard"></span>
                        <span>{href}</span>
                    </div>
                    if !links.is_empty() {
                        <div id="environments">
                            {for links.iter().map(|link| html! {
                                <LinkAnchor
                                    link={link.clone()}
                                    on_open={on_open.clone()}
                                    class={classes!("backend-env-link")}
                                />
                            })}
                        </div>
                    }
                </div>
            }
        }
        PopupView::Frontend { backend_url, page_id, cards, .. } => {
            let backend_link = Link {
                kind: LinkKind::SamePage,
                label: backend_url.trim_start_matches("https://").trim_start_matches("http://").to_string(),
                href: backend_url.clone(),
                title: "Open TYPO3 backend".to_string(),
            };
            html! {
                <div id="details-container">
                    if let Some(uid) = page_id {
                        <h2 id="page-title">{&info.title}</h2>
                        {uid_button(uid, copied, on_copy)}
                    } else {
                        <p class="message">
                            {"No UID found - "}
                            <a href="#" onclick={on_retry.clone()}>{"retry"}</a>
                        </p>
                    }
                    <div id="additional-links">
                        <LinkAnchor link={backend_link} on_open={on_open.clone()} />
                    </div>
                    <div id="environments">
                        {for cards.iter().map(|card| html! {
                            <EnvironmentCard
                                key={card.key.to_string()}
                                card={card.clone()}
                                on_pin={on_pin.clone()}
                                on_open={on_open.clone()}
                            />
                        })}
                    </div>
                </div>
            }
        }
    }
}

fn uid_button(uid: &str, copied: bool, on_copy: &Callback<String>) -> Html {
    let onclick = {
        let on_copy = on_copy.clone();
        let uid = uid.to_string();
        Callback::from(move |_| on_copy.emit(uid.clone()))
    };
    let label = if copied {
        format!("UID {} copied!", uid)
    } else {
        format!("Page-UID {}", uid)
    };

    html! {
        <Button onclick={onclick} variant={ButtonVariant::Primary}>
            if !copied {
                <span class="icon icon-clipboard"></span>
            }
            {label}
        </Button>
    }
}

// Helper functions

async fn send(request: &Request) -> Result<JsValue, String> {
    let message = serde_wasm_bindgen::to_value(request)
        .map_err(|e| format!("Failed to serialize message: {:?}", e))?;
    sendMessage(message)
        .await
        .map_err(|e| format!("Message failed: {:?}", e))
}

async fn load_cache() -> Result<SettingsCache, String> {
    let keys = serde_wasm_bindgen::to_value(&[PINNED_KEY])
        .map_err(|e| format!("Failed to serialize keys: {:?}", e))?;
    let stored = getSyncStorage(keys)
        .await
        .map_err(|e| format!("Failed to get storage: {:?}", e))?;
    let data: SyncData = serde_wasm_bindgen::from_value(stored).unwrap_or_default();

    let reply = send(&Request::GetDomainConfig).await?;
    let reply: DomainConfigReply = serde_wasm_bindgen::from_value(reply)
        .map_err(|e| format!("Failed to parse settings: {:?}", e))?;

    Ok(SettingsCache::new(reply.settings_json, data.pins()))
}

async fn save_pin(pins: &PinTracker) -> Result<(), String> {
    let items = serde_json::json!({ PINNED_KEY: pins.pinned() });
    let items = items
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| format!("Failed to serialize pin: {:?}", e))?;
    setSyncStorage(items)
        .await
        .map_err(|e| format!("Failed to save pin: {:?}", e))
}

async fn fetch_page() -> Result<PageInfo, String> {
    let tab_js = getActiveTab()
        .await
        .map_err(|e| format!("Failed to get tab: {:?}", e))?;
    let tab: ActiveTab = serde_wasm_bindgen::from_value(tab_js)
        .map_err(|e| format!("Failed to parse tab: {:?}", e))?;
    let url = Url::parse(&tab.url).map_err(|e| format!("Invalid tab URL: {}", e))?;

    // Backend module pages carry the id in the URL; other pages need a
    // fresh DOM read in the tab
    let page_id = if url.scheme() == "chrome-extension" || crate::links::is_backend_module(&url) {
        None
    } else {
        let snapshot = match readPageSnapshot(tab.id).await {
            Ok(value) => serde_wasm_bindgen::from_value(value).unwrap_or_default(),
            Err(e) => {
                log::debug!("Page not scriptable: {:?}", e);
                PageSnapshot::default()
            }
        };
        PageIdExtractor::default().extract(&PageContext::new(&snapshot, &url))
    };

    Ok(PageInfo {
        title: tab.title,
        url,
        page_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_outlasts_tab_read() {
        let load_error = Some("Failed to load settings: offline".to_string());

        assert_eq!(
            displayed_state(load_error.as_ref(), &AppState::Idle),
            AppState::Error("Failed to load settings: offline".to_string())
        );
        assert_eq!(
            displayed_state(load_error.as_ref(), &AppState::Error("Failed to read tab: x".to_string())),
            AppState::Error("Failed to load settings: offline".to_string())
        );
    }

    #[test]
    fn test_tab_state_shown_without_load_error() {
        assert_eq!(displayed_state(None, &AppState::Idle), AppState::Idle);
        assert_eq!(displayed_state(None, &AppState::Loading), AppState::Loading);
    }
}
