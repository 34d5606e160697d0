/// Settings page: projects, environments, import/export and the color badge

use crate::error::SettingsError;
use crate::messages::{DomainConfigReply, Request, StatusReply};
use crate::permissions::{PermissionPlan, SyncResult, origin_patterns, origin_status};
use crate::settings::{EXPORT_FILENAME, Environment, EnvironmentField, OpenRequest, Settings};
use crate::storage::{
    SETTINGS_KEY, SHOW_COLOR_BADGE_KEY, SYNC_AREA, StorageChanges, SyncData, color_badge_change, decode_settings,
};
use crate::ui::components::OriginChip;
use crate::ui::{Debouncer, run_later};
use patternfly_yew::prelude::*;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{HtmlInputElement, HtmlSelectElement};
use yew::prelude::*;

const SAVE_DELAY_MS: u32 = 400;
const MESSAGE_TIMEOUT_MS: u32 = 3000;

// Import JS bridge functions
#[wasm_bindgen(module = "/settings.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn sendMessage(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getSyncStorage(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setSyncStorage(items: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn getGrantedOrigins() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn requestOrigins(origins: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn removeOrigins(origins: JsValue) -> Result<(), JsValue>;

    fn exportToFile(data: &str, filename: &str);

    fn onStorageChanged(callback: &Closure<dyn Fn(JsValue, String)>);

    fn closeWindow();
}

/// One user edit of the selected project
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    SelectProject(usize),
    AddProject,
    RemoveProject,
    RenameProject(String),
    AddEnvironment(Environment),
    UpdateEnvironment(usize, EnvironmentField, String),
    RemoveEnvironment(usize),
    MoveEnvironment { from: usize, to: usize },
}

/// When an applied edit gets persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Now,
    /// Typing; collapsed into one write after a pause
    Debounced,
    Skip,
}

impl Edit {
    pub fn apply(&self, settings: &mut Settings) -> Result<SaveMode, SettingsError> {
        let project = settings.selected_index();
        match self {
            Edit::SelectProject(index) => {
                settings.select_project(*index)?;
                Ok(SaveMode::Now)
            }
            Edit::AddProject => {
                let index = settings.add_project();
                settings.select_project(index)?;
                Ok(SaveMode::Now)
            }
            Edit::RemoveProject => {
                settings.remove_project(project)?;
                Ok(SaveMode::Now)
            }
            Edit::RenameProject(name) => {
                settings.rename_project(project, name.clone())?;
                Ok(SaveMode::Debounced)
            }
            Edit::AddEnvironment(environment) => {
                settings.add_environment(project, environment.clone())?;
                Ok(SaveMode::Now)
            }
            Edit::UpdateEnvironment(index, field, value) => {
                settings.update_environment(project, *index, *field, value.clone())?;
                Ok(SaveMode::Debounced)
            }
            Edit::RemoveEnvironment(index) => {
                settings.remove_environment(project, *index)?;
                Ok(SaveMode::Now)
            }
            Edit::MoveEnvironment { from, to } => {
                if settings.move_environment(project, *from, *to)? {
                    Ok(SaveMode::Now)
                } else {
                    Ok(SaveMode::Skip)
                }
            }
        }
    }

    /// Whether the set of configured hosts may have changed
    pub fn touches_origins(&self) -> bool {
        matches!(
            self,
            Edit::RemoveProject | Edit::AddEnvironment(_) | Edit::RemoveEnvironment(_)
        )
    }
}

/// Gap index for a row dropped onto row `target`
pub fn drop_gap(from: usize, target: usize) -> usize {
    if from < target { target + 1 } else { target }
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Projects,
    ImportExport,
    Display,
}

#[derive(Clone, Copy, PartialEq)]
enum MessageKind {
    Success,
    Error,
}

type Message = Option<(MessageKind, String)>;

fn show_message(message: &UseStateHandle<Message>, kind: MessageKind, text: impl Into<String>) {
    message.set(Some((kind, text.into())));
    let message = message.clone();
    run_later(MESSAGE_TIMEOUT_MS, move || message.set(None));
}

#[function_component(SettingsPage)]
pub fn settings_page() -> Html {
    let settings = use_state(|| None::<Settings>);
    let show_badge = use_state(|| false);
    let granted = use_state(Vec::<String>::new);
    let message = use_state(|| None::<(MessageKind, String)>);
    let section = use_state(|| Section::Projects);
    let new_env = use_state(|| Environment::new("", "", ""));
    let debouncer: Rc<RefCell<Debouncer>> = use_mut_ref(Debouncer::default);
    let drag_from: Rc<RefCell<Option<usize>>> = use_mut_ref(|| None);
    let file_input = use_node_ref();
    let name_input = use_node_ref();

    // Load settings, apply the query string, follow storage changes
    {
        let settings = settings.clone();
        let show_badge = show_badge.clone();
        let granted = granted.clone();
        let message = message.clone();
        let debouncer = debouncer.clone();
        use_effect_with((), move |_| {
            {
                let settings = settings.clone();
                let show_badge = show_badge.clone();
                spawn_local(async move {
                    let badge = load_show_badge().await.unwrap_or_else(|e| {
                        log::warn!("{}", e);
                        false
                    });
                    show_badge.set(badge);

                    match load_settings().await {
                        Ok(mut loaded) => {
                            let request = OpenRequest::parse(&location_search());
                            let (index, changed) = loaded.apply_open_request(&request);
                            log::debug!("Showing project {}", index);
                            // Permissions for the new host wait for a user gesture
                            if changed {
                                save_and_log(&loaded).await;
                            }
                            settings.set(Some(loaded));
                        }
                        Err(e) => show_message(&message, MessageKind::Error, e),
                    }

                    refresh_granted(&granted).await;
                });
            }

            let listener = Closure::wrap(Box::new(move |changes: JsValue, area: String| {
                let changes: StorageChanges = match serde_wasm_bindgen::from_value(changes) {
                    Ok(changes) => changes,
                    Err(_) => return,
                };
                if let Some(show) = color_badge_change(&area, &changes) {
                    show_badge.set(show);
                }
                // Our own pending save would be overwritten by its echo
                if area != SYNC_AREA || debouncer.borrow().is_pending() {
                    return;
                }
                if let Some(change) = changes.get(SETTINGS_KEY) {
                    if let Some(next) = change.new_value.clone().and_then(decode_settings) {
                        settings.set(Some(next));
                    }
                }
            }) as Box<dyn Fn(JsValue, String)>);
            onStorageChanged(&listener);
            listener.forget();
            || ()
        });
    }

    let on_edit = {
        let settings = settings.clone();
        let debouncer = debouncer.clone();
        let granted = granted.clone();
        let message = message.clone();
        let badge = *show_badge;
        Callback::from(move |edit: Edit| {
            let Some(mut next) = (*settings).clone() else {
                return;
            };
            let mode = match edit.apply(&mut next) {
                Ok(mode) => mode,
                Err(e) => {
                    show_message(&message, MessageKind::Error, e.to_string());
                    return;
                }
            };
            settings.set(Some(next.clone()));

            match mode {
                SaveMode::Skip => {}
                SaveMode::Debounced => {
                    debouncer.borrow_mut().schedule(SAVE_DELAY_MS, move || {
                        spawn_local(async move { save_and_log(&next).await });
                    });
                }
                SaveMode::Now => {
                    debouncer.borrow_mut().cancel();
                    let sync = badge && edit.touches_origins();
                    let granted = granted.clone();
                    spawn_local(async move {
                        save_and_log(&next).await;
                        if sync {
                            sync_and_refresh(&next, &granted).await;
                        }
                    });
                }
            }
        })
    };

    // Domain and tld edits change origins; sync once the field is left
    let on_origin_blur = {
        let settings = settings.clone();
        let granted = granted.clone();
        let badge = *show_badge;
        Callback::from(move |_: ()| {
            let Some(current) = (*settings).clone() else {
                return;
            };
            if !badge {
                return;
            }
            let granted = granted.clone();
            spawn_local(async move { sync_and_refresh(&current, &granted).await });
        })
    };

    let on_grant = {
        let settings = settings.clone();
        let granted = granted.clone();
        Callback::from(move |_: MouseEvent| {
            let Some(current) = (*settings).clone() else {
                return;
            };
            let granted = granted.clone();
            spawn_local(async move { sync_and_refresh(&current, &granted).await });
        })
    };

    let on_toggle_badge = {
        let settings = settings.clone();
        let show_badge = show_badge.clone();
        let granted = granted.clone();
        Callback::from(move |_: MouseEvent| {
            let current = (*settings).clone().unwrap_or_default();
            let enable = !*show_badge;
            show_badge.set(enable);

            let show_badge = show_badge.clone();
            let granted = granted.clone();
            spawn_local(async move {
                store_show_badge(enable).await;
                let result = if enable {
                    sync_permissions(&current).await
                } else {
                    revoke_all_origins().await
                };
                match result {
                    Ok(result) if enable && result.is_denied() => {
                        log::info!("Host permissions denied, turning the color badge off");
                        show_badge.set(false);
                        store_show_badge(false).await;
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("{}", e),
                }
                refresh_granted(&granted).await;
            });
        })
    };

    let on_export = {
        let settings = settings.clone();
        let message = message.clone();
        Callback::from(move |_: MouseEvent| {
            let Some(current) = &*settings else {
                show_message(&message, MessageKind::Error, "No settings to export");
                return;
            };
            match current.to_export_json() {
                Ok(json) => {
                    exportToFile(&json, EXPORT_FILENAME);
                    show_message(&message, MessageKind::Success, "Settings exported successfully!");
                }
                Err(e) => show_message(&message, MessageKind::Error, format!("Export failed: {}", e)),
            }
        })
    };

    let on_import_click = {
        let file_input = file_input.clone();
        Callback::from(move |_: MouseEvent| {
            if let Some(input) = file_input.cast::<HtmlInputElement>() {
                input.click();
            }
        })
    };

    let on_import_file = {
        let settings = settings.clone();
        let granted = granted.clone();
        let message = message.clone();
        let debouncer = debouncer.clone();
        let badge = *show_badge;
        Callback::from(move |e: Event| {
            let input: HtmlInputElement = e.target_unchecked_into();
            let Some(file) = input.files().and_then(|files| files.get(0)) else {
                return;
            };
            // Allow importing the same file again
            input.set_value("");

            let settings = settings.clone();
            let granted = granted.clone();
            let message = message.clone();
            let debouncer = debouncer.clone();
            spawn_local(async move {
                let text = match JsFuture::from(file.text()).await {
                    Ok(text) => text.as_string().unwrap_or_default(),
                    Err(e) => {
                        show_message(&message, MessageKind::Error, format!("Failed to read file: {:?}", e));
                        return;
                    }
                };

                let mut imported = (*settings).clone().unwrap_or_default();
                if let Err(e) = imported.replace_from_import(&text) {
                    log::error!("Import error: {}", e);
                    show_message(&message, MessageKind::Error, e.to_string());
                    return;
                }

                debouncer.borrow_mut().cancel();
                if let Err(e) = store_settings(&imported).await {
                    show_message(&message, MessageKind::Error, e);
                    return;
                }
                if badge {
                    sync_and_refresh(&imported, &granted).await;
                }
                settings.set(Some(imported));
                show_message(&message, MessageKind::Success, "Settings imported successfully!");
            });
        })
    };

    let on_close = Callback::from(|_: MouseEvent| closeWindow());

    let nav_link = |target: Section, label: &'static str| {
        let section = section.clone();
        let active = *section == target;
        let onclick = Callback::from(move |e: MouseEvent| {
            e.prevent_default();
            section.set(target);
        });
        html! {
            <a href="#" class={classes!("nav-link", active.then_some("active"))} {onclick}>{label}</a>
        }
    };

    html! {
        <div class="settings">
            <nav class="settings-nav">
                {nav_link(Section::Projects, "Projects")}
                {nav_link(Section::ImportExport, "Import / Export")}
                {nav_link(Section::Display, "Display")}
                <Button onclick={on_close} variant={ButtonVariant::Secondary}>
                    {"Close"}
                </Button>
            </nav>

            if let Some((kind, text)) = &*message {
                <Alert
                    r#type={if *kind == MessageKind::Success { AlertType::Success } else { AlertType::Danger }}
                    title={text.clone()}
                    inline={true}
                />
            }

            {match *section {
                Section::Projects => match &*settings {
                    Some(current) => html! {
                        <ProjectsSection
                            settings={current.clone()}
                            new_env={(*new_env).clone()}
                            on_new_env={{
                                let new_env = new_env.clone();
                                Callback::from(move |env: Environment| new_env.set(env))
                            }}
                            on_edit={on_edit.clone()}
                            on_origin_blur={on_origin_blur.clone()}
                            drag_from={drag_from.clone()}
                            name_input={name_input.clone()}
                        />
                    },
                    None => html! { <Spinner /> },
                },
                Section::ImportExport => html! {
                    <section class="content-section">
                        <Button onclick={on_export} variant={ButtonVariant::Primary}>
                            {"Export Settings"}
                        </Button>
                        <Button onclick={on_import_click} variant={ButtonVariant::Secondary}>
                            {"Import Settings"}
                        </Button>
                        <input
                            type="file"
                            accept=".json,application/json"
                            class="hidden"
                            ref={file_input}
                            onchange={on_import_file}
                        />
                    </section>
                },
                Section::Display => {
                    let needed = (*settings).as_ref().map(origin_patterns).unwrap_or_default();
                    let status = origin_status(&needed, &granted);
                    let pending = status.iter().any(|s| !s.granted);
                    html! {
                        <section class="content-section">
                            <label class="toggle" onclick={on_toggle_badge}>
                                <span class={classes!("toggle-switch", (*show_badge).then_some("on"))}></span>
                                {"Show color badge on pages"}
                            </label>
                            if *show_badge && !status.is_empty() {
                                <div id="permissions-status">
                                    <div>{"Granted host permissions for inserting color badges into pages of:"}</div>
                                    {for status.iter().map(|s| html! {
                                        <OriginChip host={s.host.clone()} granted={s.granted} />
                                    })}
                                    if pending {
                                        <Button onclick={on_grant} variant={ButtonVariant::Primary}>
                                            {"Grant Permissions"}
                                        </Button>
                                    }
                                </div>
                            }
                        </section>
                    }
                }
            }}
        </div>
    }
}

#[derive(Properties, PartialEq)]
struct ProjectsSectionProps {
    settings: Settings,
    new_env: Environment,
    on_new_env: Callback<Environment>,
    on_edit: Callback<Edit>,
    on_origin_blur: Callback<()>,
    drag_from: Rc<RefCell<Option<usize>>>,
    name_input: NodeRef,
}

#[function_component(ProjectsSection)]
fn projects_section(props: &ProjectsSectionProps) -> Html {
    let settings = &props.settings;
    let selected = settings.selected_index();
    let Some(project) = settings.selected_project() else {
        return html! {};
    };

    let on_select = props.on_edit.reform(|e: Event| {
        let select: HtmlSelectElement = e.target_unchecked_into();
        Edit::SelectProject(select.value().parse().unwrap_or(0))
    });
    let on_add_project = props.on_edit.reform(|_: MouseEvent| Edit::AddProject);
    let on_remove_project = props.on_edit.reform(|_: MouseEvent| Edit::RemoveProject);
    let on_rename = props.on_edit.reform(|e: InputEvent| {
        let input: HtmlInputElement = e.target_unchecked_into();
        Edit::RenameProject(input.value())
    });

    let new_field = |field: EnvironmentField| {
        let new_env = props.new_env.clone();
        props.on_new_env.reform(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            let mut env = new_env.clone();
            match field {
                EnvironmentField::Name => env.name = input.value(),
                EnvironmentField::Domain => env.domain = input.value(),
                EnvironmentField::Tld => env.tld = input.value(),
                EnvironmentField::Color => env.color = input.value(),
            }
            env
        })
    };

    let add_environment = {
        let new_env = props.new_env.clone();
        let on_edit = props.on_edit.clone();
        let on_new_env = props.on_new_env.clone();
        let name_input = props.name_input.clone();
        Callback::from(move |_: ()| {
            if !new_env.is_complete() {
                return;
            }
            on_edit.emit(Edit::AddEnvironment(new_env.clone()));
            on_new_env.emit(Environment::new("", "", ""));
            if let Some(input) = name_input.cast::<HtmlInputElement>() {
                let _ = input.focus();
            }
        })
    };
    let on_add_click = add_environment.reform(|_: MouseEvent| ());
    let on_tld_key = {
        let add_environment = add_environment.clone();
        Callback::from(move |e: KeyboardEvent| {
            if e.key() == "Enter" {
                add_environment.emit(());
            }
        })
    };

    let count = project.environments.len();
    let on_drop_end = {
        let drag_from = props.drag_from.clone();
        let on_edit = props.on_edit.clone();
        Callback::from(move |e: DragEvent| {
            e.prevent_default();
            if let Some(from) = drag_from.borrow_mut().take() {
                on_edit.emit(Edit::MoveEnvironment { from, to: count });
            }
        })
    };

    html! {
        <section class="content-section">
            <div class="project-select-row">
                <select id="project-select" onchange={on_select}>
                    {for settings.projects.iter().enumerate().map(|(i, p)| html! {
                        <option value={i.to_string()} selected={i == selected}>{&p.name}</option>
                    })}
                </select>
                <Button onclick={on_add_project} variant={ButtonVariant::Secondary}>
                    {"Add Project"}
                </Button>
                <Button
                    onclick={on_remove_project}
                    variant={ButtonVariant::Danger}
                    disabled={settings.projects.len() <= 1}
                >
                    {"Remove Project"}
                </Button>
            </div>

            <label for="project-title">{"Project"}</label>
            <input id="project-title" class="project-title" type="text" value={project.name.clone()} oninput={on_rename} />

            <div class="environments-list">
                {for project.environments.iter().enumerate().map(|(index, env)| html! {
                    <EnvironmentRow
                        key={format!("{}-{}", selected, index)}
                        {index}
                        environment={env.clone()}
                        on_edit={props.on_edit.clone()}
                        on_origin_blur={props.on_origin_blur.clone()}
                        drag_from={props.drag_from.clone()}
                    />
                })}
                <div
                    class="drop-end"
                    ondragover={Callback::from(|e: DragEvent| e.prevent_default())}
                    ondrop={on_drop_end}
                ></div>
            </div>

            <div class="new-environment">
                <input
                    id="new-env-name"
                    type="text"
                    placeholder="Name"
                    ref={props.name_input.clone()}
                    value={props.new_env.name.clone()}
                    oninput={new_field(EnvironmentField::Name)}
                />
                <input
                    id="new-env-domain"
                    type="text"
                    placeholder="Domain"
                    value={props.new_env.domain.clone()}
                    oninput={new_field(EnvironmentField::Domain)}
                />
                <input
                    id="new-env-tld"
                    type="text"
                    placeholder="TLD"
                    value={props.new_env.tld.clone()}
                    oninput={new_field(EnvironmentField::Tld)}
                    onkeypress={on_tld_key}
                />
                <Button
                    onclick={on_add_click}
                    variant={ButtonVariant::Primary}
                    disabled={!props.new_env.is_complete()}
                >
                    {"Add Environment"}
                </Button>
            </div>
        </section>
    }
}

#[derive(Properties, PartialEq)]
struct EnvironmentRowProps {
    index: usize,
    environment: Environment,
    on_edit: Callback<Edit>,
    on_origin_blur: Callback<()>,
    drag_from: Rc<RefCell<Option<usize>>>,
}

#[function_component(EnvironmentRow)]
fn environment_row(props: &EnvironmentRowProps) -> Html {
    let index = props.index;
    let env = &props.environment;

    let field_input = |field: EnvironmentField| {
        props.on_edit.reform(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            Edit::UpdateEnvironment(index, field, input.value())
        })
    };
    let on_blur = props.on_origin_blur.reform(|_: FocusEvent| ());
    let on_remove = props.on_edit.reform(move |_: MouseEvent| Edit::RemoveEnvironment(index));

    let on_drag_start = {
        let drag_from = props.drag_from.clone();
        Callback::from(move |e: DragEvent| {
            *drag_from.borrow_mut() = Some(index);
            if let Some(transfer) = e.data_transfer() {
                let _ = transfer.set_data("text/plain", &index.to_string());
            }
        })
    };
    let on_drag_end = {
        let drag_from = props.drag_from.clone();
        Callback::from(move |_: DragEvent| {
            drag_from.borrow_mut().take();
        })
    };
    let on_drop = {
        let drag_from = props.drag_from.clone();
        let on_edit = props.on_edit.clone();
        Callback::from(move |e: DragEvent| {
            e.prevent_default();
            if let Some(from) = drag_from.borrow_mut().take() {
                on_edit.emit(Edit::MoveEnvironment { from, to: drop_gap(from, index) });
            }
        })
    };

    html! {
        <div
            class="environment"
            data-index={index.to_string()}
            ondragover={Callback::from(|e: DragEvent| e.prevent_default())}
            ondrop={on_drop}
        >
            <div
                class="drag-handle"
                title="Drag to reorder"
                draggable="true"
                ondragstart={on_drag_start}
                ondragend={on_drag_end}
            >
                <span class="icon icon-grip"></span>
            </div>
            <input type="color" class="color" value={env.badge_color().to_string()} oninput={field_input(EnvironmentField::Color)} />
            <input type="text" class="name" placeholder="Name" value={env.name.clone()} oninput={field_input(EnvironmentField::Name)} />
            <input
                type="text"
                class="domain"
                placeholder="Domain"
                value={env.domain.clone()}
                oninput={field_input(EnvironmentField::Domain)}
                onblur={on_blur.clone()}
            />
            <input
                type="text"
                class="tld"
                placeholder="TLD"
                value={env.tld.clone()}
                oninput={field_input(EnvironmentField::Tld)}
                onblur={on_blur}
            />
            <Button onclick={on_remove} variant={ButtonVariant::Danger}>
                {"Remove"}
            </Button>
        </div>
    }
}

// Helper functions

fn location_search() -> String {
    web_sys::window()
        .and_then(|w| w.location().search().ok())
        .unwrap_or_default()
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, String> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| format!("Failed to serialize: {:?}", e))
}

async fn send(request: &Request) -> Result<JsValue, String> {
    sendMessage(to_js(request)?)
        .await
        .map_err(|e| format!("Message failed: {:?}", e))
}

async fn load_settings() -> Result<Settings, String> {
    let reply = send(&Request::GetDomainConfig).await?;
    let reply: DomainConfigReply = serde_wasm_bindgen::from_value(reply)
        .map_err(|e| format!("Failed to parse settings: {:?}", e))?;
    Ok(reply.settings_json)
}

async fn save_settings(settings: &Settings) -> Result<(), String> {
    let reply = send(&Request::SaveDomainConfig { data: settings.clone() }).await?;
    let reply: StatusReply = serde_wasm_bindgen::from_value(reply)
        .map_err(|e| format!("Failed to parse reply: {:?}", e))?;
    reply.into_result()
}

async fn save_and_log(settings: &Settings) {
    if let Err(e) = save_settings(settings).await {
        log::error!("Failed to save settings: {}", e);
    }
}

async fn store_settings(settings: &Settings) -> Result<(), String> {
    let items = serde_json::json!({ SETTINGS_KEY: settings });
    setSyncStorage(to_js(&items)?)
        .await
        .map_err(|e| format!("Failed to save settings: {:?}", e))
}

async fn load_show_badge() -> Result<bool, String> {
    let stored = getSyncStorage(to_js(&[SHOW_COLOR_BADGE_KEY])?)
        .await
        .map_err(|e| format!("Failed to get storage: {:?}", e))?;
    let data: SyncData = serde_wasm_bindgen::from_value(stored).unwrap_or_default();
    Ok(data.show_color_badge())
}

async fn store_show_badge(show: bool) {
    let items = serde_json::json!({ SHOW_COLOR_BADGE_KEY: show });
    let result = match to_js(&items) {
        Ok(items) => setSyncStorage(items).await.map_err(|e| format!("{:?}", e)),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        log::error!("Failed to store color badge setting: {}", e);
    }
}

async fn granted_origins() -> Result<Vec<String>, String> {
    let origins = getGrantedOrigins()
        .await
        .map_err(|e| format!("Failed to read permissions: {:?}", e))?;
    serde_wasm_bindgen::from_value(origins).map_err(|e| format!("Failed to parse permissions: {:?}", e))
}

async fn refresh_granted(granted: &UseStateHandle<Vec<String>>) {
    match granted_origins().await {
        Ok(origins) => granted.set(origins),
        Err(e) => log::warn!("{}", e),
    }
}

/// Request missing host permissions and drop stale ones, then re-register
/// the content script. Must start from a user gesture.
async fn sync_permissions(settings: &Settings) -> Result<SyncResult, String> {
    let needed = origin_patterns(settings);
    let plan = PermissionPlan::new(&needed, &granted_origins().await?);
    if plan.is_empty() {
        log::debug!("Host permissions already match {} configured origins", needed.len());
        sync_content_scripts().await;
        return Ok(SyncResult::default());
    }

    let accepted = if plan.to_add.is_empty() {
        false
    } else {
        match requestOrigins(to_js(&plan.to_add)?).await {
            Ok(answer) => answer.as_bool().unwrap_or(false),
            Err(e) => {
                log::warn!("Permission request failed: {:?}", e);
                false
            }
        }
    };

    let removed = if plan.to_remove.is_empty() {
        false
    } else {
        match removeOrigins(to_js(&plan.to_remove)?).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Permission removal failed: {:?}", e);
                false
            }
        }
    };

    let result = plan.outcome(accepted, removed);
    sync_content_scripts().await;
    Ok(result)
}

async fn sync_and_refresh(settings: &Settings, granted: &UseStateHandle<Vec<String>>) {
    if let Err(e) = sync_permissions(settings).await {
        log::warn!("{}", e);
    }
    refresh_granted(granted).await;
}

async fn revoke_all_origins() -> Result<SyncResult, String> {
    let origins = granted_origins().await?;
    if !origins.is_empty() {
        removeOrigins(to_js(&origins)?)
            .await
            .map_err(|e| format!("Failed to revoke permissions: {:?}", e))?;
    }
    sync_content_scripts().await;
    Ok(SyncResult {
        removed: origins,
        ..Default::default()
    })
}

async fn sync_content_scripts() {
    if let Err(e) = send(&Request::SyncContentScripts).await {
        log::debug!("Content script sync failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Project;

    fn create_test_settings() -> Settings {
        Settings {
            selected_project_index: 1,
            projects: vec![
                Project::new("First"),
                Project {
                    name: "Second".to_string(),
                    color: None,
                    environments: vec![
                        Environment::new("A", "a", "test"),
                        Environment::new("B", "b", "test"),
                        Environment::new("C", "c", "test"),
                    ],
                },
            ],
        }
    }

    fn names(settings: &Settings) -> Vec<&str> {
        settings.projects[1].environments.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_edits_target_selected_project() {
        let mut settings = create_test_settings();

        let mode = Edit::UpdateEnvironment(0, EnvironmentField::Domain, "alpha".to_string())
            .apply(&mut settings)
            .unwrap();

        assert_eq!(mode, SaveMode::Debounced);
        assert_eq!(settings.projects[1].environments[0].domain, "alpha");
    }

    #[test]
    fn test_structural_edits_save_now() {
        let mut settings = create_test_settings();

        assert_eq!(Edit::RemoveEnvironment(1).apply(&mut settings), Ok(SaveMode::Now));
        assert_eq!(names(&settings), vec!["A", "C"]);

        let env = Environment::new("D", "d", "test");
        assert_eq!(Edit::AddEnvironment(env).apply(&mut settings), Ok(SaveMode::Now));
        assert_eq!(names(&settings), vec!["A", "C", "D"]);
    }

    #[test]
    fn test_incomplete_environment_rejected() {
        let mut settings = create_test_settings();

        let result = Edit::AddEnvironment(Environment::new("D", "", "test")).apply(&mut settings);

        assert_eq!(result, Err(SettingsError::IncompleteEnvironment));
        assert_eq!(settings, create_test_settings());
    }

    #[test]
    fn test_add_project_selects_it() {
        let mut settings = create_test_settings();

        Edit::AddProject.apply(&mut settings).unwrap();

        assert_eq!(settings.selected_project_index, 2);
        assert_eq!(settings.projects[2].name, "New Project 3");
    }

    #[test]
    fn test_remove_last_project_refused() {
        let mut settings = create_test_settings();

        assert_eq!(Edit::RemoveProject.apply(&mut settings), Ok(SaveMode::Now));
        assert_eq!(settings.projects.len(), 1);
        assert_eq!(Edit::RemoveProject.apply(&mut settings), Err(SettingsError::LastProject));
    }

    #[test]
    fn test_drop_on_rows() {
        let mut settings = create_test_settings();

        // A dropped onto C lands after C
        let to = drop_gap(0, 2);
        assert_eq!(Edit::MoveEnvironment { from: 0, to }.apply(&mut settings), Ok(SaveMode::Now));
        assert_eq!(names(&settings), vec!["B", "C", "A"]);

        // A dropped onto B lands before B
        let to = drop_gap(2, 0);
        Edit::MoveEnvironment { from: 2, to }.apply(&mut settings).unwrap();
        assert_eq!(names(&settings), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_drop_on_itself_skips_save() {
        let mut settings = create_test_settings();

        let to = drop_gap(1, 1);
        assert_eq!(Edit::MoveEnvironment { from: 1, to }.apply(&mut settings), Ok(SaveMode::Skip));
        assert_eq!(names(&settings), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_touches_origins() {
        assert!(Edit::RemoveEnvironment(0).touches_origins());
        assert!(Edit::RemoveProject.touches_origins());
        assert!(!Edit::RenameProject("x".to_string()).touches_origins());
        assert!(!Edit::UpdateEnvironment(0, EnvironmentField::Color, "#000".to_string()).touches_origins());
    }
}
