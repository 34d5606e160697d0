/// Cross-environment navigation links for the popup

use crate::matcher::{EnvironmentMatch, match_url};
use crate::pin::{PinKey, PinTracker};
use crate::settings::Settings;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

pub const BACKEND_MODULE_MARKER: &str = "/typo3/module/";
pub const PAGE_MODULE_PATH: &str = "/typo3/module/web/layout";
pub const LIST_MODULE_PATH: &str = "/typo3/module/web/list";

static TITLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[·•‧⋅|–—]\s*").expect("valid title separator pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    SamePage,
    Page,
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub kind: LinkKind,
    pub label: String,
    pub href: String,
    pub title: String,
}

/// One environment column in the popup
#[derive(Debug, Clone, PartialEq)]
pub struct LinkCard {
    pub key: PinKey,
    pub name: String,
    pub is_current: bool,
    pub is_pinned: bool,
    pub links: Vec<Link>,
}

/// Replace the current host with `host` in the full URL string.
///
/// This is a literal substitution of the first occurrence, not a URL rebuild:
/// path, query and fragment are carried over verbatim.
pub fn replace_host(url: &Url, host: &str) -> String {
    match url.host_str() {
        Some(current) => url.as_str().replacen(current, host, 1),
        None => url.as_str().to_string(),
    }
}

pub fn is_backend_module(url: &Url) -> bool {
    url.path().contains(BACKEND_MODULE_MARKER)
}

fn module_link(kind: LinkKind, scheme: &str, host: &str, page_id: &str, title: String) -> Link {
    let (label, path) = match kind {
        LinkKind::List => ("List", LIST_MODULE_PATH),
        _ => ("Page", PAGE_MODULE_PATH),
    };
    Link {
        kind,
        label: label.to_string(),
        href: format!("{}://{}{}?id={}", scheme, host, path, page_id),
        title,
    }
}

fn current_card(found: &EnvironmentMatch<'_>, page_id: Option<&str>, url: &Url, pinned: Option<PinKey>) -> LinkCard {
    let host = url.host_str().unwrap_or_default();
    let scheme = url.scheme();

    let same_page_href = match page_id {
        Some(id) if is_backend_module(url) => format!("{}://{}/index.php?id={}", scheme, host, id),
        _ => url.as_str().to_string(),
    };

    let mut links = vec![Link {
        kind: LinkKind::SamePage,
        label: host.to_string(),
        href: same_page_href,
        title: "Current page".to_string(),
    }];

    if let Some(id) = page_id {
        links.push(module_link(LinkKind::Page, scheme, host, id, "Open Page module".to_string()));
        links.push(module_link(LinkKind::List, scheme, host, id, "Open List module".to_string()));
    }

    let key = found.pin_key();
    LinkCard {
        key,
        name: found.environment.name.clone(),
        is_current: true,
        is_pinned: pinned == Some(key),
        links,
    }
}

/// Build the environment cards of the matched project in render order.
///
/// Cards follow the project's environment order, except that the pinned
/// environment (current or not) is always moved last. `pinned` is the
/// resolved pin; one in another project changes nothing.
pub fn build_links(
    found: &EnvironmentMatch<'_>,
    page_id: Option<&str>,
    url: &Url,
    pinned: Option<PinKey>,
) -> Vec<LinkCard> {
    let scheme = url.scheme();

    let cards: Vec<LinkCard> = found
        .project
        .environments
        .iter()
        .enumerate()
        .map(|(index, env)| {
            if index == found.environment_index {
                return current_card(found, page_id, url, pinned);
            }

            let host = env.host();
            let mut links = vec![Link {
                kind: LinkKind::SamePage,
                label: host.clone(),
                href: replace_host(url, &host),
                title: format!("Open this page on {}", env.name),
            }];

            if let Some(id) = page_id {
                links.push(module_link(LinkKind::Page, scheme, &host, id, format!("{} Page module", env.name)));
                links.push(module_link(LinkKind::List, scheme, &host, id, format!("{} List module", env.name)));
            }

            let key = PinKey::new(found.project_index, index);
            LinkCard {
                key,
                name: env.name.clone(),
                is_current: false,
                is_pinned: pinned == Some(key),
                links,
            }
        })
        .collect();

    let (pinned, mut ordered): (Vec<LinkCard>, Vec<LinkCard>) =
        cards.into_iter().partition(|card| card.is_pinned);
    ordered.extend(pinned);
    ordered
}

/// `?id=` of a Page or List module URL; other backend modules have no
/// page to link to
pub fn backend_page_id(url: &Url) -> Option<String> {
    let path = url.path();
    if !path.contains(PAGE_MODULE_PATH) && !path.contains(LIST_MODULE_PATH) {
        return None;
    }
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}

/// Backend-module links: the current backend URL on every other environment
pub fn backend_links(found: &EnvironmentMatch<'_>, url: &Url) -> Vec<Link> {
    found
        .project
        .environments
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != found.environment_index)
        .map(|(_, env)| Link {
            kind: LinkKind::SamePage,
            label: env.name.clone(),
            href: replace_host(url, &env.host()),
            title: format!("Open on {}", env.name),
        })
        .collect()
}

/// Label guessed for an unknown host from its TLD
pub fn guess_environment_label(tld: &str) -> Option<&'static str> {
    match tld {
        "test" => Some("ddev"),
        "local" => Some("local"),
        t if t.len() == 2 && t.chars().all(|c| c.is_ascii_alphabetic()) => Some("live"),
        _ => None,
    }
}

/// Prefill for creating a project from a host no project matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProjectSuggestion {
    pub host: String,
    pub domain: String,
    pub tld: String,
    pub label: Option<&'static str>,
}

impl NewProjectSuggestion {
    pub fn from_host(host: &str) -> Self {
        let (domain, tld) = match host.rsplit_once('.') {
            Some((domain, tld)) => (domain.to_string(), tld.to_string()),
            None => (String::new(), host.to_string()),
        };
        NewProjectSuggestion {
            host: host.to_string(),
            label: guess_environment_label(&tld),
            domain,
            tld,
        }
    }

    pub fn title(&self) -> &str {
        self.label.unwrap_or("??")
    }

    /// Query string understood by the settings page
    pub fn settings_query(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("project", "new")
            .append_pair("domain", &self.domain)
            .append_pair("tld", &self.tld)
            .append_pair("title", self.title())
            .finish()
    }
}

/// Everything the popup renders for one tab
#[derive(Debug, Clone, PartialEq)]
pub enum PopupView {
    /// The tab shows one of the extension's own pages
    ExtensionPage,
    NoProject(NewProjectSuggestion),
    Backend {
        project_index: Option<usize>,
        page_id: Option<String>,
        links: Vec<Link>,
    },
    Frontend {
        project_index: usize,
        backend_url: String,
        page_id: Option<String>,
        cards: Vec<LinkCard>,
    },
}

impl PopupView {
    pub fn project_index(&self) -> usize {
        match self {
            PopupView::Backend { project_index, .. } => project_index.unwrap_or(0),
            PopupView::Frontend { project_index, .. } => *project_index,
            _ => 0,
        }
    }
}

/// Decide what the popup shows for `url`.
///
/// `page_id` is the identifier read from the tab's DOM; backend module pages
/// read theirs from the URL instead.
pub fn popup_view(url: &Url, page_id: Option<&str>, settings: &Settings, pins: &PinTracker) -> PopupView {
    if url.scheme() == "chrome-extension" {
        return PopupView::ExtensionPage;
    }

    let found = match_url(url, settings);

    if is_backend_module(url) {
        let page_id = backend_page_id(url);
        let links = match (&page_id, &found) {
            (Some(_), Some(found)) => backend_links(found, url),
            _ => Vec::new(),
        };
        return PopupView::Backend {
            project_index: found.map(|f| f.project_index),
            page_id,
            links,
        };
    }

    match found {
        None => PopupView::NoProject(NewProjectSuggestion::from_host(url.host_str().unwrap_or_default())),
        Some(found) => PopupView::Frontend {
            project_index: found.project_index,
            backend_url: format!("{}://{}/typo3", url.scheme(), url.host_str().unwrap_or_default()),
            page_id: page_id.map(String::from),
            cards: build_links(&found, page_id, url, pins.resolve(settings)),
        },
    }
}

/// Shorten a tab title such as `Page · Site · TYPO3` to its page part
pub fn short_title(title: &str) -> &str {
    let parts: Vec<&str> = TITLE_SEPARATOR.split(title).collect();
    match parts.len() {
        n if n > 2 => parts[1],
        2 => parts[0],
        _ => title,
    }
}
