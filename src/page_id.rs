/// Page identifier extraction
///
/// The identifier is looked up through an ordered chain of strategies; the
/// first one returning a non-empty value wins. Sources, in order:
/// 1. `data-uid` on `<body>`
/// 2. `data-uid` on `<head>`
/// 3. `<meta name="pageid" content="...">`
/// 4. the `id` query parameter of the layout/list/viewpage backend modules
/// 5. `id=<digits>` inside the `redirectParams` parameter of `/typo3/main`

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use url::Url;

pub const UID_ATTRIBUTE: &str = "data-uid";
pub const PAGE_ID_META: &str = "pageid";

const MODULE_PATHS: [&str; 3] = [
    "/typo3/module/web/layout",
    "/typo3/module/web/list",
    "/typo3/module/web/viewpage",
];
const MAIN_PATH: &str = "/typo3/main";

static REDIRECT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|&)id=(\d+)").expect("valid redirect id pattern"));

/// Read-only view of the DOM pieces the extractor looks at
pub trait PageDocument {
    fn body_attribute(&self, name: &str) -> Option<String>;
    fn head_attribute(&self, name: &str) -> Option<String>;
    fn meta_content(&self, name: &str) -> Option<String>;
}

impl PageDocument for web_sys::Document {
    fn body_attribute(&self, name: &str) -> Option<String> {
        self.body()?.get_attribute(name)
    }

    fn head_attribute(&self, name: &str) -> Option<String> {
        self.head()?.get_attribute(name)
    }

    fn meta_content(&self, name: &str) -> Option<String> {
        self.query_selector(&format!("meta[name={}]", name))
            .ok()
            .flatten()?
            .get_attribute("content")
    }
}

/// DOM values captured inside a tab and handed back to the popup
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    #[serde(default)]
    pub body_uid: Option<String>,
    #[serde(default)]
    pub head_uid: Option<String>,
    #[serde(default)]
    pub meta_page_id: Option<String>,
}

impl PageDocument for PageSnapshot {
    fn body_attribute(&self, name: &str) -> Option<String> {
        (name == UID_ATTRIBUTE).then(|| self.body_uid.clone()).flatten()
    }

    fn head_attribute(&self, name: &str) -> Option<String> {
        (name == UID_ATTRIBUTE).then(|| self.head_uid.clone()).flatten()
    }

    fn meta_content(&self, name: &str) -> Option<String> {
        (name == PAGE_ID_META).then(|| self.meta_page_id.clone()).flatten()
    }
}

/// Everything a strategy may look at
pub struct PageContext<'a> {
    pub document: Option<&'a dyn PageDocument>,
    pub url: &'a Url,
}

impl<'a> PageContext<'a> {
    pub fn new(document: &'a dyn PageDocument, url: &'a Url) -> Self {
        PageContext {
            document: Some(document),
            url,
        }
    }

    /// Context for a URL alone, without DOM access
    pub fn from_url(url: &'a Url) -> Self {
        PageContext { document: None, url }
    }

    fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

pub trait PageIdStrategy {
    fn try_extract(&self, ctx: &PageContext<'_>) -> Option<String>;
}

pub struct BodyAttribute;

impl PageIdStrategy for BodyAttribute {
    fn try_extract(&self, ctx: &PageContext<'_>) -> Option<String> {
        ctx.document?.body_attribute(UID_ATTRIBUTE)
    }
}

pub struct HeadAttribute;

impl PageIdStrategy for HeadAttribute {
    fn try_extract(&self, ctx: &PageContext<'_>) -> Option<String> {
        ctx.document?.head_attribute(UID_ATTRIBUTE)
    }
}

pub struct MetaPageId;

impl PageIdStrategy for MetaPageId {
    fn try_extract(&self, ctx: &PageContext<'_>) -> Option<String> {
        ctx.document?.meta_content(PAGE_ID_META)
    }
}

/// `?id=` on the page, list and view backend modules
pub struct ModuleQueryId;

impl PageIdStrategy for ModuleQueryId {
    fn try_extract(&self, ctx: &PageContext<'_>) -> Option<String> {
        let path = ctx.url.path();
        if MODULE_PATHS.iter().any(|module| path.contains(module)) {
            ctx.query_param("id")
        } else {
            None
        }
    }
}

/// `/typo3/main?redirect=web_layout&redirectParams=id%3D19833`
pub struct MainRedirectParams;

impl PageIdStrategy for MainRedirectParams {
    fn try_extract(&self, ctx: &PageContext<'_>) -> Option<String> {
        if !ctx.url.path().contains(MAIN_PATH) {
            return None;
        }
        let params = ctx.query_param("redirectParams")?;
        REDIRECT_ID
            .captures(&params)
            .map(|captures| captures[1].to_string())
    }
}

pub struct PageIdExtractor {
    strategies: Vec<Box<dyn PageIdStrategy>>,
}

impl PageIdExtractor {
    pub fn new(strategies: Vec<Box<dyn PageIdStrategy>>) -> Self {
        PageIdExtractor { strategies }
    }

    pub fn extract(&self, ctx: &PageContext<'_>) -> Option<String> {
        self.strategies
            .iter()
            .filter_map(|strategy| strategy.try_extract(ctx))
            .find(|id| !id.is_empty())
    }
}

impl Default for PageIdExtractor {
    fn default() -> Self {
        PageIdExtractor::new(vec![
            Box::new(BodyAttribute),
            Box::new(HeadAttribute),
            Box::new(MetaPageId),
            Box::new(ModuleQueryId),
            Box::new(MainRedirectParams),
        ])
    }
}
