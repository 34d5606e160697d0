//! Page identifier extraction and timers against a live browser

use env_switcher::page_id::{PageContext, PageIdExtractor};
use env_switcher::ui::Debouncer;
use gloo_timers::future::sleep;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use url::Url;
use wasm_bindgen_test::*;
use web_sys::Document;

wasm_bindgen_test_configure!(run_in_browser);

fn document() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

fn reset(document: &Document) {
    let body = document.body().unwrap();
    body.remove_attribute("data-uid").unwrap();
    document.head().unwrap().remove_attribute("data-uid").unwrap();
    if let Some(meta) = document.query_selector("meta[name=pageid]").unwrap() {
        meta.remove();
    }
}

fn extract(document: &Document, url: &str) -> Option<String> {
    let url = Url::parse(url).unwrap();
    PageIdExtractor::default().extract(&PageContext::new(document, &url))
}

#[wasm_bindgen_test]
fn body_attribute_wins() {
    let document = document();
    reset(&document);
    document.body().unwrap().set_attribute("data-uid", "12").unwrap();
    document.head().unwrap().set_attribute("data-uid", "34").unwrap();

    assert_eq!(extract(&document, "https://example.test/page"), Some("12".to_string()));
    reset(&document);
}

#[wasm_bindgen_test]
fn meta_page_id_used_without_attributes() {
    let document = document();
    reset(&document);
    let meta = document.create_element("meta").unwrap();
    meta.set_attribute("name", "pageid").unwrap();
    meta.set_attribute("content", "77").unwrap();
    document.head().unwrap().append_child(&meta).unwrap();

    assert_eq!(extract(&document, "https://example.test/page"), Some("77".to_string()));
    reset(&document);
}

#[wasm_bindgen_test]
fn falls_back_to_url() {
    let document = document();
    reset(&document);

    assert_eq!(
        extract(&document, "https://example.test/typo3/module/web/layout?id=42"),
        Some("42".to_string())
    );
    assert_eq!(extract(&document, "https://example.test/page"), None);
}

#[wasm_bindgen_test]
async fn debouncer_runs_only_the_last_call() {
    let runs = Rc::new(Cell::new(0));
    let mut debouncer = Debouncer::default();

    for _ in 0..3 {
        let runs = runs.clone();
        debouncer.schedule(10, move || runs.set(runs.get() + 1));
    }
    assert!(debouncer.is_pending());

    sleep(Duration::from_millis(50)).await;

    assert_eq!(runs.get(), 1);
    assert!(!debouncer.is_pending());
}

#[wasm_bindgen_test]
async fn cancelled_debouncer_never_runs() {
    let ran = Rc::new(Cell::new(false));
    let mut debouncer = Debouncer::default();

    let flag = ran.clone();
    debouncer.schedule(10, move || flag.set(true));
    debouncer.cancel();
    assert!(!debouncer.is_pending());

    sleep(Duration::from_millis(50)).await;

    assert!(!ran.get());
}
