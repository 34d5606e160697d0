/// Reusable UI components

use crate::links::{Link, LinkCard, LinkKind};
use crate::pin::PinKey;
use yew::prelude::*;

/// Anchor that hands its target to `on_open` instead of navigating.
/// The flag tells whether Alt was held (open in the current tab).
#[derive(Properties, PartialEq)]
pub struct LinkAnchorProps {
    pub link: Link,
    pub on_open: Callback<(String, bool)>,
    #[prop_or_default]
    pub class: Classes,
}

#[function_component(LinkAnchor)]
pub fn link_anchor(props: &LinkAnchorProps) -> Html {
    let link = &props.link;

    let onclick = {
        let href = link.href.clone();
        let on_open = props.on_open.clone();
        Callback::from(move |e: MouseEvent| {
            e.prevent_default();
            on_open.emit((href.clone(), e.alt_key()));
        })
    };

    let kind_class = match link.kind {
        LinkKind::SamePage => "link-same-page",
        LinkKind::Page => "link-page-module",
        LinkKind::List => "link-list-module",
    };

    html! {
        <a
            class={classes!("link", kind_class, props.class.clone())}
            href={link.href.clone()}
            title={link.title.clone()}
            {onclick}
        >
            {&link.label}
        </a>
    }
}

#[derive(Properties, PartialEq)]
pub struct EnvironmentCardProps {
    pub card: LinkCard,
    pub on_pin: Callback<PinKey>,
    pub on_open: Callback<(String, bool)>,
}

/// One environment column; clicking the title toggles its pin
#[function_component(EnvironmentCard)]
pub fn environment_card(props: &EnvironmentCardProps) -> Html {
    let card = &props.card;

    let on_title_click = {
        let key = card.key;
        let on_pin = props.on_pin.clone();
        Callback::from(move |e: MouseEvent| {
            e.stop_propagation();
            on_pin.emit(key);
        })
    };

    let pin_hint = if card.is_pinned {
        "Unpin this environment"
    } else {
        "Pin this environment"
    };

    html! {
        <div class={classes!(
            "column",
            card.is_current.then_some("active"),
            card.is_pinned.then_some("pinned"),
        )}>
            <div class="link-title-wrapper" title={pin_hint} onclick={on_title_click}>
                <div class="link-title">{&card.name}</div>
            </div>
            if card.is_current {
                <span class="current-tooltip">{"current"}</span>
            }
            {for card.links.iter().map(|link| html! {
                <LinkAnchor link={link.clone()} on_open={props.on_open.clone()} />
            })}
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct OriginChipProps {
    pub host: String,
    pub granted: bool,
}

/// Host permission state shown on the settings page
#[function_component(OriginChip)]
pub fn origin_chip(props: &OriginChipProps) -> Html {
    html! {
        <span class={classes!("perm-host", if props.granted { "perm-granted" } else { "perm-pending" })}>
            {&props.host}
        </span>
    }
}
