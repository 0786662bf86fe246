//! Deny-list HTML sanitizer.
//!
//! The document is parsed into a DOM, pruned, and serialized again. Removed:
//!
//! - `script iframe object embed video audio form meta link` with their subtrees
//! - `img` elements loading from `http://` or `https://`
//! - `on*` event handlers and `data-*` attributes
//!
//! `style` attributes that reference `url(` are emptied and remote `a[href]`
//! targets become `#`. This is a deny-list, not an allow-list: only known
//! tracking and scripting vectors are handled.

use html5ever::serialize::SerializeOpts;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::{parse_document, serialize, Attribute, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use tracing::{debug, warn};

/// Elements dropped together with everything inside them.
const REMOVED_TAGS: &[&str] = &[
    "script", "iframe", "object", "embed", "video", "audio", "form", "meta", "link",
];

const REMOTE_SCHEMES: &[&str] = &["http://", "https://"];

/// Sanitize an HTML document or fragment.
///
/// Pure and idempotent: `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(html: &str) -> String {
    let dom = parse_document(RcDom::default(), parse_opts()).one(html);
    prune(&dom.document);
    serialize_document(&dom)
}

/// Parse as a renderer without scripting would, so `<noscript>` content is
/// real markup and gets pruned like everything else.
fn parse_opts() -> ParseOpts {
    ParseOpts {
        tree_builder: TreeBuilderOpts {
            scripting_enabled: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn serialize_document(dom: &RcDom) -> String {
    let mut out = Vec::with_capacity(4096);
    let document: SerializableHandle = dom.document.clone().into();
    let opts = SerializeOpts {
        scripting_enabled: false,
        ..Default::default()
    };
    if let Err(e) = serialize(&mut out, &document, opts) {
        // Writing into a Vec cannot fail; keep whatever was produced.
        warn!(error = %e, "HTML serialization failed");
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Walk the tree iteratively and apply every rule.
fn prune(root: &Handle) {
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        node.children.borrow_mut().retain(|child| !should_remove(child));

        if let NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } = &node.data
        {
            clean_attributes(&name.local, &mut attrs.borrow_mut());
            if let Some(contents) = template_contents.borrow().as_ref() {
                stack.push(contents.clone());
            }
        }

        stack.extend(node.children.borrow().iter().cloned());
    }
}

fn should_remove(node: &Handle) -> bool {
    let NodeData::Element { name, attrs, .. } = &node.data else {
        return false;
    };
    let tag = &*name.local;

    if REMOVED_TAGS.contains(&tag) {
        debug!(tag, "Removing element");
        return true;
    }

    if tag == "img" {
        let remote = attrs
            .borrow()
            .iter()
            .any(|a| &*a.name.local == "src" && is_remote(&a.value));
        if remote {
            debug!("Removing remote image");
        }
        return remote;
    }

    false
}

fn clean_attributes(tag: &str, attrs: &mut Vec<Attribute>) {
    attrs.retain(|a| {
        let name = a.name.local.to_ascii_lowercase();
        !(name.starts_with("on") || name.starts_with("data-"))
    });

    for attr in attrs.iter_mut() {
        match &*attr.name.local {
            "style" if attr.value.to_ascii_lowercase().contains("url(") => {
                attr.value = StrTendril::new();
            }
            "href" if tag == "a" && is_remote(&attr.value) => {
                attr.value = StrTendril::from_slice("#");
            }
            _ => {}
        }
    }
}

/// `true` for `http://` and `https://` URLs, ignoring case and leading whitespace.
fn is_remote(url: &str) -> bool {
    let url = url.trim_start();
    REMOTE_SCHEMES.iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}
