//! [`StyleDom`] over the live browser document.

use cr_agent::{CssRule, Placement, StyleDom, StyleSheet};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    CssImportRule, CssRuleList, CssStyleSheet, Document, Element, HtmlStyleElement, MediaList,
};

/// The page the agent runs in.
#[derive(Debug)]
pub struct WebDom {
    document: Document,
}

impl WebDom {
    /// Wrap a document.
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

fn media_list(list: Option<&MediaList>) -> Vec<String> {
    list.map(|list| (0..list.length()).filter_map(|i| list.item(i)).collect())
        .unwrap_or_default()
}

fn convert_sheet(sheet: &CssStyleSheet, owner: Option<Element>) -> StyleSheet<Element> {
    let href = sheet.href().ok().flatten();
    // Inline blocks are never walked, and foreign sheets throw on rule access.
    let rules = match href {
        Some(_) => sheet
            .css_rules()
            .map(|list| convert_rules(&list))
            .unwrap_or_default(),
        None => Vec::new(),
    };

    StyleSheet {
        href,
        media: media_list(Some(&sheet.media())),
        owner,
        rules,
    }
}

fn convert_rules(list: &CssRuleList) -> Vec<CssRule<Element>> {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .map(|rule| match rule.dyn_ref::<CssImportRule>() {
            Some(import) => CssRule::Import {
                href: import.href(),
                media: media_list(import.media().as_ref()),
                sheet: import.style_sheet().map(|sheet| convert_sheet(&sheet, None)),
            },
            None => CssRule::Style(rule.css_text()),
        })
        .collect()
}

impl StyleDom for WebDom {
    type Node = Element;

    fn style_sheets(&self) -> Vec<StyleSheet<Element>> {
        let list = self.document.style_sheets();
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|sheet| {
                let owner = sheet
                    .owner_node()
                    .and_then(|node| node.dyn_into::<Element>().ok());
                let sheet = sheet.dyn_into::<CssStyleSheet>().ok()?;
                Some(convert_sheet(&sheet, owner))
            })
            .collect()
    }

    fn create_style(&mut self, id: &str, media: &str) -> Option<Element> {
        let element = self.document.create_element("style").ok()?;
        element.set_id(id);
        if let Some(style) = element.dyn_ref::<HtmlStyleElement>() {
            style.set_media(media);
        }
        Some(element)
    }

    fn place(&mut self, node: &Element, placement: &Placement<Element>) {
        let placed = match placement {
            Placement::Replace(old) => old.replace_with_with_node_1(node),
            Placement::Before(reference) => reference.before_with_node_1(node),
            Placement::Append => match self.document.head() {
                Some(head) => head.append_child(node).map(drop),
                None => Err(JsValue::from_str("document has no head")),
            },
        };
        if let Err(e) = placed {
            tracing::warn!(id = %node.id(), error = ?e, "Could not place style element");
        }
    }

    fn set_text(&mut self, node: &Element, text: &str) {
        node.set_text_content(Some(text));
    }

    fn set_media(&mut self, node: &Element, media: &str) {
        if let Some(style) = node.dyn_ref::<HtmlStyleElement>() {
            style.set_media(media);
        }
    }

    fn remove(&mut self, node: &Element) {
        node.remove();
    }

    fn reload(&mut self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        if let Err(e) = window.location().reload() {
            tracing::warn!(error = ?e, "Page reload failed");
        }
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

    wasm_bindgen_test_configure!(run_in_browser);

    fn document() -> Document {
        web_sys::window().unwrap().document().unwrap()
    }

    #[wasm_bindgen_test]
    fn test_style_element_lifecycle() {
        let mut dom = WebDom::new(document());
        let node = dom.create_style("CR-/lifecycle.css", "print").unwrap();
        dom.place(&node, &Placement::Append);
        dom.set_text(&node, "body { color: red; }");

        let found = document().get_element_by_id("CR-/lifecycle.css").unwrap();
        assert_eq!(found.text_content().as_deref(), Some("body { color: red; }"));
        assert_eq!(found.get_attribute("media").as_deref(), Some("print"));

        dom.set_media(&node, "screen");
        assert_eq!(found.get_attribute("media").as_deref(), Some("screen"));

        dom.remove(&node);
        assert!(document().get_element_by_id("CR-/lifecycle.css").is_none());
    }

    #[wasm_bindgen_test]
    fn test_place_before_moves_attached_element() {
        let mut dom = WebDom::new(document());
        let first = dom.create_style("CR-/first.css", "all").unwrap();
        let second = dom.create_style("CR-/second.css", "all").unwrap();
        dom.place(&first, &Placement::Append);
        dom.place(&second, &Placement::Append);

        dom.place(&second, &Placement::Before(first.clone()));

        assert_eq!(
            second.next_element_sibling().map(|e| e.id()).as_deref(),
            Some("CR-/first.css")
        );
        dom.remove(&first);
        dom.remove(&second);
    }

    #[wasm_bindgen_test]
    fn test_inline_sheet_has_no_href() {
        let mut dom = WebDom::new(document());
        let node = dom.create_style("CR-/inline.css", "all").unwrap();
        dom.set_text(&node, "p { margin: 0; }");
        dom.place(&node, &Placement::Append);

        let sheet = dom
            .style_sheets()
            .into_iter()
            .find(|sheet| sheet.owner.as_ref() == Some(&node))
            .unwrap();
        assert_eq!(sheet.href, None);
        assert!(sheet.rules.is_empty());
        dom.remove(&node);
    }
}
