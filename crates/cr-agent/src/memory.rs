//! In-memory document for tests.
//!
//! Models a document head as an ordered list of `<link>` and `<style>`
//! elements, enough to observe what the agent does to the page.

use std::collections::HashMap;

use crate::dom::{CssRule, Placement, StyleDom, StyleSheet};

/// Element handle in a [`MemoryDom`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
enum Element {
    Link { href: String },
    Style { id: String, media: String, text: String },
}

/// In-memory [`StyleDom`] implementation.
#[derive(Debug, Default)]
pub struct MemoryDom {
    next_id: usize,
    elements: HashMap<NodeId, Element>,
    head: Vec<NodeId>,
    sheets: Vec<StyleSheet<NodeId>>,
    reloads: usize,
}

impl MemoryDom {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, element: Element) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.elements.insert(id, element);
        id
    }

    /// Append a `<link rel="stylesheet">` whose loaded sheet has the given rules.
    pub fn add_link(&mut self, href: &str, media: &[&str], rules: Vec<CssRule<NodeId>>) -> NodeId {
        let node = self.alloc(Element::Link {
            href: href.to_owned(),
        });
        self.head.push(node);
        self.sheets.push(StyleSheet {
            href: Some(href.to_owned()),
            media: media.iter().map(|m| (*m).to_owned()).collect(),
            owner: Some(node),
            rules,
        });
        node
    }

    /// Append an inline `<style>` block.
    pub fn add_inline_style(&mut self, rules: Vec<CssRule<NodeId>>) -> NodeId {
        let node = self.alloc(Element::Style {
            id: String::new(),
            media: "all".to_owned(),
            text: String::new(),
        });
        self.head.push(node);
        self.sheets.push(StyleSheet {
            href: None,
            media: Vec::new(),
            owner: Some(node),
            rules,
        });
        node
    }

    /// Describe the head in document order: `link:<href>` or the style id.
    #[must_use]
    pub fn head_order(&self) -> Vec<String> {
        self.head
            .iter()
            .filter_map(|node| match self.elements.get(node)? {
                Element::Link { href } => Some(format!("link:{href}")),
                Element::Style { id, .. } => Some(id.clone()),
            })
            .collect()
    }

    /// Ids of attached managed `<style>` elements, in document order.
    #[must_use]
    pub fn style_ids(&self) -> Vec<String> {
        self.head
            .iter()
            .filter_map(|node| match self.elements.get(node)? {
                Element::Style { id, .. } if !id.is_empty() => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    fn attached_style(&self, style_id: &str) -> Option<(&str, &str)> {
        self.head
            .iter()
            .find_map(|node| match self.elements.get(node)? {
                Element::Style { id, media, text } if id == style_id => {
                    Some((media.as_str(), text.as_str()))
                }
                _ => None,
            })
    }

    /// Text of an attached `<style>` element by id.
    #[must_use]
    pub fn text_of(&self, style_id: &str) -> Option<&str> {
        self.attached_style(style_id).map(|(_, text)| text)
    }

    /// Media of an attached `<style>` element by id.
    #[must_use]
    pub fn media_of(&self, style_id: &str) -> Option<&str> {
        self.attached_style(style_id).map(|(media, _)| media)
    }

    /// Number of page reloads requested.
    #[must_use]
    pub fn reload_count(&self) -> usize {
        self.reloads
    }

    fn detach(&mut self, node: NodeId) {
        self.head.retain(|n| *n != node);
    }
}

impl StyleDom for MemoryDom {
    type Node = NodeId;

    fn style_sheets(&self) -> Vec<StyleSheet<NodeId>> {
        self.sheets
            .iter()
            .filter(|sheet| sheet.owner.is_some_and(|owner| self.head.contains(&owner)))
            .cloned()
            .collect()
    }

    fn create_style(&mut self, id: &str, media: &str) -> Option<NodeId> {
        Some(self.alloc(Element::Style {
            id: id.to_owned(),
            media: media.to_owned(),
            text: String::new(),
        }))
    }

    fn place(&mut self, node: &NodeId, placement: &Placement<NodeId>) {
        self.detach(*node);
        match placement {
            Placement::Replace(old) => {
                if let Some(idx) = self.head.iter().position(|n| n == old) {
                    self.head[idx] = *node;
                } else {
                    self.head.push(*node);
                }
            }
            Placement::Before(reference) => {
                let idx = self
                    .head
                    .iter()
                    .position(|n| n == reference)
                    .unwrap_or(self.head.len());
                self.head.insert(idx, *node);
            }
            Placement::Append => self.head.push(*node),
        }
    }

    fn set_text(&mut self, node: &NodeId, new_text: &str) {
        if let Some(Element::Style { text, .. }) = self.elements.get_mut(node) {
            new_text.clone_into(text);
        }
    }

    fn set_media(&mut self, node: &NodeId, new_media: &str) {
        if let Some(Element::Style { media, .. }) = self.elements.get_mut(node) {
            new_media.clone_into(media);
        }
    }

    fn remove(&mut self, node: &NodeId) {
        self.detach(*node);
        self.elements.remove(node);
    }

    fn reload(&mut self) {
        self.reloads += 1;
    }
}

/// Build an `@import` rule with a loaded sheet.
#[must_use]
pub fn import_rule(
    reference: &str,
    resolved: &str,
    media: &[&str],
    rules: Vec<CssRule<NodeId>>,
) -> CssRule<NodeId> {
    CssRule::Import {
        href: reference.to_owned(),
        media: media.iter().map(|m| (*m).to_owned()).collect(),
        sheet: Some(StyleSheet {
            href: Some(resolved.to_owned()),
            media: media.iter().map(|m| (*m).to_owned()).collect(),
            owner: None,
            rules,
        }),
    }
}

/// Build a plain style rule.
#[must_use]
pub fn style_rule(text: &str) -> CssRule<NodeId> {
    CssRule::Style(text.to_owned())
}
