//! Rendering surface abstraction.
//!
//! The agent never touches a real DOM directly. Everything it needs from the
//! page goes through [`StyleDom`]: reading the document's stylesheets and
//! creating, positioning, filling, and removing `<style>` insertion points.

use std::fmt;

/// A stylesheet as exposed by the document (`document.styleSheets`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleSheet<N> {
    /// Resolved URL of the backing file. `None` for inline `<style>` blocks.
    pub href: Option<String>,
    /// Media list of the sheet.
    pub media: Vec<String>,
    /// Element that owns the sheet (the `<link>`). `None` for imported sheets.
    pub owner: Option<N>,
    /// Rules in source order.
    pub rules: Vec<CssRule<N>>,
}

/// A single rule of a stylesheet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CssRule<N> {
    /// `@import` rule.
    Import {
        /// Reference as written in the rule.
        href: String,
        /// Media list of the import.
        media: Vec<String>,
        /// Loaded sheet. `None` when the browser failed to load it.
        sheet: Option<StyleSheet<N>>,
    },
    /// Any other rule, as serialized CSS text.
    Style(String),
}

/// Where a new insertion point goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Placement<N> {
    /// Take the place of an existing element (the original `<link>`).
    Replace(N),
    /// Immediately before an existing element.
    Before(N),
    /// At the end of the document head.
    Append,
}

/// Operations the agent needs from the rendering surface.
pub trait StyleDom {
    /// Handle to a DOM element.
    type Node: Clone + PartialEq + fmt::Debug;

    /// Stylesheets attached to the document, in document order.
    fn style_sheets(&self) -> Vec<StyleSheet<Self::Node>>;

    /// Create a detached `<style>` element. `None` if the surface refuses.
    fn create_style(&mut self, id: &str, media: &str) -> Option<Self::Node>;

    /// Attach an element at the given placement.
    ///
    /// An element that is already attached is moved.
    fn place(&mut self, node: &Self::Node, placement: &Placement<Self::Node>);

    /// Replace the text content of a `<style>` element.
    fn set_text(&mut self, node: &Self::Node, text: &str);

    /// Replace the media attribute of a `<style>` element.
    fn set_media(&mut self, node: &Self::Node, media: &str);

    /// Detach an element from the document.
    fn remove(&mut self, node: &Self::Node);

    /// Reload the whole page.
    fn reload(&mut self);
}

/// Join a media list, defaulting to `all`.
pub(crate) fn media_text(media: &[String]) -> String {
    let parts: Vec<&str> = media
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect();
    if parts.is_empty() {
        "all".to_owned()
    } else {
        parts.join(",")
    }
}
