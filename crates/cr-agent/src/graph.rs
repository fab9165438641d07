//! Initial import graph discovery.
//!
//! Walks `document.styleSheets` depth-first and moves every same-origin file
//! into its own insertion point. Imports are registered before their
//! importer, so they land ahead of it in the document and cascade order is
//! unchanged: for `A` importing `B` importing `C` the head ends up as
//! `C, B, A` in place of the `<link>` to `A`.

use crate::dom::{CssRule, Placement, StyleDom, StyleSheet, media_text};
use crate::normalize::is_local;
use crate::registry::ImportDescriptor;
use crate::session::AgentSession;

/// Deepest `@import` chain followed.
const MAX_IMPORT_DEPTH: usize = 32;

impl<D: StyleDom> AgentSession<D> {
    /// Track every stylesheet currently in the document.
    ///
    /// Returns the newly tracked paths in registration order (innermost
    /// imports first).
    pub(crate) fn walk_document(&mut self) -> Vec<String> {
        let sheets = self.dom.style_sheets();
        let mut registered = Vec::new();

        for sheet in &sheets {
            let media = media_text(&sheet.media);
            self.walk_sheet(sheet, &media, None, None, 0, &mut registered);
        }

        registered
    }

    /// Track a sheet and its imports.
    ///
    /// Returns the sheet's canonical path when it is (or already was)
    /// tracked, so the importer can record it as a direct import.
    fn walk_sheet(
        &mut self,
        sheet: &StyleSheet<D::Node>,
        media: &str,
        parent: Option<&str>,
        anchor: Option<&D::Node>,
        depth: usize,
        registered: &mut Vec<String>,
    ) -> Option<String> {
        // Inline <style> blocks have nothing to watch.
        let href = sheet.href.as_deref()?;
        let path = self.normalizer.normalize(href, parent);

        if !is_local(&path) {
            tracing::debug!(path = %path, "External stylesheet not tracked");
            return None;
        }

        if self.registry.contains(&path) {
            if parent.is_none() {
                if self.duplicate_links.insert(path.clone()) {
                    tracing::warn!(
                        path = %path,
                        "Already watching file, the document probably links it twice"
                    );
                }
                return None;
            }
            return Some(path);
        }

        if depth > MAX_IMPORT_DEPTH {
            tracing::warn!(path = %path, depth, "Import chain too deep, not tracked");
            return None;
        }

        let anchor = sheet.owner.as_ref().or(anchor);
        let mut imports = Vec::new();
        let mut content = String::new();

        for rule in &sheet.rules {
            match rule {
                CssRule::Import {
                    media: import_media,
                    sheet: Some(child),
                    ..
                } => {
                    let child_media = media_text(import_media);
                    if let Some(child_path) = self.walk_sheet(
                        child,
                        &child_media,
                        Some(&path),
                        anchor,
                        depth + 1,
                        registered,
                    ) {
                        imports.push(ImportDescriptor::new(child_path, child_media));
                    }
                }
                CssRule::Import {
                    href, sheet: None, ..
                } => {
                    tracing::debug!(import = %href, importer = %path, "Import not loaded by the page");
                }
                CssRule::Style(text) => {
                    content.push_str(text);
                    content.push('\n');
                }
            }
        }

        let placement = match (&sheet.owner, anchor) {
            (Some(owner), _) => Placement::Replace(owner.clone()),
            (None, Some(anchor)) => Placement::Before(anchor.clone()),
            (None, None) => Placement::Append,
        };

        if !self
            .registry
            .create(&mut self.dom, &path, media, parent, &placement)
        {
            return None;
        }
        self.registry.set_content(&mut self.dom, &path, &content);
        if let Some(file) = self.registry.get_mut(&path) {
            file.imports = imports;
        }

        tracing::info!(path = %path, "Started watching");
        registered.push(path.clone());
        Some(path)
    }
}
