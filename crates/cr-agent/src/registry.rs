//! Tracked stylesheet registry.
//!
//! Owns the mapping from canonical path to the `<style>` insertion point
//! that holds the file's live CSS. There is exactly one insertion point per
//! path: registering a path twice is a no-op with a warning.

use std::collections::HashMap;

use crate::dom::{Placement, StyleDom};

/// One direct `@import` of a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportDescriptor {
    /// Canonical path of the imported file.
    pub path: String,
    /// Media query of the import (`all` when none).
    pub media: String,
}

impl ImportDescriptor {
    /// Create a descriptor.
    #[must_use]
    pub fn new(path: impl Into<String>, media: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            media: media.into(),
        }
    }
}

/// A stylesheet file the agent keeps in sync.
#[derive(Clone, Debug)]
pub struct TrackedFile<N> {
    /// Insertion point holding the file's CSS.
    pub node: N,
    /// Current media scope.
    pub media: String,
    /// Direct imports from the last known content, in source order.
    pub imports: Vec<ImportDescriptor>,
    /// File that imports this one. `None` for sheets linked from the document.
    pub parent: Option<String>,
}

/// Registry of tracked files and their insertion points.
#[derive(Debug)]
pub struct StyleRegistry<N> {
    files: HashMap<String, TrackedFile<N>>,
    /// Paths in registration order.
    order: Vec<String>,
}

impl<N> Default for StyleRegistry<N> {
    fn default() -> Self {
        Self {
            files: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<N: Clone + PartialEq> StyleRegistry<N> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a path is tracked.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Tracked file for a path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&TrackedFile<N>> {
        self.files.get(path)
    }

    /// Mutable tracked file for a path.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut TrackedFile<N>> {
        self.files.get_mut(path)
    }

    /// Tracked paths in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of tracked files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Register a path, creating and placing its insertion point.
    ///
    /// Returns `false` without touching the DOM when the path is already
    /// tracked or no insertion point could be created.
    pub fn create<D: StyleDom<Node = N>>(
        &mut self,
        dom: &mut D,
        path: &str,
        media: &str,
        parent: Option<&str>,
        placement: &Placement<N>,
    ) -> bool {
        if self.files.contains_key(path) {
            tracing::warn!(
                path = %path,
                "Already watching file, the document probably links it twice"
            );
            return false;
        }

        let Some(node) = dom.create_style(&format!("CR-{path}"), media) else {
            tracing::warn!(path = %path, "Could not create insertion point");
            return false;
        };
        dom.place(&node, placement);

        self.files.insert(
            path.to_owned(),
            TrackedFile {
                node,
                media: media.to_owned(),
                imports: Vec::new(),
                parent: parent.map(ToOwned::to_owned),
            },
        );
        self.order.push(path.to_owned());
        true
    }

    /// Replace the CSS text of a tracked file.
    pub fn set_content<D: StyleDom<Node = N>>(&self, dom: &mut D, path: &str, text: &str) -> bool {
        let Some(file) = self.files.get(path) else {
            return false;
        };
        dom.set_text(&file.node, text);
        true
    }

    /// Update the media scope of a tracked file if it changed.
    pub fn set_media<D: StyleDom<Node = N>>(&mut self, dom: &mut D, path: &str, media: &str) {
        let Some(file) = self.files.get_mut(path) else {
            return;
        };
        if file.media != media {
            dom.set_media(&file.node, media);
            media.clone_into(&mut file.media);
        }
    }

    /// Stop tracking a path, detaching its insertion point.
    pub fn remove<D: StyleDom<Node = N>>(
        &mut self,
        dom: &mut D,
        path: &str,
    ) -> Option<TrackedFile<N>> {
        let file = self.files.remove(path)?;
        dom.remove(&file.node);
        self.order.retain(|p| p != path);
        Some(file)
    }

    /// First tracked file, other than `except`, whose imports include `path`.
    #[must_use]
    pub fn importer_of(&self, path: &str, except: &str) -> Option<&str> {
        self.order.iter().map(String::as_str).find(|candidate| {
            *candidate != except
                && self
                    .files
                    .get(*candidate)
                    .is_some_and(|f| f.imports.iter().any(|i| i.path == path))
        })
    }

    /// First node of a file's subtree in document order.
    ///
    /// Imports are placed before their importer, so the subtree of a file
    /// starts at the head of its first owned import's subtree.
    #[must_use]
    pub fn subtree_head(&self, path: &str) -> Option<&N> {
        let mut current = path;
        let mut visited: Vec<&str> = Vec::new();

        loop {
            let file = self.files.get(current)?;
            visited.push(current);

            let first_owned = file.imports.iter().find(|import| {
                !visited.contains(&import.path.as_str())
                    && self
                        .files
                        .get(&import.path)
                        .is_some_and(|child| child.parent.as_deref() == Some(current))
            });

            match first_owned {
                Some(import) => current = &import.path,
                None => return Some(&file.node),
            }
        }
    }

    /// Every node of a file's subtree in document order: owned imports
    /// first, the file's own node last.
    #[must_use]
    pub fn subtree_nodes(&self, path: &str) -> Vec<N> {
        let mut visited = Vec::new();
        let mut nodes = Vec::new();
        self.collect_subtree(path, &mut visited, &mut nodes);
        nodes
    }

    fn collect_subtree<'a>(
        &'a self,
        path: &'a str,
        visited: &mut Vec<&'a str>,
        nodes: &mut Vec<N>,
    ) {
        if visited.contains(&path) {
            return;
        }
        visited.push(path);
        let Some(file) = self.files.get(path) else {
            return;
        };
        for import in &file.imports {
            let owned = self
                .files
                .get(&import.path)
                .is_some_and(|child| child.parent.as_deref() == Some(path));
            if owned {
                self.collect_subtree(&import.path, visited, nodes);
            }
        }
        nodes.push(file.node.clone());
    }
}
