//! Content reconciliation.
//!
//! When a tracked file's content is pushed, the raw CSS is cleaned and
//! compared against what the agent already knows:
//!
//! 1. Comments are removed first, so nothing inside them is acted upon.
//! 2. `@import` statements are collected as [`ImportDescriptor`]s and removed.
//! 3. Remaining `url(...)` references are rewritten to absolute paths.
//! 4. The new import list is diffed against the previous one by path.
//! 5. The new import list is stored, so the cascade below sees it.
//! 6. Imports that disappeared are untracked (cascading to their own imports).
//! 7. Imports that appeared are tracked and placed before their importer;
//!    retained imports are moved if their order changed.
//! 8. The cleaned CSS is returned for the file's insertion point.

use std::sync::LazyLock;

use cr_protocol::ClientRequest;
use regex::{Captures, Regex};

use crate::dom::{Placement, StyleDom};
use crate::normalize::{PathNormalizer, is_local};
use crate::registry::ImportDescriptor;
use crate::session::AgentSession;

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

/// `@import "a.css" media;`, `@import 'a.css';`, `@import url(a.css) media;`
///
/// String literals are matched as a whole so an `@import` inside one is
/// never taken for a rule; see [`is_import`].
static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|"#,
        r#"@import\s*(?:url\(\s*)?(?:"([^"]*)"|'([^']*)'|([^\s"';)]+))\s*\)?\s*([^;]*);"#,
    ))
    .unwrap()
});

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^\s"')]*))\s*\)"#).unwrap()
});

/// CSS content with imports extracted.
#[derive(Debug, PartialEq, Eq)]
pub struct Extracted {
    /// Content without comments and `@import`s, with absolute `url()`s.
    pub content: String,
    /// Direct imports in source order, without duplicates.
    pub imports: Vec<ImportDescriptor>,
    /// Targets of `@import`s found inside comments.
    pub commented_imports: Vec<String>,
}

/// Import list changes between two reconciliation passes.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportDiff {
    /// Present now, absent before.
    pub added: Vec<ImportDescriptor>,
    /// Present before, absent now.
    pub removed: Vec<ImportDescriptor>,
}

impl ImportDiff {
    /// Whether the import set is unchanged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Strip comments and imports from raw CSS and absolutize its urls.
#[must_use]
pub fn extract(normalizer: &PathNormalizer, file: &str, raw: &str) -> Extracted {
    let mut commented_imports = Vec::new();
    for comment in COMMENT_RE.find_iter(raw) {
        for caps in IMPORT_RE
            .captures_iter(comment.as_str())
            .filter(is_import)
        {
            commented_imports.push(normalizer.normalize(import_target(&caps), Some(file)));
        }
    }

    let uncommented = COMMENT_RE.replace_all(raw, "");

    let mut imports: Vec<ImportDescriptor> = Vec::new();
    for caps in IMPORT_RE.captures_iter(&uncommented).filter(is_import) {
        let path = normalizer.normalize(import_target(&caps), Some(file));
        if path == file {
            tracing::info!(path = %file, "File imports itself, import ignored");
            continue;
        }
        if imports.iter().any(|i| i.path == path) {
            continue;
        }
        let media = caps.get(4).map_or("", |m| m.as_str().trim());
        let media = if media.is_empty() { "all" } else { media };
        imports.push(ImportDescriptor::new(path, media));
    }

    let without_imports = IMPORT_RE.replace_all(&uncommented, |caps: &Captures| {
        if is_import(caps) {
            String::new()
        } else {
            caps[0].to_owned()
        }
    });
    let content = URL_RE
        .replace_all(&without_imports, |caps: &Captures| {
            rewrite_url(normalizer, file, caps)
        })
        .into_owned();

    Extracted {
        content,
        imports,
        commented_imports,
    }
}

/// Diff two import lists by path.
#[must_use]
pub fn diff_imports(previous: &[ImportDescriptor], current: &[ImportDescriptor]) -> ImportDiff {
    let contains = |list: &[ImportDescriptor], path: &str| list.iter().any(|i| i.path == path);

    ImportDiff {
        added: current
            .iter()
            .filter(|i| !contains(previous, &i.path))
            .cloned()
            .collect(),
        removed: previous
            .iter()
            .filter(|i| !contains(current, &i.path))
            .cloned()
            .collect(),
    }
}

/// Whether an [`IMPORT_RE`] match is an `@import` rather than a string literal.
fn is_import(caps: &Captures) -> bool {
    caps[0].starts_with("@import")
}

fn import_target<'h>(caps: &Captures<'h>) -> &'h str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map_or("", |m| m.as_str())
}

fn rewrite_url(normalizer: &PathNormalizer, file: &str, caps: &Captures) -> String {
    let (target, quote) = if let Some(m) = caps.get(1) {
        (m.as_str(), "\"")
    } else if let Some(m) = caps.get(2) {
        (m.as_str(), "'")
    } else {
        (caps.get(3).map_or("", |m| m.as_str()), "")
    };

    let trimmed = target.trim();
    let lower = trimmed.to_ascii_lowercase();
    if trimmed.is_empty()
        || trimmed.starts_with('#')
        || lower.starts_with("data:")
        || lower.starts_with("about:")
        || lower.starts_with("blob:")
    {
        return caps[0].to_owned();
    }

    // Query and fragment matter to the referenced resource; keep them.
    let split = trimmed.find(['?', '#']).unwrap_or(trimmed.len());
    let (path, suffix) = trimmed.split_at(split);
    let absolute = normalizer.normalize(path, Some(file));

    format!("url({quote}{absolute}{suffix}{quote})")
}

impl<D: StyleDom> AgentSession<D> {
    /// Reconcile new raw content for a tracked file.
    ///
    /// Returns the cleaned CSS to inject, or `None` when the file is not
    /// tracked. Requests for added and removed imports are queued.
    pub fn reconcile(&mut self, path: &str, raw: &str) -> Option<String> {
        if !self.registry.contains(path) {
            tracing::info!(
                path = %path,
                "File is not tracked, loading CSS on-the-fly is unsupported"
            );
            return None;
        }

        let Extracted {
            content,
            imports,
            commented_imports,
        } = extract(&self.normalizer, path, raw);

        for commented in &commented_imports {
            if self.registry.contains(commented) {
                tracing::info!(
                    path = %commented,
                    importer = %path,
                    "@import inside a comment is ignored"
                );
            }
        }

        let file = self.registry.get_mut(path)?;
        let previous = std::mem::replace(&mut file.imports, imports.clone());
        let diff = diff_imports(&previous, &imports);

        for removed in &diff.removed {
            self.untrack(&removed.path, path);
        }

        self.place_imports(path, &previous, &imports);

        Some(content)
    }

    /// Track imports that are new, refresh media of retained ones, and move
    /// retained ones whose relative order changed.
    ///
    /// Walks the list backwards so each import goes before the subtree of
    /// its next sibling, which keeps the DOM in source order.
    fn place_imports(
        &mut self,
        importer: &str,
        previous: &[ImportDescriptor],
        current: &[ImportDescriptor],
    ) {
        let reordered = retained_order(previous, current) != retained_order(current, previous);

        for (idx, import) in current.iter().enumerate().rev() {
            if previous.iter().any(|p| p.path == import.path) {
                self.registry
                    .set_media(&mut self.dom, &import.path, &import.media);
                if reordered
                    && self.owns(importer, &import.path)
                    && let Some(anchor) = self.anchor_for(importer, &current[idx + 1..])
                {
                    self.move_subtree(&import.path, &anchor);
                }
                continue;
            }
            if self.registry.contains(&import.path) {
                tracing::debug!(
                    path = %import.path,
                    importer = %importer,
                    "Import already tracked through another file"
                );
                continue;
            }
            if !is_local(&import.path) {
                tracing::debug!(path = %import.path, "External import not tracked");
                continue;
            }

            let placement = self
                .anchor_for(importer, &current[idx + 1..])
                .map_or(Placement::Append, Placement::Before);

            if self.registry.create(
                &mut self.dom,
                &import.path,
                &import.media,
                Some(importer),
                &placement,
            ) {
                tracing::info!(path = %import.path, importer = %importer, "Started watching");
                self.outbox.push(ClientRequest::add_and_load(import.path.as_str()));
            }
        }
    }

    /// Node an import of `importer` goes before: the head of the first
    /// following sibling it owns, else the importer itself.
    fn anchor_for(&self, importer: &str, following: &[ImportDescriptor]) -> Option<D::Node> {
        following
            .iter()
            .filter(|next| self.owns(importer, &next.path))
            .find_map(|next| self.registry.subtree_head(&next.path))
            .or_else(|| self.registry.get(importer).map(|f| &f.node))
            .cloned()
    }

    fn owns(&self, importer: &str, path: &str) -> bool {
        self.registry
            .get(path)
            .is_some_and(|f| f.parent.as_deref() == Some(importer))
    }

    /// Move a file's whole subtree, keeping its internal order, before `anchor`.
    fn move_subtree(&mut self, path: &str, anchor: &D::Node) {
        let nodes = self.registry.subtree_nodes(path);
        if nodes.contains(anchor) {
            return;
        }
        let placement = Placement::Before(anchor.clone());
        for node in &nodes {
            self.dom.place(node, &placement);
        }
    }

    /// Stop tracking an import that `importer` no longer references.
    ///
    /// Files linked from the document and files still imported elsewhere
    /// are kept. A kept file owned by `importer` passes to its next importer
    /// and moves to that importer's position. The insertion point is removed
    /// before the unwatch is queued.
    fn untrack(&mut self, path: &str, importer: &str) {
        let Some(file) = self.registry.get(path) else {
            return;
        };
        if file.parent.is_none() {
            tracing::debug!(path = %path, "File is linked from the document, kept");
            return;
        }
        let owned = file.parent.as_deref() == Some(importer);

        if let Some(other) = self.registry.importer_of(path, importer).map(ToOwned::to_owned) {
            if owned {
                self.adopt(path, &other);
            }
            return;
        }

        let Some(removed) = self.registry.remove(&mut self.dom, path) else {
            return;
        };
        tracing::info!(path = %path, importer = %importer, "Stopped watching");
        self.outbox.push(ClientRequest::remove(path));

        for import in &removed.imports {
            self.untrack(&import.path, path);
        }
    }

    /// Hand an import over to `importer` and move it into source order there.
    fn adopt(&mut self, path: &str, importer: &str) {
        if let Some(file) = self.registry.get_mut(path) {
            file.parent = Some(importer.to_owned());
        }
        let following = self.registry.get(importer).and_then(|f| {
            let idx = f.imports.iter().position(|i| i.path == path)?;
            Some(f.imports[idx + 1..].to_vec())
        });
        let Some(following) = following else {
            return;
        };
        if let Some(anchor) = self.anchor_for(importer, &following) {
            self.move_subtree(path, &anchor);
        }
        tracing::debug!(path = %path, importer = %importer, "Import now owned by another file");
    }
}

/// Paths of `list` that also appear in `other`, in `list` order.
fn retained_order<'a>(list: &'a [ImportDescriptor], other: &[ImportDescriptor]) -> Vec<&'a str> {
    list.iter()
        .filter(|i| other.iter().any(|o| o.path == i.path))
        .map(|i| i.path.as_str())
        .collect()
}
