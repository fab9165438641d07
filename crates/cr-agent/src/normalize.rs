//! Stylesheet reference normalization.
//!
//! Every stylesheet is identified by its canonical path: an origin-relative
//! absolute path with `.`/`..` segments resolved and query/fragment removed.
//! Two references naming the same file always normalize to the same string.

/// Resolves stylesheet references against the document and parent sheets.
#[derive(Clone, Debug)]
pub struct PathNormalizer {
    /// Document origin without trailing slash (e.g., `http://localhost:8000`).
    origin: String,
    /// Directory of the document path, always ending with `/`.
    base_dir: String,
}

impl PathNormalizer {
    /// Create a normalizer for a document.
    ///
    /// # Arguments
    ///
    /// * `origin` - Document origin (`scheme://host[:port]`), may be empty
    /// * `document_path` - Path of the document (e.g., `/site/index.html`)
    #[must_use]
    pub fn new(origin: impl Into<String>, document_path: &str) -> Self {
        let origin = origin.into().trim_end_matches('/').to_owned();
        let base_dir = directory_of(&resolve_segments(document_path));
        Self { origin, base_dir }
    }

    /// Document origin this normalizer strips.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Normalize a reference to its canonical path.
    ///
    /// Relative references resolve against the parent's directory when a
    /// parent is given, otherwise against the document's directory.
    /// References to other origins keep their scheme and host.
    #[must_use]
    pub fn normalize(&self, reference: &str, parent: Option<&str>) -> String {
        let reference = strip_query(reference.trim());

        let reference = match self.strip_origin(reference) {
            Some(local) => local,
            None => {
                if let Some((prefix, path)) = split_foreign(reference) {
                    return format!("{prefix}{}", resolve_segments(path));
                }
                reference
            }
        };

        if reference.starts_with('/') {
            return resolve_segments(reference);
        }

        let dir = match parent {
            Some(parent) => {
                let parent = self.normalize(parent, None);
                if !is_local(&parent) {
                    // Relative to a foreign sheet: stay on its host.
                    let Some((prefix, path)) = split_foreign(&parent) else {
                        return resolve_segments(reference);
                    };
                    return format!(
                        "{prefix}{}",
                        resolve_segments(&format!("{}{reference}", directory_of(path)))
                    );
                }
                directory_of(&parent)
            }
            None => self.base_dir.clone(),
        };

        resolve_segments(&format!("{dir}{reference}"))
    }

    /// Strip the document origin, returning the origin-relative remainder.
    fn strip_origin<'a>(&self, reference: &'a str) -> Option<&'a str> {
        if self.origin.is_empty() {
            return None;
        }

        let rest = reference.strip_prefix(self.origin.as_str()).or_else(|| {
            // Protocol-relative form of the same origin: `//host/path`.
            let authority = self.origin.split_once("://").map(|(_, a)| a)?;
            reference.strip_prefix("//")?.strip_prefix(authority)
        })?;

        match rest {
            "" => Some("/"),
            _ if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }
}

/// Whether a canonical path belongs to the document origin.
#[must_use]
pub fn is_local(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//")
}

/// Remove query string and fragment.
fn strip_query(reference: &str) -> &str {
    reference
        .find(['?', '#'])
        .map_or(reference, |idx| &reference[..idx])
}

/// Split `scheme://host/path` (or `//host/path`) into prefix and path.
fn split_foreign(reference: &str) -> Option<(&str, &str)> {
    let after_scheme = if let Some(rest) = reference.strip_prefix("//") {
        rest
    } else {
        let (scheme, rest) = reference.split_once("://")?;
        if scheme.is_empty() || scheme.contains('/') {
            return None;
        }
        rest
    };

    let host_end = after_scheme.find('/').unwrap_or(after_scheme.len());
    let prefix_len = reference.len() - after_scheme.len() + host_end;
    Some(reference.split_at(prefix_len))
}

/// Resolve `.` and `..` segments into an absolute path.
///
/// `..` past the root clamps at the root. A trailing slash is preserved.
fn resolve_segments(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    let mut resolved = format!("/{}", segments.join("/"));
    if !segments.is_empty() && (path.ends_with('/') || path.ends_with("/.") || path.ends_with("/.."))
    {
        resolved.push('/');
    }
    resolved
}

/// Directory part of an absolute path, including the trailing slash.
fn directory_of(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..=idx].to_owned(),
        None => "/".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn normalizer() -> PathNormalizer {
        PathNormalizer::new("http://localhost:8000", "/site/")
    }

    #[test]
    fn test_relative_to_document() {
        assert_eq!(normalizer().normalize("a/b/../c.css", None), "/site/a/c.css");
    }

    #[test]
    fn test_document_file_path_uses_its_directory() {
        let normalizer = PathNormalizer::new("http://localhost:8000", "/site/index.html");
        assert_eq!(normalizer.normalize("main.css", None), "/site/main.css");
    }

    #[test]
    fn test_relative_to_parent() {
        let normalizer = normalizer();
        assert_eq!(
            normalizer.normalize("../base.css", Some("/css/theme/main.css")),
            "/css/base.css"
        );
        assert_eq!(
            normalizer.normalize("./fonts.css", Some("/css/main.css")),
            "/css/fonts.css"
        );
    }

    #[test]
    fn test_parent_given_as_url() {
        assert_eq!(
            normalizer().normalize("base.css", Some("http://localhost:8000/css/main.css?v=3")),
            "/css/base.css"
        );
    }

    #[test]
    fn test_absolute_reference_ignores_parent() {
        assert_eq!(
            normalizer().normalize("/css/reset.css", Some("/other/main.css")),
            "/css/reset.css"
        );
    }

    #[test]
    fn test_strips_origin() {
        let normalizer = normalizer();
        assert_eq!(
            normalizer.normalize("http://localhost:8000/css/main.css", None),
            "/css/main.css"
        );
        assert_eq!(
            normalizer.normalize("//localhost:8000/css/main.css", None),
            "/css/main.css"
        );
        assert_eq!(normalizer.normalize("http://localhost:8000", None), "/");
    }

    #[test]
    fn test_origin_prefix_of_other_host_is_not_stripped() {
        assert_eq!(
            normalizer().normalize("http://localhost:80001/a.css", None),
            "http://localhost:80001/a.css"
        );
    }

    #[test]
    fn test_strips_query_and_fragment() {
        let normalizer = normalizer();
        assert_eq!(normalizer.normalize("/css/main.css?v=123", None), "/css/main.css");
        assert_eq!(normalizer.normalize("/css/main.css#top", None), "/css/main.css");
    }

    #[test]
    fn test_foreign_origin_is_kept() {
        let normalizer = normalizer();
        let path = normalizer.normalize("https://cdn.example.com/lib/../x.css", None);
        assert_eq!(path, "https://cdn.example.com/x.css");
        assert!(!is_local(&path));
        assert_eq!(
            normalizer.normalize("y.css", Some("https://cdn.example.com/lib/x.css")),
            "https://cdn.example.com/lib/y.css"
        );
    }

    #[test]
    fn test_clamps_parent_segments_past_root() {
        assert_eq!(normalizer().normalize("../../../../x.css", None), "/x.css");
    }

    #[test]
    fn test_malformed_references_do_not_panic() {
        let normalizer = normalizer();
        assert_eq!(normalizer.normalize("", None), "/site/");
        assert_eq!(normalizer.normalize("..", None), "/");
        assert_eq!(normalizer.normalize("?", None), "/site/");
    }

    #[test]
    fn test_idempotent() {
        let normalizer = normalizer();
        let references = [
            "a/b/../c.css",
            "/css/./main.css",
            "http://localhost:8000/x/../y.css?q",
            "../../z.css",
            "https://cdn.example.com/a/./b.css",
            "dir/",
            "",
        ];

        for reference in references {
            let once = normalizer.normalize(reference, None);
            let twice = normalizer.normalize(&once, None);
            assert_eq!(once, twice, "not idempotent for {reference:?}");
        }
    }

    #[test]
    fn test_same_file_same_key() {
        let normalizer = normalizer();
        let a = normalizer.normalize("http://localhost:8000/site/css/a.css", None);
        let b = normalizer.normalize("css/a.css", None);
        let c = normalizer.normalize("../site/css/./a.css?x=1", None);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }
}
