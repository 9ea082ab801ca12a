// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Property paths and links.
//!
//! Paths are `/`-separated element names. `Votes`, `/Votes` and `Votes/`
//! all name the same property; the normalized form has no leading or
//! trailing separator and the root is the empty string.
//!
//! A link adds an optional server part: `server#Room/Temperature`.

use std::fmt;

/// Path separator.
pub const SEPARATOR: char = '/';

/// Separator between the server and path parts of a link.
pub const LINK_SEPARATOR: char = '#';

/// Normalizes a path by dropping empty segments.
///
/// # Examples
///
/// ```
/// use woopsa_core::path::normalize_path;
///
/// assert_eq!(normalize_path("/Room//Temperature/"), "Room/Temperature");
/// assert_eq!(normalize_path("/"), "");
/// ```
pub fn normalize_path(path: &str) -> String {
    path.split(SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins two normalized paths.
pub fn join_path(base: &str, relative: &str) -> String {
    match (base.is_empty(), relative.is_empty()) {
        (true, _) => relative.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}{}{}", base, SEPARATOR, relative),
    }
}

/// Returns the strict prefixes of a normalized path, longest first.
///
/// The root (empty prefix) is included last; the full path is not.
///
/// ```
/// use woopsa_core::path::strict_prefixes;
///
/// let prefixes: Vec<_> = strict_prefixes("a/b/c").collect();
/// assert_eq!(prefixes, vec!["a/b", "a", ""]);
/// ```
pub fn strict_prefixes(path: &str) -> impl Iterator<Item = &str> {
    let cuts: Vec<usize> = path
        .char_indices()
        .filter(|(_, c)| *c == SEPARATOR)
        .map(|(i, _)| i)
        .rev()
        .collect();
    let root = if path.is_empty() { None } else { Some("") };
    cuts.into_iter().map(move |i| &path[..i]).chain(root)
}

/// Returns the part of `path` below `prefix`, if `prefix` is an ancestor.
pub fn relative_to<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix(SEPARATOR)
    }
}

// =============================================================================
// PropertyLink
// =============================================================================

/// A property reference, optionally qualified by a server name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyLink {
    server: Option<String>,
    path: String,
}

impl PropertyLink {
    /// Parses `path` or `server#path`.
    ///
    /// # Examples
    ///
    /// ```
    /// use woopsa_core::path::PropertyLink;
    ///
    /// let link = PropertyLink::parse("plant#/Line1/Speed");
    /// assert_eq!(link.server(), Some("plant"));
    /// assert_eq!(link.path(), "Line1/Speed");
    ///
    /// let local = PropertyLink::parse("/Votes");
    /// assert!(local.is_local());
    /// ```
    pub fn parse(link: &str) -> Self {
        match link.split_once(LINK_SEPARATOR) {
            Some((server, path)) => {
                let server = server.trim();
                Self {
                    server: (!server.is_empty()).then(|| server.to_string()),
                    path: normalize_path(path),
                }
            }
            None => Self::local(link),
        }
    }

    /// Creates a link without a server part.
    pub fn local(path: &str) -> Self {
        Self {
            server: None,
            path: normalize_path(path),
        }
    }

    /// The server part, if any.
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// The normalized path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns `true` if the link has no server part.
    pub fn is_local(&self) -> bool {
        self.server.is_none()
    }

    /// Returns `true` if the link points into the named server.
    pub fn targets(&self, server_name: &str) -> bool {
        match &self.server {
            None => true,
            Some(server) => server == server_name,
        }
    }
}

impl fmt::Display for PropertyLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.server {
            Some(server) => write!(f, "{}{}/{}", server, LINK_SEPARATOR, self.path),
            None => write!(f, "/{}", self.path),
        }
    }
}
