//! git::url
//!
//! Clone target parsing.
//!
//! Targets are opaque to the bridge; the only structure credbridge cares
//! about is an optional username embedded in the authority
//! (`scheme://[user@]host/path`) and the default checkout directory name.

use std::fmt;

/// A parsed clone target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneUrl {
    raw: String,
    scheme: Option<String>,
    username: Option<String>,
    host: Option<String>,
    path: String,
}

impl CloneUrl {
    /// Parse a clone target.
    ///
    /// Accepts `scheme://[user[:secret]@]host[:port]/path` and plain local
    /// paths. Returns `None` for empty input or a URL without a path.
    ///
    /// # Example
    ///
    /// ```
    /// use credbridge::git::CloneUrl;
    ///
    /// let url = CloneUrl::parse("http://gituser@example.com/projectA.git").unwrap();
    /// assert_eq!(url.username(), Some("gituser"));
    /// assert_eq!(url.directory_name(), "projectA");
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let Some((scheme, rest)) = raw.split_once("://") else {
            return Some(Self {
                raw: raw.to_string(),
                scheme: None,
                username: None,
                host: None,
                path: raw.to_string(),
            });
        };

        if scheme.is_empty() {
            return None;
        }

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };

        let (username, host) = match authority.rsplit_once('@') {
            Some((userinfo, host)) => {
                let user = userinfo.split(':').next().unwrap_or_default();
                let user = (!user.is_empty()).then(|| user.to_string());
                (user, host)
            }
            None => (None, authority),
        };

        if path.trim_matches('/').is_empty() {
            return None;
        }

        Some(Self {
            raw: raw.to_string(),
            scheme: Some(scheme.to_ascii_lowercase()),
            username,
            host: (!host.is_empty()).then(|| host.to_string()),
            path: path.to_string(),
        })
    }

    /// The target exactly as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lowercased scheme, `None` for local paths.
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Username embedded in the URL.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Host (with port, if any).
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Whether the target uses an HTTP(S) transport.
    pub fn is_http(&self) -> bool {
        matches!(self.scheme(), Some("http") | Some("https"))
    }

    /// Default checkout directory: last path segment without `.git`.
    pub fn directory_name(&self) -> String {
        let trimmed = self.path.trim_end_matches('/');
        let last = trimmed
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(trimmed);
        last.strip_suffix(".git").unwrap_or(last).to_string()
    }
}

impl fmt::Display for CloneUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
