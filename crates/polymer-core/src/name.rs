//! Dotted qualified names: `appname`, `appname.appspace`, `appname.appspace.name`

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fully qualified module name - cheaply cloneable.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualName(Arc<str>);

impl QualName {
    pub fn new(s: impl Into<String>) -> Self {
        let s: String = s.into();
        Self(Arc::from(s))
    }

    /// `appname.appspace.name`
    pub fn join(appname: &str, appspace: &str, name: &str) -> Self {
        Self::new(format!("{appname}.{appspace}.{name}"))
    }

    /// `appname.appspace`, the package root of one appspace.
    pub fn package(appname: &str, appspace: &str) -> Self {
        Self::new(format!("{appname}.{appspace}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    pub fn appname(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    pub fn appspace(&self) -> Option<&str> {
        self.segments().nth(1)
    }

    /// Last dotted segment.
    pub fn short_name(&self) -> &str {
        match self.0.rfind('.') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    pub fn parent(&self) -> Option<QualName> {
        self.0.rfind('.').map(|idx| QualName::new(&self.0[..idx]))
    }

    /// True when `self` equals `prefix` or lies below it (`prefix.` + more).
    pub fn is_within(&self, prefix: &str) -> bool {
        match self.0.strip_prefix(prefix) {
            Some("") => true,
            Some(rest) => rest.starts_with('.'),
            None => false,
        }
    }
}

impl std::fmt::Display for QualName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for QualName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for QualName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for QualName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check a single name segment (appname, appspace or class name).
///
/// Segments are identifiers: a letter or underscore followed by letters,
/// digits or underscores. Dots are what separate segments, so they are never
/// allowed inside one.
pub fn validate_segment(kind: &str, segment: &str) -> Result<()> {
    let mut chars = segment.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(format!("{kind} '{segment}' is not an identifier")))
    }
}
