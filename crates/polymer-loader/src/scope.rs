//! Name membership rules for one application, shared by its Finder and Loader

use polymer_core::QualName;
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

#[derive(Debug)]
pub struct AppScope {
    appname: String,
    appspaces: RwLock<BTreeSet<String>>,
}

impl AppScope {
    pub fn new(appname: impl Into<String>) -> Self {
        Self {
            appname: appname.into(),
            appspaces: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn appname(&self) -> &str {
        &self.appname
    }

    /// Returns false if the appspace was already known.
    pub fn add_appspace(&self, appspace: &str) -> bool {
        self.appspaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(appspace.to_string())
    }

    pub fn has_appspace(&self, appspace: &str) -> bool {
        self.appspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(appspace)
    }

    pub fn appspaces(&self) -> Vec<String> {
        self.appspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// The appname itself, or anything at or below one of its known appspaces.
    pub fn claims(&self, qualname: &QualName) -> bool {
        if qualname.as_str() == self.appname {
            return true;
        }
        qualname.appname() == self.appname
            && qualname.appspace().is_some_and(|space| self.has_appspace(space))
    }

    /// `appname` or `appname.<known appspace>`.
    pub fn is_package_root(&self, qualname: &QualName) -> bool {
        match qualname.depth() {
            1 => qualname.as_str() == self.appname,
            2 => self.claims(qualname),
            _ => false,
        }
    }
}
