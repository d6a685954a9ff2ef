//! Property keys.

use std::borrow::Borrow;
use std::fmt;
use std::rc::Rc;

/// Identifier for one observable slot in a store.
///
/// Cloning a key is a reference-count bump, so keys can be handed to the
/// dependency map and tracking frames freely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyKey(Rc<str>);

impl PropertyKey {
    /// Create a key from anything string-like.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Rc::from(name.as_ref()))
    }

    /// The key's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        Self(Rc::from(name))
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        Self(Rc::from(name))
    }
}

impl From<&PropertyKey> for PropertyKey {
    fn from(key: &PropertyKey) -> Self {
        key.clone()
    }
}

impl Borrow<str> for PropertyKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
