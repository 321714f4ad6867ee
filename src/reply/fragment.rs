//! Route parameters attached to a reply.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// Route parameters by name. A reply holds `None` until the first insertion.
pub type PathFragment = HashMap<String, RequestParam>;

/// One raw route parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RequestParam(String);

impl RequestParam {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the value, e.g. `param.parse::<u64>()`.
    pub fn parse<T: FromStr>(&self) -> Result<T, T::Err> {
        self.0.parse()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for RequestParam {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestParam {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RequestParam {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl PartialEq<str> for RequestParam {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RequestParam {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
