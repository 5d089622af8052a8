use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::model::DocumentReference;

/// Name shown for renderings without a user.
pub const GUEST: &str = "XWikiGuest";

/// Permission levels, each one implying the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Right {
    View,
    Edit,
    Script,
    Admin,
    Programming,
}

impl Right {
    pub fn name(self) -> &'static str {
        match self {
            Right::View => "view",
            Right::Edit => "edit",
            Right::Script => "script",
            Right::Admin => "admin",
            Right::Programming => "programming",
        }
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Right {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Right::View, Right::Edit, Right::Script, Right::Admin, Right::Programming]
            .into_iter()
            .find(|right| right.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown right '{}'", s))
    }
}

/// Answers permission questions for the rendering core. The real policy lives
/// outside this crate.
pub trait AuthorizationManager: Send + Sync {
    /// Whether `user` (`None` for a guest) holds `right`, on `document` when
    /// given, otherwise on the whole wiki.
    fn has_access(&self, right: Right, user: Option<&str>, document: Option<&DocumentReference>)
    -> bool;
}

/// Grants everything to everyone.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AuthorizationManager for AllowAll {
    fn has_access(&self, _right: Right, _user: Option<&str>, _document: Option<&DocumentReference>) -> bool {
        true
    }
}

/// In-memory table of each user's highest right, independent of documents.
/// Unknown users and guests get `guest_right`.
#[derive(Debug, Clone)]
pub struct RightsTable {
    users: HashMap<String, Right>,
    guest_right: Right,
}

impl Default for RightsTable {
    fn default() -> Self {
        RightsTable {
            users: HashMap::new(),
            guest_right: Right::View,
        }
    }
}

impl RightsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, user: impl Into<String>, right: Right) -> Self {
        self.users.insert(user.into(), right);
        self
    }

    pub fn with_guest_right(mut self, right: Right) -> Self {
        self.guest_right = right;
        self
    }
}

impl AuthorizationManager for RightsTable {
    fn has_access(&self, right: Right, user: Option<&str>, _document: Option<&DocumentReference>) -> bool {
        let granted = user
            .and_then(|user| self.users.get(user))
            .copied()
            .unwrap_or(self.guest_right);
        granted >= right
    }
}
