use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Verified identity produced by a successful CAS validation.
///
/// `user` is always non-empty on the success path; the attribute map also
/// carries the `user` key so attribute predicates see it alongside whatever
/// else the CAS server released.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityAttributes {
    pub user: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl IdentityAttributes {
    pub fn from_user(user: impl Into<String>) -> Self {
        Self::with_attributes(user, HashMap::new())
    }

    /// The `user` key is merged last, so it wins over a served attribute of
    /// the same name.
    pub fn with_attributes(user: impl Into<String>, mut attributes: HashMap<String, String>) -> Self {
        let user = user.into();
        attributes.insert("user".to_string(), user.clone());
        Self { user, attributes }
    }
}
