use serde::{Deserialize, Serialize};

use super::authorizer::Role;

/// The authenticated identity attached to a request. Anonymity is the
/// absence of a principal; handlers thread `Option<Principal>` explicitly
/// rather than consulting ambient state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }
}
