//! Access policy gate: a pure function of (principal, action).
//!
//! The administrator is the holder of `Role::Admin`, derived as the user with
//! the minimum id ever assigned (the first successfully committed
//! registration). The principal must come exclusively from the validated
//! session; nothing here reads client-supplied identifiers.

use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::storage::Store;

use super::principal::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

/// Protected mutations. Reads are unguarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreatePost,
    EditPost,
    DeletePost,
    PostComment,
}

/// Tagged guard outcome returned to handlers instead of implicit
/// call-wrapping: Unauthorized means "log in first", Forbidden is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Unauthorized,
    Forbidden,
}

/// Derive roles for a user from the repository. Everyone is `User`; the
/// minimum-id user is additionally `Admin`.
pub fn roles_for_user(store: &Store, user_id: i64) -> AppResult<Vec<Role>> {
    let mut roles = vec![Role::User];
    if store.admin_user_id()? == Some(user_id) {
        roles.push(Role::Admin);
    }
    Ok(roles)
}

pub fn check_action_allowed(principal: Option<&Principal>, action: Action) -> Access {
    let Some(p) = principal else { return Access::Unauthorized };
    match action {
        Action::PostComment => Access::Allowed,
        Action::CreatePost | Action::EditPost | Action::DeletePost => {
            if p.is_admin() {
                Access::Allowed
            } else {
                Access::Forbidden
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(user_id: i64, roles: Vec<Role>) -> Principal {
        Principal { user_id, name: format!("user-{}", user_id), roles }
    }

    #[test]
    fn anonymous_is_unauthorized_for_everything() {
        for action in [Action::CreatePost, Action::EditPost, Action::DeletePost, Action::PostComment] {
            assert_eq!(check_action_allowed(None, action), Access::Unauthorized);
        }
    }

    #[test]
    fn plain_user_may_only_comment() {
        let p = principal(2, vec![Role::User]);
        assert_eq!(check_action_allowed(Some(&p), Action::PostComment), Access::Allowed);
        assert_eq!(check_action_allowed(Some(&p), Action::CreatePost), Access::Forbidden);
        assert_eq!(check_action_allowed(Some(&p), Action::EditPost), Access::Forbidden);
        assert_eq!(check_action_allowed(Some(&p), Action::DeletePost), Access::Forbidden);
    }

    #[test]
    fn admin_is_allowed_everything() {
        let p = principal(1, vec![Role::User, Role::Admin]);
        for action in [Action::CreatePost, Action::EditPost, Action::DeletePost, Action::PostComment] {
            assert_eq!(check_action_allowed(Some(&p), action), Access::Allowed);
        }
    }

    #[test]
    fn min_id_user_gets_admin_role() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let first = store.insert_user("Ada", "ada@example.com", "phc").unwrap();
        let second = store.insert_user("Ben", "ben@example.com", "phc").unwrap();
        assert!(roles_for_user(&store, first.id).unwrap().contains(&Role::Admin));
        assert!(!roles_for_user(&store, second.id).unwrap().contains(&Role::Admin));
    }
}
