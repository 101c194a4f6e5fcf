use crate::error::{AppError, AppResult};
use crate::security;
use crate::storage::{SharedStore, User};
use crate::tprintln;

use super::authorizer::roles_for_user;
use super::principal::Principal;
use super::session::{Session, SessionManager};

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: Session,
    pub user: User,
}

pub trait AuthProvider: Send + Sync {
    /// Create an account and log it in immediately.
    fn register(&self, req: &RegisterRequest) -> AppResult<LoginResponse>;
    /// Authenticate an existing account and establish a session.
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse>;
    /// Invalidate a session token. Returns whether one existed.
    fn logout(&self, token: &str) -> bool;
    /// Resolve a session token to a principal. Degrades to anonymous for an
    /// unknown, expired, or dangling (user removed) session.
    fn current_principal(&self, token: &str) -> Option<Principal>;
}

/// Store-backed identity service: credentials verified against the users
/// table, roles derived from it per request.
pub struct LocalAuthProvider {
    pub store: SharedStore,
    pub sessions: SessionManager,
}

impl LocalAuthProvider {
    pub fn new(store: SharedStore, sessions: SessionManager) -> Self {
        Self { store, sessions }
    }
}

impl AuthProvider for LocalAuthProvider {
    fn register(&self, req: &RegisterRequest) -> AppResult<LoginResponse> {
        if req.name.trim().is_empty() || req.email.trim().is_empty() {
            return Err(AppError::validation("missing_field", "name and email are required"));
        }
        let phc = security::hash_password(&req.password)?;
        // One lock acquisition spans the uniqueness check and the insert
        let user = {
            let guard = self.store.0.lock();
            guard.insert_user(req.name.trim(), req.email.trim(), &phc)?
        };
        let session = self.sessions.issue(user.id);
        tprintln!("auth.register user_id={}", user.id);
        Ok(LoginResponse { session, user })
    }

    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        let user = {
            let guard = self.store.0.lock();
            guard.find_user_by_email(req.email.trim())?
        };
        let Some(user) = user else {
            return Err(AppError::no_such_account(
                "no_such_account",
                "the account doesn't exist, please create a new one",
            ));
        };
        if !security::verify_password(&user.password_hash, &req.password) {
            return Err(AppError::wrong_password("wrong_password", "wrong password, please try again"));
        }
        let session = self.sessions.issue(user.id);
        tprintln!("auth.login user_id={}", user.id);
        Ok(LoginResponse { session, user })
    }

    fn logout(&self, token: &str) -> bool {
        self.sessions.logout(token)
    }

    fn current_principal(&self, token: &str) -> Option<Principal> {
        let user_id = self.sessions.validate(token)?;
        let guard = self.store.0.lock();
        let user = guard.get_user(user_id).ok().flatten()?;
        let roles = roles_for_user(&guard, user_id).ok()?;
        Some(Principal { user_id: user.id, name: user.name, roles })
    }
}
