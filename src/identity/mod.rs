//! Central identity and session management for quillpress.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod authorizer;

pub use principal::Principal;
pub use session::{Session, SessionManager, SessionToken};
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse, RegisterRequest};
pub use authorizer::{check_action_allowed, roles_for_user, Access, Action, Role};
