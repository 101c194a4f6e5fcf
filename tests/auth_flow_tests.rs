//! Identity integration tests: registration, login, logout and principal
//! resolution against a fresh store.

use std::time::Duration;

use anyhow::Result;
use tempfile::tempdir;

use quillpress::error::AppError;
use quillpress::identity::{
    AuthProvider, LocalAuthProvider, LoginRequest, RegisterRequest, Role, SessionManager,
};
use quillpress::storage::SharedStore;

fn provider(store: &SharedStore) -> LocalAuthProvider {
    LocalAuthProvider::new(store.clone(), SessionManager::default())
}

fn register_req(name: &str, email: &str, password: &str) -> RegisterRequest {
    RegisterRequest { name: name.into(), email: email.into(), password: password.into() }
}

#[test]
fn register_logs_in_immediately() -> Result<()> {
    let tmp = tempdir()?;
    let store = SharedStore::new(tmp.path())?;
    let auth = provider(&store);

    let resp = auth.register(&register_req("Ada", "ada@example.com", "s3cret")).unwrap();
    assert_eq!(resp.user.id, 1);
    assert_ne!(resp.user.password_hash, "s3cret", "plaintext must never be stored");

    let principal = auth.current_principal(&resp.session.token).expect("logged in");
    assert_eq!(principal.user_id, resp.user.id);
    assert!(principal.is_admin(), "first registered user is the administrator");
    Ok(())
}

#[test]
fn duplicate_registration_fails_atomically() -> Result<()> {
    let tmp = tempdir()?;
    let store = SharedStore::new(tmp.path())?;
    let auth = provider(&store);

    auth.register(&register_req("Ada", "ada@example.com", "pw1")).unwrap();
    let err = auth.register(&register_req("Imposter", "ada@example.com", "pw2")).unwrap_err();
    assert!(matches!(err, AppError::DuplicateEmail { .. }));

    // Exactly one row persisted, and the original account still logs in
    let guard = store.0.lock();
    let user = guard.find_user_by_email("ada@example.com")?.expect("one row");
    assert_eq!(user.name, "Ada");
    drop(guard);
    auth.login(&LoginRequest { email: "ada@example.com".into(), password: "pw1".into() }).unwrap();
    Ok(())
}

#[test]
fn register_rejects_empty_fields() -> Result<()> {
    let tmp = tempdir()?;
    let store = SharedStore::new(tmp.path())?;
    let auth = provider(&store);

    let err = auth.register(&register_req("", "a@example.com", "pw")).unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
    let err = auth.register(&register_req("Ada", "", "pw")).unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
    let err = auth.register(&register_req("Ada", "a@example.com", "")).unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let guard = store.0.lock();
    assert_eq!(guard.admin_user_id()?, None, "no partial row persisted");
    Ok(())
}

#[test]
fn login_distinguishes_missing_account_from_wrong_password() -> Result<()> {
    let tmp = tempdir()?;
    let store = SharedStore::new(tmp.path())?;
    let auth = provider(&store);

    auth.register(&register_req("Ada", "ada@example.com", "right")).unwrap();

    let err = auth
        .login(&LoginRequest { email: "nobody@example.com".into(), password: "x".into() })
        .unwrap_err();
    assert!(matches!(err, AppError::NoSuchAccount { .. }));

    let err = auth
        .login(&LoginRequest { email: "ada@example.com".into(), password: "wrong".into() })
        .unwrap_err();
    assert!(matches!(err, AppError::WrongPassword { .. }));

    let resp = auth
        .login(&LoginRequest { email: "ada@example.com".into(), password: "right".into() })
        .unwrap();
    assert_eq!(resp.user.email, "ada@example.com");
    Ok(())
}

#[test]
fn logout_invalidates_the_session() -> Result<()> {
    let tmp = tempdir()?;
    let store = SharedStore::new(tmp.path())?;
    let auth = provider(&store);

    let resp = auth.register(&register_req("Ada", "ada@example.com", "pw")).unwrap();
    assert!(auth.current_principal(&resp.session.token).is_some());
    assert!(auth.logout(&resp.session.token));
    assert!(auth.current_principal(&resp.session.token).is_none());
    assert!(!auth.logout(&resp.session.token));
    Ok(())
}

#[test]
fn expired_session_resolves_to_anonymous() -> Result<()> {
    let tmp = tempdir()?;
    let store = SharedStore::new(tmp.path())?;
    let auth = LocalAuthProvider::new(store.clone(), SessionManager::with_ttl(Duration::from_secs(0)));

    let resp = auth.register(&register_req("Ada", "ada@example.com", "pw")).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    assert!(auth.current_principal(&resp.session.token).is_none());
    Ok(())
}

#[test]
fn second_user_is_not_admin() -> Result<()> {
    let tmp = tempdir()?;
    let store = SharedStore::new(tmp.path())?;
    let auth = provider(&store);

    auth.register(&register_req("Ada", "ada@example.com", "pw")).unwrap();
    let ben = auth.register(&register_req("Ben", "ben@example.com", "pw")).unwrap();
    let principal = auth.current_principal(&ben.session.token).expect("logged in");
    assert!(!principal.is_admin());
    assert_eq!(principal.roles, vec![Role::User]);
    Ok(())
}
