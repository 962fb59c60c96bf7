use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::{new_id, Database, UserRow};
use crate::error::{AuthError, StoreError};
use crate::models::UserIdentity;
use crate::prefs::{PrefsStore, AUTH_TOKEN};
use crate::validation::is_valid_email;

/// Sessions idle longer than this are signed out on restore.
pub const INACTIVITY_LIMIT_MINUTES: i64 = 30;
const RESET_TOKEN_TTL_MINUTES: i64 = 60;
const MIN_PASSWORD_LEN: usize = 6;

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Hash(e.to_string())),
    }
}

fn check_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if !is_valid_email(email) {
        return Err(AuthError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

/// Account operations backed by the local users table.
pub struct AuthService<'a> {
    db: &'a Database,
}

impl<'a> AuthService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn sign_up(&self, email: &str, password: &str) -> Result<UserIdentity, AuthError> {
        let email = email.trim();
        check_credentials(email, password)?;
        if self.db.find_user_by_email(email)?.is_some() {
            return Err(AuthError::EmailAlreadyInUse);
        }
        let now = Utc::now();
        let row = UserRow {
            identity: UserIdentity {
                id: new_id(),
                email: Some(email.to_string()),
                display_name: None,
                photo_url: None,
                is_anonymous: false,
                created_at: now,
                last_login: now,
            },
            password_hash: Some(hash_password(password)?),
        };
        self.db.insert_user(&row)?;
        info!(user_id = %row.identity.id, "account created");
        Ok(row.identity)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<UserIdentity, AuthError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        let mut row = self
            .db
            .find_user_by_email(email)?
            .ok_or(AuthError::UserNotFound)?;
        let Some(hash) = row.password_hash.as_deref() else {
            return Err(AuthError::InvalidCredential);
        };
        if !verify_password(password, hash)? {
            warn!(user_id = %row.identity.id, "failed sign-in");
            return Err(AuthError::WrongPassword);
        }
        row.identity.last_login = Utc::now();
        self.db.save_user(&row)?;
        debug!(user_id = %row.identity.id, "signed in");
        Ok(row.identity)
    }

    /// Creates a fresh anonymous account.
    pub fn sign_in_guest(&self) -> Result<UserIdentity, AuthError> {
        let now = Utc::now();
        let row = UserRow {
            identity: UserIdentity {
                id: new_id(),
                email: None,
                display_name: None,
                photo_url: None,
                is_anonymous: true,
                created_at: now,
                last_login: now,
            },
            password_hash: None,
        };
        self.db.insert_user(&row)?;
        info!(user_id = %row.identity.id, "guest account created");
        Ok(row.identity)
    }

    /// Turns a guest account into a permanent one, keeping its applications.
    pub fn link_account(&self, user_id: &str, email: &str, password: &str) -> Result<UserIdentity, AuthError> {
        let email = email.trim();
        check_credentials(email, password)?;
        let mut row = self.db.get_user(user_id)?.ok_or(AuthError::UserNotFound)?;
        if !row.identity.is_anonymous {
            return Err(AuthError::NotAnonymous);
        }
        if self.db.find_user_by_email(email)?.is_some() {
            return Err(AuthError::EmailAlreadyInUse);
        }
        row.identity.email = Some(email.to_string());
        row.identity.is_anonymous = false;
        row.identity.last_login = Utc::now();
        row.password_hash = Some(hash_password(password)?);
        self.db.save_user(&row)?;
        info!(%user_id, "guest account linked");
        Ok(row.identity)
    }

    /// Issues a one-time reset token for the account behind `email`.
    pub fn request_password_reset(&self, email: &str) -> Result<String, AuthError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        let row = self
            .db
            .find_user_by_email(email)?
            .ok_or(AuthError::UserNotFound)?;
        let token = new_id();
        self.db.insert_reset_token(&token, &row.identity.id)?;
        info!(user_id = %row.identity.id, "password reset requested");
        Ok(token)
    }

    pub fn complete_password_reset(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        let (user_id, issued) = self
            .db
            .consume_reset_token(token)?
            .ok_or(AuthError::InvalidCredential)?;
        if Utc::now() - issued > Duration::minutes(RESET_TOKEN_TTL_MINUTES) {
            return Err(AuthError::InvalidCredential);
        }
        let mut row = self.db.get_user(&user_id)?.ok_or(AuthError::UserNotFound)?;
        row.password_hash = Some(hash_password(new_password)?);
        self.db.save_user(&row)?;
        info!(%user_id, "password reset completed");
        Ok(())
    }

    /// Replaces only the profile fields that are given.
    pub fn update_profile(
        &self,
        user_id: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<UserIdentity, AuthError> {
        let mut row = self.db.get_user(user_id)?.ok_or(AuthError::UserNotFound)?;
        if let Some(name) = display_name.filter(|n| !n.is_empty()) {
            row.identity.display_name = Some(name.to_string());
        }
        if let Some(photo) = photo_url.filter(|p| !p.is_empty()) {
            row.identity.photo_url = Some(photo.to_string());
        }
        self.db.save_user(&row)?;
        Ok(row.identity)
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<UserIdentity>, AuthError> {
        Ok(self.db.get_user(user_id)?.map(|row| row.identity))
    }
}

/// What survives between CLI invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionToken {
    user_id: String,
    last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type IdentityListener = Box<dyn FnMut(Option<&UserIdentity>)>;

/// Current authenticated identity plus the views listening for changes.
///
/// Created once at start-up with [`Session::restore`] and passed to whatever
/// needs the identity.
pub struct Session {
    user: Option<UserIdentity>,
    last_activity: Option<DateTime<Utc>>,
    listeners: Vec<(ListenerId, IdentityListener)>,
    next_listener: u64,
}

impl Session {
    pub fn signed_out() -> Self {
        Self {
            user: None,
            last_activity: None,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn restore(prefs: &mut PrefsStore, auth: &AuthService) -> Result<Self, AuthError> {
        Self::restore_at(prefs, auth, Utc::now())
    }

    pub fn restore_at(prefs: &mut PrefsStore, auth: &AuthService, now: DateTime<Utc>) -> Result<Self, AuthError> {
        let mut session = Self::signed_out();
        let Some(token) = prefs.get::<SessionToken>(AUTH_TOKEN) else {
            return Ok(session);
        };

        if now - token.last_activity > Duration::minutes(INACTIVITY_LIMIT_MINUTES) {
            info!(user_id = %token.user_id, "session expired after inactivity");
            prefs.remove(AUTH_TOKEN)?;
            return Ok(session);
        }

        match auth.get_user(&token.user_id)? {
            Some(user) => {
                session.user = Some(user);
                session.last_activity = Some(token.last_activity);
            }
            None => {
                warn!(user_id = %token.user_id, "stored session points at a missing account");
                prefs.remove(AUTH_TOKEN)?;
            }
        }
        Ok(session)
    }

    pub fn current(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    pub fn require(&self) -> Result<&UserIdentity, AuthError> {
        self.user.as_ref().ok_or(AuthError::NotSignedIn)
    }

    pub fn sign_in(&mut self, prefs: &mut PrefsStore, user: UserIdentity) -> Result<(), StoreError> {
        let now = Utc::now();
        prefs.set(
            AUTH_TOKEN,
            &SessionToken {
                user_id: user.id.clone(),
                last_activity: now,
            },
        )?;
        self.user = Some(user);
        self.last_activity = Some(now);
        self.notify();
        Ok(())
    }

    pub fn sign_out(&mut self, prefs: &mut PrefsStore) -> Result<(), StoreError> {
        prefs.remove(AUTH_TOKEN)?;
        let was_signed_in = self.user.take().is_some();
        self.last_activity = None;
        if was_signed_in {
            self.notify();
        }
        Ok(())
    }

    /// Replaces the identity after a profile change without a new sign-in.
    pub fn refresh_identity(&mut self, user: UserIdentity) {
        if self.user.as_ref().is_some_and(|u| u.id == user.id) {
            self.user = Some(user);
            self.notify();
        }
    }

    /// Records user activity so the inactivity timer restarts.
    pub fn touch(&mut self, prefs: &mut PrefsStore) -> Result<(), StoreError> {
        let Some(user) = &self.user else { return Ok(()) };
        let now = Utc::now();
        prefs.set(
            AUTH_TOKEN,
            &SessionToken {
                user_id: user.id.clone(),
                last_activity: now,
            },
        )?;
        self.last_activity = Some(now);
        Ok(())
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }

    /// Registers a listener; it is called right away with the current identity.
    pub fn subscribe(&mut self, mut listener: impl FnMut(Option<&UserIdentity>) + 'static) -> ListenerId {
        listener(self.user.as_ref());
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn notify(&mut self) {
        let user = self.user.as_ref();
        for (_, listener) in self.listeners.iter_mut() {
            listener(user);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    #[test]
    fn sign_up_then_sign_in() {
        let db = db();
        let auth = AuthService::new(&db);
        let created = auth.sign_up("sam@example.com", "Secret1").unwrap();
        assert!(!created.is_anonymous);

        let signed_in = auth.sign_in("SAM@example.com", "Secret1").unwrap();
        assert_eq!(signed_in.id, created.id);
        assert!(matches!(
            auth.sign_in("sam@example.com", "wrong-pass"),
            Err(AuthError::WrongPassword)
        ));
        assert!(matches!(
            auth.sign_in("nobody@example.com", "Secret1"),
            Err(AuthError::UserNotFound)
        ));
    }

    #[test]
    fn duplicate_and_weak_sign_ups_are_rejected() {
        let db = db();
        let auth = AuthService::new(&db);
        auth.sign_up("sam@example.com", "Secret1").unwrap();
        assert!(matches!(
            auth.sign_up("sam@example.com", "Another1"),
            Err(AuthError::EmailAlreadyInUse)
        ));
        assert!(matches!(
            auth.sign_up("  Sam@example.com ", "Another1"),
            Err(AuthError::EmailAlreadyInUse)
        ));
        assert!(matches!(auth.sign_up("x@example.com", "abc"), Err(AuthError::WeakPassword)));
        assert!(matches!(auth.sign_up("not-an-email", "Secret1"), Err(AuthError::InvalidEmail)));
    }

    #[test]
    fn guest_can_be_linked_once() {
        let db = db();
        let auth = AuthService::new(&db);
        let guest = auth.sign_in_guest().unwrap();
        assert!(guest.is_anonymous);
        assert!(matches!(
            auth.sign_in("guest@example.com", "Secret1"),
            Err(AuthError::UserNotFound)
        ));

        let linked = auth.link_account(&guest.id, " guest@example.com ", "Secret1").unwrap();
        assert_eq!(linked.id, guest.id);
        assert_eq!(linked.email.as_deref(), Some("guest@example.com"));
        assert!(!linked.is_anonymous);
        assert!(matches!(
            auth.link_account(&guest.id, "other@example.com", "Secret1"),
            Err(AuthError::NotAnonymous)
        ));
        assert_eq!(auth.sign_in("guest@example.com", "Secret1").unwrap().id, guest.id);
    }

    #[test]
    fn password_reset_replaces_the_hash() {
        let db = db();
        let auth = AuthService::new(&db);
        auth.sign_up("sam@example.com", "Secret1").unwrap();
        let token = auth.request_password_reset("sam@example.com").unwrap();
        auth.complete_password_reset(&token, "Newpass2").unwrap();

        assert!(matches!(
            auth.sign_in("sam@example.com", "Secret1"),
            Err(AuthError::WrongPassword)
        ));
        assert!(auth.sign_in("sam@example.com", "Newpass2").is_ok());
        assert!(matches!(
            auth.complete_password_reset(&token, "Again3x"),
            Err(AuthError::InvalidCredential)
        ));
    }

    #[test]
    fn profile_update_keeps_missing_fields() {
        let db = db();
        let auth = AuthService::new(&db);
        let user = auth.sign_up("sam@example.com", "Secret1").unwrap();
        auth.update_profile(&user.id, Some("Sam"), None).unwrap();
        let updated = auth
            .update_profile(&user.id, None, Some("https://img.test/sam.png"))
            .unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Sam"));
        assert_eq!(updated.photo_url.as_deref(), Some("https://img.test/sam.png"));
    }

    #[test]
    fn session_restores_and_notifies_listeners() {
        let db = db();
        let auth = AuthService::new(&db);
        let mut prefs = PrefsStore::in_memory();
        let user = auth.sign_in_guest().unwrap();

        let seen: Rc<RefCell<Vec<Option<String>>>> = Rc::default();
        let mut session = Session::signed_out();
        let sink = Rc::clone(&seen);
        let id = session.subscribe(move |u| sink.borrow_mut().push(u.map(|u| u.id.clone())));

        session.sign_in(&mut prefs, user.clone()).unwrap();
        let restored = Session::restore(&mut prefs, &auth).unwrap();
        assert_eq!(restored.current().map(|u| u.id.as_str()), Some(user.id.as_str()));

        session.sign_out(&mut prefs).unwrap();
        assert!(session.unsubscribe(id));
        session.sign_in(&mut prefs, user.clone()).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![None, Some(user.id.clone()), None]
        );
        assert!(Session::restore(&mut prefs, &auth).unwrap().current().is_some());
    }

    #[test]
    fn idle_session_is_signed_out_on_restore() {
        let db = db();
        let auth = AuthService::new(&db);
        let mut prefs = PrefsStore::in_memory();
        let mut session = Session::signed_out();
        session.sign_in(&mut prefs, auth.sign_in_guest().unwrap()).unwrap();

        let later = Utc::now() + Duration::minutes(INACTIVITY_LIMIT_MINUTES + 1);
        let restored = Session::restore_at(&mut prefs, &auth, later).unwrap();
        assert!(restored.current().is_none());
        assert!(matches!(restored.require(), Err(AuthError::NotSignedIn)));
        assert!(!prefs.contains(AUTH_TOKEN));
    }
}
