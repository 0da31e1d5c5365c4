//! Mock login session
//!
//! Demo-only authentication against two hardcoded accounts. The logged-in
//! user and their test history live in a [`KeyValueStore`] under the `user`
//! key; a second key preselects the administrator tab on the next login.
//!
//! This is not an authorization boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};
use voxscreen_common::{PredictionResult, Result};

use crate::error::SessionError;

/// Store key holding the serialized [`User`]
pub const USER_KEY: &str = "user";
/// Store key set when the admin tab should open first
pub const ADMIN_TAB_KEY: &str = "showAdminLogin";
/// File name used by [`FileStore`] inside the state directory
pub const STATE_FILE_NAME: &str = "session.json";
/// Shown when a non-admin reaches an admin-only view
pub const ACCESS_DENIED: &str = "This section is only accessible to administrators.";

const PATIENT_EMAIL: &str = "patient@example.com";
const PATIENT_PASSWORD: &str = "password";
const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin";

/// Small string key-value persistence
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Volatile store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// Store persisted as one JSON object on disk, written through on change
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`
    ///
    /// An unreadable document is logged and replaced by an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Ignoring corrupt session file {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!("Session store: {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    /// Store at `<dir>/session.json`
    pub fn in_dir(dir: &Path) -> Result<Self> {
        Self::open(&dir.join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        self.flush(&entries)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Admin,
}

/// One saved analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    pub result: PredictionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub test_history: Vec<HistoryEntry>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Tab the login view opens on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginTab {
    Login,
    Register,
    Admin,
}

/// Sign-up form contents
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// The current user, backed by a store
pub struct AppSession {
    store: Box<dyn KeyValueStore>,
    user: Option<User>,
}

impl AppSession {
    /// Read the stored user once; a corrupt record is discarded
    pub fn restore(store: Box<dyn KeyValueStore>) -> std::result::Result<Self, SessionError> {
        let user = match store.get(USER_KEY)? {
            Some(raw) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => {
                    debug!(user = %user.id, "Restored session");
                    Some(user)
                }
                Err(e) => {
                    warn!("Discarding unreadable stored user: {}", e);
                    store.remove(USER_KEY)?;
                    None
                }
            },
            None => None,
        };

        Ok(Self { store, user })
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }

    /// Patient login
    pub fn login(&mut self, email: &str, password: &str) -> std::result::Result<&User, SessionError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(SessionError::InvalidCredentials);
        }
        if email != PATIENT_EMAIL || password != PATIENT_PASSWORD {
            info!("Rejected patient login");
            return Err(SessionError::InvalidCredentials);
        }

        self.sign_in(User {
            id: "p1".to_string(),
            name: "Amine Zakaria".to_string(),
            email: email.to_string(),
            role: Role::Patient,
            test_history: Vec::new(),
        })
    }

    /// Administrator login
    pub fn admin_login(
        &mut self,
        email: &str,
        password: &str,
    ) -> std::result::Result<&User, SessionError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(SessionError::InvalidAdminCredentials);
        }
        if email != ADMIN_EMAIL || password != ADMIN_PASSWORD {
            info!("Rejected administrator login");
            return Err(SessionError::InvalidAdminCredentials);
        }

        self.sign_in(User {
            id: "admin1".to_string(),
            name: "Amine Jamal".to_string(),
            email: email.to_string(),
            role: Role::Admin,
            test_history: Vec::new(),
        })
    }

    /// Check a sign-up form; returns the email to prefill on the login tab
    ///
    /// Does not create an account or log in.
    pub fn register(&self, form: &Registration) -> std::result::Result<String, SessionError> {
        let fields = [&form.name, &form.email, &form.password, &form.confirm_password];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(SessionError::IncompleteForm);
        }
        if form.password != form.confirm_password {
            return Err(SessionError::PasswordMismatch);
        }
        info!("Registration accepted, switching to login");
        Ok(form.email.clone())
    }

    /// Forget the user and their history
    pub fn logout(&mut self) -> std::result::Result<(), SessionError> {
        if let Some(user) = self.user.take() {
            info!(user = %user.id, "Logged out");
        }
        self.store.remove(USER_KEY)?;
        Ok(())
    }

    /// Append a result to the logged-in user's history; no-op when anonymous
    pub fn record_result(
        &mut self,
        result: &PredictionResult,
    ) -> std::result::Result<Option<&HistoryEntry>, SessionError> {
        self.record_result_at(result, Utc::now())
    }

    pub fn record_result_at(
        &mut self,
        result: &PredictionResult,
        now: DateTime<Utc>,
    ) -> std::result::Result<Option<&HistoryEntry>, SessionError> {
        let Some(user) = self.user.as_mut() else {
            return Ok(None);
        };

        let mut id = format!("test-{}", now.timestamp_millis());
        let mut suffix = 1;
        while user.test_history.iter().any(|entry| entry.id == id) {
            id = format!("test-{}-{}", now.timestamp_millis(), suffix);
            suffix += 1;
        }

        user.test_history.push(HistoryEntry {
            id,
            date: now,
            result: result.clone(),
        });
        self.store
            .set(USER_KEY, &serde_json::to_string(&*user).map_err(voxscreen_common::Error::from)?)?;

        Ok(user.test_history.last())
    }

    /// Ask the next login view to open on the administrator tab
    pub fn request_admin_login(&self) -> std::result::Result<(), SessionError> {
        self.store.set(ADMIN_TAB_KEY, "true")?;
        Ok(())
    }

    /// Tab to open the login view on; the admin preference is consumed
    pub fn take_preferred_tab(&self) -> std::result::Result<LoginTab, SessionError> {
        match self.store.get(ADMIN_TAB_KEY)? {
            Some(flag) if flag == "true" => {
                self.store.remove(ADMIN_TAB_KEY)?;
                Ok(LoginTab::Admin)
            }
            _ => Ok(LoginTab::Login),
        }
    }

    /// The logged-in administrator, or `AccessDenied`
    pub fn require_admin(&self) -> std::result::Result<&User, SessionError> {
        self.user
            .as_ref()
            .filter(|user| user.is_admin())
            .ok_or_else(|| SessionError::AccessDenied(ACCESS_DENIED.to_string()))
    }

    fn sign_in(&mut self, user: User) -> std::result::Result<&User, SessionError> {
        self.store.set(
            USER_KEY,
            &serde_json::to_string(&user).map_err(voxscreen_common::Error::from)?,
        )?;
        info!(user = %user.id, role = ?user.role, "Logged in");
        Ok(self.user.insert(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use voxscreen_common::{FeatureVector, Probability, Verdict};

    fn sample_result() -> PredictionResult {
        PredictionResult {
            verdict: Verdict::Positive,
            probability: Probability::Known(0.93),
            message: None,
            features: FeatureVector::default(),
        }
    }

    fn memory_session() -> AppSession {
        AppSession::restore(Box::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn test_patient_login() {
        let mut session = memory_session();
        let user = session.login("patient@example.com", "password").unwrap();
        assert_eq!(user.id, "p1");
        assert_eq!(user.name, "Amine Zakaria");
        assert_eq!(user.role, Role::Patient);
        assert!(!session.is_admin());
    }

    #[test]
    fn test_wrong_tab_credentials_rejected() {
        let mut session = memory_session();
        assert!(matches!(
            session.login("admin@example.com", "admin"),
            Err(SessionError::InvalidCredentials)
        ));
        assert!(matches!(
            session.admin_login("patient@example.com", "password"),
            Err(SessionError::InvalidAdminCredentials)
        ));
        assert!(session.user().is_none());
    }

    #[test]
    fn test_admin_login_and_require_admin() {
        let mut session = memory_session();
        assert!(session.require_admin().is_err());

        session.admin_login("admin@example.com", "admin").unwrap();
        assert_eq!(session.require_admin().unwrap().id, "admin1");
    }

    #[test]
    fn test_register_rules() {
        let session = memory_session();
        let mut form = Registration {
            name: "Sara".to_string(),
            email: "sara@example.com".to_string(),
            password: "pw".to_string(),
            confirm_password: "other".to_string(),
        };
        assert!(matches!(session.register(&form), Err(SessionError::PasswordMismatch)));

        form.confirm_password = "pw".to_string();
        assert_eq!(session.register(&form).unwrap(), "sara@example.com");
        assert!(session.user().is_none());

        form.name = " ".to_string();
        assert!(matches!(session.register(&form), Err(SessionError::IncompleteForm)));
    }

    #[test]
    fn test_anonymous_result_not_recorded() {
        let mut session = memory_session();
        assert!(session.record_result(&sample_result()).unwrap().is_none());
    }

    #[test]
    fn test_history_ids_unique_within_same_millisecond() {
        let mut session = memory_session();
        session.login("patient@example.com", "password").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 4, 10, 9, 30, 0).unwrap();

        let first = session.record_result_at(&sample_result(), now).unwrap().unwrap().id.clone();
        let second = session.record_result_at(&sample_result(), now).unwrap().unwrap().id.clone();

        assert_eq!(first, format!("test-{}", now.timestamp_millis()));
        assert_ne!(first, second);
        assert_eq!(session.user().unwrap().test_history.len(), 2);
    }

    #[test]
    fn test_logout_clears_stored_user() {
        let mut session = memory_session();
        session.login("patient@example.com", "password").unwrap();
        session.record_result(&sample_result()).unwrap();
        session.logout().unwrap();

        assert!(session.user().is_none());
        assert!(session.store.get(USER_KEY).unwrap().is_none());
    }

    #[test]
    fn test_admin_tab_flag_consumed_once() {
        let session = memory_session();
        assert_eq!(session.take_preferred_tab().unwrap(), LoginTab::Login);

        session.request_admin_login().unwrap();
        assert_eq!(session.take_preferred_tab().unwrap(), LoginTab::Admin);
        assert_eq!(session.take_preferred_tab().unwrap(), LoginTab::Login);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = FileStore::in_dir(dir.path()).unwrap();
            let mut session = AppSession::restore(Box::new(store)).unwrap();
            session.login("patient@example.com", "password").unwrap();
            session.record_result(&sample_result()).unwrap();
        }

        let store = FileStore::in_dir(dir.path()).unwrap();
        let session = AppSession::restore(Box::new(store)).unwrap();
        let user = session.user().unwrap();
        assert_eq!(user.id, "p1");
        assert_eq!(user.test_history.len(), 1);
        assert_eq!(user.test_history[0].result.probability, Probability::Known(0.93));
    }

    #[test]
    fn test_corrupt_user_is_discarded() {
        let store = MemoryStore::new();
        store.set(USER_KEY, "{not json").unwrap();

        let session = AppSession::restore(Box::new(store)).unwrap();
        assert!(session.user().is_none());
        assert!(session.store.get(USER_KEY).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATE_FILE_NAME);
        std::fs::write(&path, "garbage").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.get(USER_KEY).unwrap().is_none());
    }
}
