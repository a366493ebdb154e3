//! The account service.

use crate::model::{validate_email, validate_name};
use crate::{
    AdminUpdate, Error, LoginRequest, PasswordHasher, ProfileUpdate, RegisterRequest, Result, Role,
    SaltedSha256, Session, SessionStore, UserProfile,
};
use access::{AccessManager, Resource, Subject, USER_ADMIN_EDIT, USER_EDIT};
use cache::{Args, Operation, ResultCache};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use storage::{KvStore, NewUser, UserChanges, UserStore};

/// Tunables for [`AccountService`].
#[derive(Debug, Clone)]
pub struct AccountSettings {
    /// Lifetime of cached reads.
    pub cache_ttl: Duration,
    /// Lifetime of session tokens.
    pub token_ttl: Duration,
    pub min_password_len: usize,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            token_ttl: Duration::from_secs(30 * 60),
            min_password_len: 8,
        }
    }
}

/// Registration, authentication, and profile management.
///
/// Writes are gated by the [`AccessManager`]; reads go through the
/// [`ResultCache`]. Cached reads are not invalidated by writes and may be
/// stale for up to `cache_ttl`.
pub struct AccountService<S> {
    users: UserStore,
    cache: ResultCache<Arc<S>>,
    sessions: SessionStore<Arc<S>>,
    access: Arc<AccessManager>,
    hasher: Arc<dyn PasswordHasher>,
    settings: AccountSettings,
}

impl<S: KvStore> AccountService<S> {
    /// Create a service. `store` backs both the result cache and sessions.
    pub fn new(
        users: UserStore,
        store: Arc<S>,
        access: Arc<AccessManager>,
        settings: AccountSettings,
    ) -> Self {
        Self {
            users,
            cache: ResultCache::new(Arc::clone(&store), settings.cache_ttl),
            sessions: SessionStore::new(store, settings.token_ttl),
            access,
            hasher: Arc::new(SaltedSha256),
            settings,
        }
    }

    /// Replace the password hasher.
    pub fn with_hasher(mut self, hasher: impl PasswordHasher + 'static) -> Self {
        self.hasher = Arc::new(hasher);
        self
    }

    pub fn access(&self) -> &AccessManager {
        &self.access
    }

    pub fn settings(&self) -> &AccountSettings {
        &self.settings
    }

    /// Register a new user.
    pub async fn register(&self, request: RegisterRequest) -> Result<UserProfile> {
        validate_name("first_name", &request.first_name)?;
        validate_name("last_name", &request.last_name)?;
        validate_email(&request.email)?;
        self.validate_password(&request.password)?;

        let new_user = NewUser {
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            hashed_password: self.hasher.hash(&request.password),
            role: request.role.as_str().to_string(),
        };
        let record = self.users.add(&new_user).map_err(|e| match e {
            storage::Error::AlreadyExists(_) => Error::UserAlreadyExists(new_user.email.clone()),
            other => Error::Storage(other),
        })?;

        tracing::info!(user_id = %record.id, role = %record.role, "registered user");
        UserProfile::try_from(record)
    }

    /// Verify credentials and issue a session token.
    ///
    /// Fails with [`Error::AlreadyLoggedIn`] if `current_token` is still live.
    pub async fn login(&self, request: LoginRequest, current_token: Option<&str>) -> Result<Session> {
        if let Some(token) = current_token
            && self.sessions.decode(token).await.is_ok()
        {
            return Err(Error::AlreadyLoggedIn);
        }

        let record = self
            .users
            .get_by_email(&request.email)?
            .ok_or(Error::UserNotFound)?;
        if !self.hasher.verify(&request.password, &record.hashed_password) {
            tracing::warn!(user_id = %record.id, "login with wrong password");
            return Err(Error::WrongPassword);
        }

        let profile = UserProfile::try_from(record)?;
        let session = self.sessions.issue(&profile).await?;
        tracing::info!(user_id = %profile.id, "user logged in");
        Ok(session)
    }

    /// End the session identified by `token`.
    pub async fn logout(&self, token: Option<&str>) -> Result<()> {
        let token = token.ok_or(Error::NotAuthenticated)?;
        if !self.sessions.revoke(token).await? {
            return Err(Error::NotAuthenticated);
        }
        tracing::info!("user logged out");
        Ok(())
    }

    /// Decode `token` and look up its user.
    ///
    /// The role comes from the user record, not the token, so role changes
    /// take effect on the next request.
    pub async fn current_user(&self, token: &str) -> Result<UserProfile> {
        let claims = self.sessions.decode(token).await?;
        let record = self
            .users
            .get(&claims.user_id)?
            .ok_or(Error::UserNotFound)?;
        UserProfile::try_from(record)
    }

    /// The ABAC subject (`id`, `role`) behind `token`.
    pub async fn resolve_subject(&self, token: &str) -> Result<Subject> {
        Ok(self.current_user(token).await?.subject())
    }

    /// Check an arbitrary action for the user behind `token`.
    pub async fn check(&self, token: &str, action: &str, resource: &Resource) -> Result<bool> {
        let subject = self.resolve_subject(token).await?;
        Ok(self.access.check(action, &subject, resource))
    }

    /// Fetch a profile by id (cached).
    pub async fn get_user(&self, user_id: &str) -> Result<UserProfile> {
        let args = Args::new().with("user_id", user_id).with_opaque("users", &self.users);
        self.cache
            .one(&get_user_operation(), &args, || async {
                self.users
                    .get(user_id)?
                    .map(UserProfile::try_from)
                    .transpose()
            })
            .await
    }

    /// List profiles, optionally of one role (cached). An empty listing is
    /// reported as not found.
    pub async fn list_users(&self, role: Option<Role>) -> Result<Vec<UserProfile>> {
        let role = role.map(|r| r.as_str());
        let args = Args::new().with("role", role).with_opaque("users", &self.users);
        self.cache
            .many(&list_users_operation(), &args, || async {
                self.users
                    .list(role)?
                    .into_iter()
                    .map(UserProfile::try_from)
                    .collect::<Result<Vec<_>>>()
            })
            .await
    }

    /// Edit a profile. Allowed for the owner and for admins (`user:edit`).
    pub async fn edit_user(
        &self,
        token: &str,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfile> {
        let subject = self.resolve_subject(token).await?;
        self.access.require(
            USER_EDIT,
            &subject,
            &Resource::new().with("owner_id", user_id),
        )?;

        if self.users.get(user_id)?.is_none() {
            return Err(Error::UserNotFound);
        }

        let changes = self.profile_changes(update)?;
        let email = changes.email.clone();
        let record = self
            .users
            .update(user_id, &changes)
            .map_err(|e| conflict_or(e, email))?;

        tracing::info!(user_id, editor = ?subject.get("id"), "edited user");
        UserProfile::try_from(record)
    }

    /// Edit any profile by e-mail, including its role (`user:admin_edit`).
    pub async fn admin_edit_user(
        &self,
        token: &str,
        email: &str,
        update: AdminUpdate,
    ) -> Result<UserProfile> {
        let subject = self.resolve_subject(token).await?;
        self.access.require(
            USER_ADMIN_EDIT,
            &subject,
            &Resource::new().with("email", email),
        )?;

        if self.users.get_by_email(email)?.is_none() {
            return Err(Error::UserNotFound);
        }

        if let Some(first_name) = &update.first_name {
            validate_name("first_name", first_name)?;
        }
        if let Some(last_name) = &update.last_name {
            validate_name("last_name", last_name)?;
        }
        if let Some(new_email) = &update.email {
            validate_email(new_email)?;
        }
        let changes = UserChanges {
            first_name: update.first_name,
            last_name: update.last_name,
            email: update.email,
            hashed_password: None,
            role: update.role.map(|r| r.as_str().to_string()),
        };
        let new_email = changes.email.clone();
        let record = self
            .users
            .update_by_email(email, &changes)
            .map_err(|e| conflict_or(e, new_email))?;

        tracing::info!(user_id = %record.id, role = %record.role, "admin edited user");
        UserProfile::try_from(record)
    }

    fn profile_changes(&self, update: ProfileUpdate) -> Result<UserChanges> {
        if let Some(first_name) = &update.first_name {
            validate_name("first_name", first_name)?;
        }
        if let Some(last_name) = &update.last_name {
            validate_name("last_name", last_name)?;
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
        }
        let hashed_password = match &update.password {
            Some(password) => {
                self.validate_password(password)?;
                Some(self.hasher.hash(password))
            }
            None => None,
        };
        Ok(UserChanges {
            first_name: update.first_name,
            last_name: update.last_name,
            email: update.email,
            hashed_password,
            role: None,
        })
    }

    fn validate_password(&self, password: &str) -> Result<()> {
        let min = self.settings.min_password_len;
        if password.chars().count() < min {
            return Err(Error::PasswordTooShort { min });
        }
        Ok(())
    }
}

fn get_user_operation() -> Operation {
    Operation::new("accounts::get_user")
        .collaborator("users")
        .param("user_id")
}

fn list_users_operation() -> Operation {
    Operation::new("accounts::list_users")
        .collaborator("users")
        .param_or("role", Value::Null)
}

fn conflict_or(err: storage::Error, email: Option<String>) -> Error {
    match err {
        storage::Error::AlreadyExists(_) => Error::UserAlreadyExists(email.unwrap_or_default()),
        storage::Error::NotFound(_) => Error::UserNotFound,
        other => Error::Storage(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::MemoryStore;

    type Service = AccountService<MemoryStore>;

    fn service() -> Service {
        AccountService::new(
            UserStore::in_memory().unwrap(),
            Arc::new(MemoryStore::new()),
            Arc::new(AccessManager::with_defaults()),
            AccountSettings::default(),
        )
    }

    fn request(email: &str, role: Role) -> RegisterRequest {
        RegisterRequest {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: email.into(),
            password: "difference-engine".into(),
            role,
        }
    }

    async fn login(service: &Service, email: &str) -> Session {
        service
            .login(
                LoginRequest {
                    email: email.into(),
                    password: "difference-engine".into(),
                },
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_and_duplicate() {
        let service = service();
        let user = service
            .register(request("ada@example.com", Role::User))
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.role, Role::User);

        let err = service
            .register(request("ada@example.com", Role::User))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UserAlreadyExists(ref email) if email == "ada@example.com"));
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let service = service();
        let mut short = request("ada@example.com", Role::User);
        short.password = "short".into();
        let err = service.register(short).await.unwrap_err();
        assert!(matches!(err, Error::PasswordTooShort { min: 8 }));
        assert_eq!(err.status_code(), 422);

        assert!(matches!(
            service.register(request("not-an-email", Role::User)).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_login_failures() {
        let service = service();
        service
            .register(request("ada@example.com", Role::User))
            .await
            .unwrap();

        let err = service
            .login(
                LoginRequest {
                    email: "ada@example.com".into(),
                    password: "wrong-password".into(),
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WrongPassword));
        assert_eq!(err.status_code(), 401);

        let err = service
            .login(
                LoginRequest {
                    email: "nobody@example.com".into(),
                    password: "difference-engine".into(),
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UserNotFound));
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let service = service();
        let user = service
            .register(request("ada@example.com", Role::User))
            .await
            .unwrap();
        let session = login(&service, "ada@example.com").await;

        let subject = service.resolve_subject(&session.token).await.unwrap();
        assert_eq!(subject.get_str("id"), Some(user.id.as_str()));
        assert_eq!(subject.get_str("role"), Some("user"));

        let again = service
            .login(
                LoginRequest {
                    email: "ada@example.com".into(),
                    password: "difference-engine".into(),
                },
                Some(&session.token),
            )
            .await;
        assert!(matches!(again, Err(Error::AlreadyLoggedIn)));

        service.logout(Some(&session.token)).await.unwrap();
        assert!(matches!(
            service.logout(Some(&session.token)).await,
            Err(Error::NotAuthenticated)
        ));
        assert!(matches!(service.logout(None).await, Err(Error::NotAuthenticated)));
        assert!(matches!(
            service.current_user(&session.token).await,
            Err(Error::InvalidToken)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_expires() {
        let service = service();
        service
            .register(request("ada@example.com", Role::User))
            .await
            .unwrap();
        let session = login(&service, "ada@example.com").await;

        tokio::time::advance(Duration::from_secs(30 * 60)).await;
        assert!(matches!(
            service.resolve_subject(&session.token).await,
            Err(Error::InvalidToken)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_does_not_block_login() {
        let service = service();
        service
            .register(request("ada@example.com", Role::User))
            .await
            .unwrap();
        let stale = login(&service, "ada@example.com").await;

        tokio::time::advance(Duration::from_secs(30 * 60)).await;
        let fresh = service
            .login(
                LoginRequest {
                    email: "ada@example.com".into(),
                    password: "difference-engine".into(),
                },
                Some(&stale.token),
            )
            .await
            .unwrap();
        assert_ne!(fresh.token, stale.token);
    }

    #[tokio::test]
    async fn test_edit_requires_owner_or_admin() {
        let service = service();
        let ada = service
            .register(request("ada@example.com", Role::User))
            .await
            .unwrap();
        let bob = service
            .register(request("bob@example.com", Role::User))
            .await
            .unwrap();
        service
            .register(request("root@example.com", Role::Admin))
            .await
            .unwrap();
        let ada_session = login(&service, "ada@example.com").await;
        let admin_session = login(&service, "root@example.com").await;

        let rename = ProfileUpdate {
            first_name: Some("Augusta".into()),
            ..Default::default()
        };
        let edited = service
            .edit_user(&ada_session.token, &ada.id, rename.clone())
            .await
            .unwrap();
        assert_eq!(edited.first_name, "Augusta");

        let err = service
            .edit_user(&ada_session.token, &bob.id, rename.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Access(access::Error::Denied { .. })));
        assert_eq!(err.status_code(), 403);

        let edited = service
            .edit_user(&admin_session.token, &bob.id, rename)
            .await
            .unwrap();
        assert_eq!(edited.first_name, "Augusta");
        assert_eq!(edited.last_name, "Lovelace");
    }

    #[tokio::test]
    async fn test_edit_password_is_rehashed() {
        let service = service();
        let ada = service
            .register(request("ada@example.com", Role::User))
            .await
            .unwrap();
        let session = login(&service, "ada@example.com").await;

        let err = service
            .edit_user(
                &session.token,
                &ada.id,
                ProfileUpdate {
                    password: Some("tiny".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PasswordTooShort { .. }));

        service
            .edit_user(
                &session.token,
                &ada.id,
                ProfileUpdate {
                    password: Some("analytical-engine".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        service.logout(Some(&session.token)).await.unwrap();

        let relogin = service
            .login(
                LoginRequest {
                    email: "ada@example.com".into(),
                    password: "analytical-engine".into(),
                },
                None,
            )
            .await;
        assert!(relogin.is_ok());
    }

    #[tokio::test]
    async fn test_edit_email_conflict() {
        let service = service();
        let ada = service
            .register(request("ada@example.com", Role::User))
            .await
            .unwrap();
        service
            .register(request("bob@example.com", Role::User))
            .await
            .unwrap();
        let session = login(&service, "ada@example.com").await;

        let err = service
            .edit_user(
                &session.token,
                &ada.id,
                ProfileUpdate {
                    email: Some("bob@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UserAlreadyExists(ref email) if email == "bob@example.com"));
    }

    #[tokio::test]
    async fn test_admin_edit() {
        let service = service();
        service
            .register(request("ada@example.com", Role::User))
            .await
            .unwrap();
        service
            .register(request("root@example.com", Role::Admin))
            .await
            .unwrap();
        let ada_session = login(&service, "ada@example.com").await;
        let admin_session = login(&service, "root@example.com").await;

        let promote = AdminUpdate {
            role: Some(Role::Admin),
            ..Default::default()
        };
        let err = service
            .admin_edit_user(&ada_session.token, "ada@example.com", promote.clone())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        let promoted = service
            .admin_edit_user(&admin_session.token, "ada@example.com", promote.clone())
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Admin);

        // The role is read from the user record on every request.
        let subject = service.resolve_subject(&ada_session.token).await.unwrap();
        assert_eq!(subject.get_str("role"), Some("admin"));

        let err = service
            .admin_edit_user(&admin_session.token, "ghost@example.com", promote)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UserNotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_user_is_cached_until_ttl() {
        let service = service();
        let ada = service
            .register(request("ada@example.com", Role::User))
            .await
            .unwrap();
        let session = login(&service, "ada@example.com").await;

        assert_eq!(service.get_user(&ada.id).await.unwrap(), ada);

        service
            .edit_user(
                &session.token,
                &ada.id,
                ProfileUpdate {
                    last_name: Some("King".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(service.get_user(&ada.id).await.unwrap().last_name, "Lovelace");

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(service.get_user(&ada.id).await.unwrap().last_name, "King");
    }

    #[tokio::test]
    async fn test_get_unknown_user_is_not_found() {
        let service = service();
        let err = service.get_user("missing").await.unwrap_err();
        assert!(matches!(err, Error::Cache(cache::Error::NotFound { .. })));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_list_users_by_role() {
        let service = service();
        service
            .register(request("ada@example.com", Role::User))
            .await
            .unwrap();
        service
            .register(request("root@example.com", Role::Admin))
            .await
            .unwrap();

        assert_eq!(service.list_users(None).await.unwrap().len(), 2);
        let admins = service.list_users(Some(Role::Admin)).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].email, "root@example.com");
    }

    #[tokio::test]
    async fn test_check_custom_action() {
        let mut access = AccessManager::with_defaults();
        access.register("book:lend", |subject, resource| {
            subject.get_str("role") == Some("admin") || resource.get_str("status") == Some("available")
        });
        let service = AccountService::new(
            UserStore::in_memory().unwrap(),
            Arc::new(MemoryStore::new()),
            Arc::new(access),
            AccountSettings::default(),
        );
        service
            .register(request("ada@example.com", Role::User))
            .await
            .unwrap();
        let session = login(&service, "ada@example.com").await;

        let available = Resource::new().with("status", "available");
        let lent = Resource::new().with("status", "lent");
        assert!(service.check(&session.token, "book:lend", &available).await.unwrap());
        assert!(!service.check(&session.token, "book:lend", &lent).await.unwrap());
    }
}
