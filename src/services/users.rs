//! Authentication and user management service

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::{AuthConfig, LibraryConfig},
    error::{AppError, AppResult},
    models::{
        user::{AuthResponse, SignInForm, SignUpForm, UserQuery},
        workflow::{NewJob, OnboardingPayload},
        Paginated, User, UserClaims, UserRole, UserStatus, UserWithBorrows,
    },
};

/// Storage operations behind accounts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<User>;

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn email_exists(&self, email: &str) -> AppResult<bool>;

    /// Insert the account and its onboarding job atomically
    async fn create(&self, form: &SignUpForm, password_hash: &str, onboarding: &NewJob) -> AppResult<User>;

    async fn search(&self, query: &UserQuery, default_limit: i64) -> AppResult<(Vec<UserWithBorrows>, i64)>;

    async fn update_status(&self, id: Uuid, status: UserStatus) -> AppResult<User>;

    async fn update_role(&self, id: Uuid, role: UserRole) -> AppResult<User>;

    async fn touch_activity(&self, id: Uuid, today: NaiveDate) -> AppResult<bool>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

/// Hash a password with argon2 and a random salt
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check `password` against a stored argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Clone)]
pub struct UsersService {
    store: Arc<dyn UserStore>,
    config: AuthConfig,
    library: LibraryConfig,
}

impl UsersService {
    pub fn new(store: Arc<dyn UserStore>, config: AuthConfig, library: LibraryConfig) -> Self {
        Self { store, config, library }
    }

    fn issue_token(&self, user: &User) -> AppResult<String> {
        UserClaims::new(user, Utc::now().timestamp(), self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Register a new account (PENDING until an admin approves it)
    /// and sign it in
    pub async fn sign_up(&self, form: SignUpForm) -> AppResult<AuthResponse> {
        let mut form = form;
        form.email = form.email.trim().to_string();
        form.fullname = form.fullname.trim().to_string();
        form.validate()?;

        if self.store.email_exists(&form.email).await? {
            return Err(AppError::AlreadyExists("User already exists".to_string()));
        }

        let onboarding = OnboardingPayload {
            email: form.email.clone(),
            fullname: form.fullname.clone(),
        };
        let job = NewJob::onboarding(&onboarding, Utc::now())
            .map_err(|e| AppError::Internal(format!("Failed to encode workflow payload: {}", e)))?;

        let password_hash = hash_password(&form.password)?;
        let user = self.store.create(&form, &password_hash, &job).await?;
        tracing::info!("New account {} for {}, onboarding {}", user.id, user.email, job.id);

        let token = self.issue_token(&user)?;
        Ok(AuthResponse { token, user })
    }

    /// Authenticate by email and password and return a JWT
    pub async fn sign_in(&self, form: SignInForm) -> AppResult<AuthResponse> {
        form.validate()?;

        let invalid = || AppError::Authentication("Invalid email or password".to_string());

        let user = self
            .store
            .get_by_email(form.email.trim())
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&user.password, &form.password)? {
            tracing::warn!("Failed sign-in for {}", user.email);
            return Err(invalid());
        }

        let token = self.issue_token(&user)?;
        Ok(AuthResponse { token, user })
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        self.store.get_by_id(id).await
    }

    /// Current account of a token holder, which must still be an admin.
    /// The role is read from the database, not from the token.
    pub async fn require_admin(&self, id: Uuid) -> AppResult<User> {
        let user = self.store.get_by_id(id).await.map_err(|e| match e {
            AppError::NotFound(_) => AppError::Authentication("Account no longer exists".to_string()),
            other => other,
        })?;

        if !user.is_admin() {
            tracing::warn!("Admin route refused for {} ({})", user.id, user.role);
            return Err(AppError::Authorization("Administrator privileges required".to_string()));
        }
        Ok(user)
    }

    /// Admin listing with borrow counts
    pub async fn search(&self, query: &UserQuery) -> AppResult<Paginated<UserWithBorrows>> {
        let pagination = query.list_query().pagination(self.library.page_size);
        let (users, total) = self.store.search(query, self.library.page_size).await?;
        Ok(Paginated::new(users, pagination, total))
    }

    /// Approve or reject an account
    pub async fn update_status(&self, id: Uuid, status: UserStatus) -> AppResult<User> {
        let user = self.store.update_status(id, status).await?;
        tracing::info!("User {} is now {}", id, status);
        Ok(user)
    }

    pub async fn update_role(&self, id: Uuid, role: UserRole) -> AppResult<User> {
        let user = self.store.update_role(id, role).await?;
        tracing::info!("User {} role changed to {}", id, role);
        Ok(user)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.store.delete(id).await?;
        tracing::info!("User {} deleted", id);
        Ok(())
    }

    /// Record that the user was active `today`
    pub async fn touch_activity(&self, id: Uuid, today: NaiveDate) -> AppResult<()> {
        if self.store.touch_activity(id, today).await? {
            tracing::debug!("Recorded activity of {} on {}", id, today);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workflow::JobKind;
    use mockall::predicate::eq;
    use tokio_test::{assert_err, assert_ok};

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            fullname: "Grace Hopper".to_string(),
            email: "grace@uni.edu".to_string(),
            university_id: 1906,
            university_card: "/ids/grace.png".to_string(),
            password: String::new(),
            status: UserStatus::Approved,
            role,
            last_activity_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            created_at: Utc::now(),
        }
    }

    fn sign_up_form() -> SignUpForm {
        SignUpForm {
            fullname: "  Grace Hopper ".to_string(),
            email: " grace@uni.edu ".to_string(),
            university_id: 1906,
            password: "cobol-forever".to_string(),
            university_card: "/ids/grace.png".to_string(),
        }
    }

    fn service(store: MockUserStore) -> UsersService {
        UsersService::new(Arc::new(store), AuthConfig::default(), LibraryConfig::default())
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_is_rejected_before_insert() {
        let mut store = MockUserStore::new();
        store
            .expect_email_exists()
            .with(eq("grace@uni.edu"))
            .times(1)
            .returning(|_| Ok(true));
        store.expect_create().never();

        let err = assert_err!(service(store).sign_up(sign_up_form()).await);
        assert!(matches!(err, AppError::AlreadyExists(ref m) if m == "User already exists"));
    }

    #[tokio::test]
    async fn test_sign_up_creates_account_with_onboarding_job() {
        let mut store = MockUserStore::new();
        store.expect_email_exists().returning(|_| Ok(false));
        store
            .expect_create()
            .withf(|form, hash, job| {
                form.email == "grace@uni.edu"
                    && form.fullname == "Grace Hopper"
                    && hash.starts_with("$argon2")
                    && job.kind == JobKind::Onboarding
                    && job.payload["email"] == "grace@uni.edu"
            })
            .times(1)
            .returning(|form, hash, _| {
                Ok(User {
                    email: form.email.clone(),
                    password: hash.to_string(),
                    status: UserStatus::Pending,
                    ..user(UserRole::User)
                })
            });

        let response = assert_ok!(service(store).sign_up(sign_up_form()).await);
        assert_eq!(response.user.status, UserStatus::Pending);
        assert!(!response.token.is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_with_wrong_password() {
        let hash = hash_password("cobol-forever").unwrap();
        let mut store = MockUserStore::new();
        store.expect_get_by_email().returning(move |_| {
            Ok(Some(User {
                password: hash.clone(),
                ..user(UserRole::User)
            }))
        });

        let form = SignInForm {
            email: "grace@uni.edu".to_string(),
            password: "fortran-forever".to_string(),
        };
        let err = assert_err!(service(store).sign_in(form).await);
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_demoted_admin_loses_admin_routes() {
        // the token still says ADMIN, the account no longer does
        let demoted = user(UserRole::User);
        let id = demoted.id;
        let mut store = MockUserStore::new();
        store
            .expect_get_by_id()
            .with(eq(id))
            .returning(move |_| Ok(demoted.clone()));

        let err = assert_err!(service(store).require_admin(id).await);
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_deleted_account_cannot_use_admin_routes() {
        let mut store = MockUserStore::new();
        store
            .expect_get_by_id()
            .returning(|_| Err(AppError::NotFound("User not found".to_string())));

        let err = assert_err!(service(store).require_admin(Uuid::new_v4()).await);
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_current_admin_passes() {
        let admin = user(UserRole::Admin);
        let id = admin.id;
        let mut store = MockUserStore::new();
        store.expect_get_by_id().returning(move |_| Ok(admin.clone()));

        let found = assert_ok!(service(store).require_admin(id).await);
        assert_eq!(found.id, id);
    }

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse battery").unwrap());
        assert!(!verify_password(&hash, "wrong password").unwrap());
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        assert!(matches!(verify_password("plaintext", "plaintext"), Err(AppError::Internal(_))));
    }
}
