//! User model, account forms and JWT claims

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Account approval status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Pending,
    Approved,
    Rejected,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "PENDING",
            UserStatus::Approved => "APPROVED",
            UserStatus::Rejected => "REJECTED",
        }
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(UserStatus::Pending),
            "APPROVED" => Ok(UserStatus::Approved),
            "REJECTED" => Ok(UserStatus::Rejected),
            _ => Err(format!("Invalid user status: {}", s)),
        }
    }
}

super::impl_text_enum!(UserStatus);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USER" => Ok(UserRole::User),
            "ADMIN" => Ok(UserRole::Admin),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

super::impl_text_enum!(UserRole);

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    pub university_id: i32,
    /// Asset path of the uploaded university ID card
    pub university_card: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing, default)]
    pub password: String,
    pub status: UserStatus,
    pub role: UserRole,
    pub last_activity_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// User row for the admin listing, with their borrow count
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct UserWithBorrows {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub user: User,
    pub total_borrowed_books: i64,
}

/// Admin user listing query
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct UserQuery {
    pub query: Option<String>,
    /// `newest` or `oldest`
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Only users with this status (e.g. PENDING for account requests)
    pub status: Option<UserStatus>,
}

impl UserQuery {
    pub fn list_query(&self) -> super::ListQuery {
        super::ListQuery {
            query: self.query.clone(),
            sort: self.sort.clone(),
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Sign-up request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SignUpForm {
    #[validate(length(min = 3, message = "Full name must be at least 3 characters"))]
    pub fullname: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub university_id: i32,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "Uploading a university ID card is required"))]
    pub university_card: String,
}

/// Sign-in request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SignInForm {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Token issued on sign-in and sign-up
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Approve/reject an account (admin only)
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserStatus {
    pub status: UserStatus,
}

/// Change a user's role (admin only)
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRole {
    pub role: UserRole,
}

/// JWT claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: Uuid,
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user: &User, now: i64, expiration_hours: u64) -> Self {
        Self {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            exp: now + (expiration_hours as i64 * 3600),
            iat: now,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn user_id(&self) -> Uuid {
        self.sub
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            fullname: "Ada Lovelace".to_string(),
            email: "ada@uni.edu".to_string(),
            university_id: 1815,
            university_card: "/ids/ada.png".to_string(),
            password: "$argon2id$v=19$...".to_string(),
            status: UserStatus::Approved,
            role,
            last_activity_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let now = Utc::now().timestamp();
        let claims = UserClaims::new(&user(UserRole::Admin), now, 1);
        let token = claims.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.sub, claims.sub);
        assert_eq!(parsed.role, UserRole::Admin);
        assert!(UserClaims::from_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_is_admin() {
        assert!(user(UserRole::Admin).is_admin());
        assert!(!user(UserRole::User).is_admin());
    }

    #[test]
    fn test_password_never_serialized() {
        let json = serde_json::to_value(user(UserRole::User)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["status"], "APPROVED");
        assert_eq!(json["role"], "USER");
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("approved".parse::<UserStatus>().unwrap(), UserStatus::Approved);
        assert!("BANNED".parse::<UserStatus>().is_err());
    }

    #[test]
    fn test_sign_up_validation() {
        let form = SignUpForm {
            fullname: "Al".to_string(),
            email: "not-an-email".to_string(),
            university_id: 42,
            password: "short".to_string(),
            university_card: String::new(),
        };
        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        assert_eq!(fields.len(), 4);
    }
}
