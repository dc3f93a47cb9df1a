use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use password_hash::SaltString;
use rand_core::OsRng;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use std::sync::LazyLock;
use uuid::Uuid;

use crate::config::AdminSeed;
use crate::entity::users::{self, Role};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

#[derive(Debug)]
pub enum AuthError {
    /// Request field missing or malformed.
    Invalid(String),
    EmailTaken,
    NotFound,
    InvalidPassword,
    Db(sea_orm::DbErr),
    Hash(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Invalid(msg) => write!(f, "{msg}"),
            AuthError::EmailTaken => write!(f, "Email already registered"),
            AuthError::NotFound => write!(f, "User not found"),
            AuthError::InvalidPassword => write!(f, "Invalid password"),
            AuthError::Db(e) => write!(f, "Database error: {e}"),
            AuthError::Hash(e) => write!(f, "Hash error: {e}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<sea_orm::DbErr> for AuthError {
    fn from(e: sea_orm::DbErr) -> Self {
        if is_unique_violation(&e) {
            AuthError::EmailTaken
        } else {
            AuthError::Db(e)
        }
    }
}

pub(crate) fn is_unique_violation(e: &sea_orm::DbErr) -> bool {
    let msg = e.to_string();
    msg.contains("UNIQUE") || msg.contains("unique")
}

/// Lowercased, trimmed email; rejects anything that doesn't look like `a@b.c`.
pub fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(AuthError::Invalid("Email is required".into()));
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(AuthError::Invalid("Email is invalid".into()));
    }
    Ok(email)
}

/// Account store: registration, credential checks and password changes.
pub struct Auth {
    db: DatabaseConnection,
    admin_email: Option<String>,
}

impl Auth {
    pub fn new(db: DatabaseConnection, admin_email: Option<&str>) -> Self {
        Self {
            db,
            admin_email: admin_email.map(|e| e.trim().to_lowercase()),
        }
    }

    fn role_for(&self, email: &str) -> Role {
        match &self.admin_email {
            Some(admin) if admin == email => Role::Admin,
            _ => Role::User,
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>, AuthError> {
        Ok(users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    /// Self-service sign-up. The configured admin email registers as an admin.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<users::Model, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::Invalid("Name is required".into()));
        }
        if password.is_empty() {
            return Err(AuthError::Invalid("Password is required".into()));
        }
        let email = normalize_email(email)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let role = self.role_for(&email);
        self.create_user(name, &email, password, role).await
    }

    /// Check email/password. Callers must not reveal which of the two failed.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<users::Model, AuthError> {
        let email = email.trim().to_lowercase();
        let user = self
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::NotFound)?;

        verify_password(password, &user.password_hash)?;

        let mut active: users::ActiveModel = user.into();
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(&self.db).await?)
    }

    /// Insert a user with an Argon2-hashed password. `email` must already be normalized.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<users::Model, AuthError> {
        let password_hash = Self::hash_password(password)?;
        let now = Utc::now().naive_utc();
        let model = users::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(name.to_owned()),
            email: Set(email.to_owned()),
            password_hash: Set(password_hash),
            role: Set(role),
            location: Set(String::new()),
            avatar: Set(String::new()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;
        Ok(model)
    }

    /// Create the seed admin, or promote an existing account with that email.
    pub async fn ensure_admin(&self, seed: &AdminSeed) -> Result<users::Model, AuthError> {
        let email = normalize_email(&seed.email)?;
        match self.find_by_email(&email).await? {
            Some(user) if user.is_admin() => Ok(user),
            Some(user) => {
                let mut active: users::ActiveModel = user.into();
                active.role = Set(Role::Admin);
                active.updated_at = Set(Utc::now().naive_utc());
                Ok(active.update(&self.db).await?)
            }
            None => {
                self.create_user(&seed.name, &email, &seed.password, Role::Admin)
                    .await
            }
        }
    }

    /// Replace the password after checking the current one.
    pub async fn change_password(
        &self,
        user: users::Model,
        current: &str,
        new: &str,
    ) -> Result<users::Model, AuthError> {
        if new.is_empty() {
            return Err(AuthError::Invalid("New password is required".into()));
        }
        verify_password(current, &user.password_hash)?;
        self.set_password(user, new).await
    }

    /// Replace the password without checking the old one (admin path).
    pub async fn set_password(
        &self,
        user: users::Model,
        new: &str,
    ) -> Result<users::Model, AuthError> {
        let hash = Self::hash_password(new)?;
        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(hash);
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(&self.db).await?)
    }

    pub async fn count_users(&self) -> Result<u64, AuthError> {
        Ok(users::Entity::find().count(&self.db).await?)
    }

    /// Hash a plaintext password with Argon2id + a random salt.
    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hash(e.to_string()))?
            .to_string();
        Ok(hash)
    }
}

fn verify_password(password: &str, phc: &str) -> Result<(), AuthError> {
    let hash = PasswordHash::new(phc).map_err(|e| AuthError::Hash(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .map_err(|_| AuthError::InvalidPassword)
}
