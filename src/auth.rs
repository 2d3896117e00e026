//! Authentication module.

pub mod token;

use crate::config::AuthConfig;
use crate::db::{Database, NewUser, User};
use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use token::{TokenError, TokenKind, TokenSigner};

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular reader.
    User,
    /// May create, update and delete catalog entries.
    Librarian,
}

impl Role {
    /// Stored and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Librarian => "librarian",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "user" => Ok(Role::User),
            "librarian" => Ok(Role::Librarian),
            _ => Err(AppError::Validation(
                "Role must be 'user' or 'librarian'".to_string(),
            )),
        }
    }
}

/// Who is making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// User ID.
    pub user_id: i64,
    /// Current role.
    pub role: Role,
}

/// Fail with `Forbidden` unless the identity holds `role`.
pub fn require_role(identity: &Identity, role: Role) -> Result<()> {
    if identity.role == role {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("Requires the {} role", role)))
    }
}

/// Tokens returned by a successful sign-in.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    /// Short-lived access token.
    pub access_token: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Always "bearer".
    pub token_type: &'static str,
}

/// Access token minted from a refresh token.
#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    /// Short-lived access token.
    pub access_token: String,
    /// Always "bearer".
    pub token_type: &'static str,
}

/// Profile fields a user may change about themselves.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileUpdate {
    /// New display name.
    pub name: String,
    /// New email.
    pub email: String,
    /// New password; blank keeps the current one.
    #[serde(default)]
    pub password: Option<String>,
}

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a random signing secret.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Trim and lower-case an email, rejecting obviously malformed ones.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(AppError::Validation(format!("Invalid email: {}", email)));
    }
    Ok(email)
}

/// Hash verified against when a sign-in names an unknown email.
fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("libris-dummy-password").ok())
        .as_deref()
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 128 {
        return Err(AppError::Validation(
            "Name must be 1-128 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn validate_password(password: &str) -> Result<()> {
    if password.len() < 4 {
        return Err(AppError::Validation(
            "Password must be at least 4 characters".to_string(),
        ));
    }
    Ok(())
}

/// Authentication service.
pub struct AuthService {
    db: Database,
    tokens: TokenSigner,
    registration_enabled: bool,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(db: Database, tokens: TokenSigner, registration_enabled: bool) -> Self {
        Self {
            db,
            tokens,
            registration_enabled,
        }
    }

    /// Build from configuration, generating a secret if none is configured.
    pub fn from_config(db: Database, config: &AuthConfig) -> Self {
        let secret = config.configured_secret().unwrap_or_else(|| {
            tracing::warn!(
                "No token secret configured; using a random one. Tokens will not survive a restart"
            );
            generate_secret()
        });

        let tokens = TokenSigner::new(
            secret.as_bytes(),
            chrono::Duration::minutes(i64::from(config.access_token_minutes)),
            chrono::Duration::days(i64::from(config.refresh_token_days)),
        );

        Self::new(db, tokens, config.registration_enabled())
    }

    /// Self-service signup.
    pub fn signup(&self, name: &str, email: &str, password: &str, role: &str) -> Result<User> {
        if !self.registration_enabled {
            return Err(AppError::Forbidden("Registration is disabled".to_string()));
        }

        self.create_user(name, email, password, role)
    }

    /// Create a new user (also used by the CLI, regardless of registration mode).
    pub fn create_user(&self, name: &str, email: &str, password: &str, role: &str) -> Result<User> {
        let name = validate_name(name)?;
        let email = normalize_email(email)?;
        validate_password(password)?;
        let role: Role = role.parse()?;

        let user = self.db.create_user(&NewUser {
            name,
            email,
            password_hash: hash_password(password)?,
            role,
        })?;

        tracing::info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    /// Check credentials and issue a token pair.
    pub fn signin(&self, email: &str, password: &str) -> Result<TokenPair> {
        let user = normalize_email(email)
            .ok()
            .map(|email| self.db.get_user_by_email(&email))
            .transpose()?
            .flatten();

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash)? => user,
            Some(_) => {
                tracing::warn!("Sign-in rejected");
                return Err(AppError::InvalidCredentials);
            }
            None => {
                if let Some(hash) = dummy_hash() {
                    let _ = verify_password(password, hash);
                }
                tracing::warn!("Sign-in rejected");
                return Err(AppError::InvalidCredentials);
            }
        };

        let pair = TokenPair {
            access_token: self.sign(self.tokens.issue_access(user.id, user.role))?,
            refresh_token: self.sign(self.tokens.issue_refresh(user.id))?,
            token_type: "bearer",
        };

        tracing::info!(user_id = user.id, "User signed in");
        Ok(pair)
    }

    /// Exchange a refresh token for a new access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<AccessToken> {
        let claims = self
            .tokens
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|e| {
                tracing::debug!(error = %e, "Refresh token rejected");
                AppError::InvalidToken
            })?;

        let user_id = claims.user_id().map_err(|_| AppError::InvalidToken)?;
        let user = self.db.get_user_by_id(user_id)?.ok_or_else(|| {
            tracing::debug!(user_id, "Refresh token for unknown user");
            AppError::InvalidToken
        })?;

        Ok(AccessToken {
            access_token: self.sign(self.tokens.issue_access(user.id, user.role))?,
            token_type: "bearer",
        })
    }

    /// Resolve a bearer token to the identity behind it.
    pub fn resolve(&self, token: Option<&str>) -> Result<Identity> {
        let token = token.ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

        let user_id = self
            .tokens
            .verify(token, TokenKind::Access)
            .and_then(|claims| claims.user_id())
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                AppError::Unauthorized("Could not validate credentials".to_string())
            })?;

        let user = self
            .db
            .get_user_by_id(user_id)?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

        Ok(Identity {
            user_id: user.id,
            role: user.role,
        })
    }

    /// Stored record of the caller.
    pub fn current_user(&self, identity: &Identity) -> Result<User> {
        self.db
            .get_user_by_id(identity.user_id)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Update the caller's name, email and optionally password.
    pub fn update_profile(&self, identity: &Identity, update: ProfileUpdate) -> Result<User> {
        let name = validate_name(&update.name)?;
        let email = normalize_email(&update.email)?;

        // Everything that can be rejected is checked before the first write
        let password_hash = match update.password.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        if !self.db.update_user_profile(
            identity.user_id,
            &name,
            &email,
            password_hash.as_deref(),
        )? {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        tracing::info!(user_id = identity.user_id, "Profile updated");
        self.current_user(identity)
    }

    /// Change a user's password by email.
    pub fn change_password(&self, email: &str, new_password: &str) -> Result<bool> {
        validate_password(new_password)?;

        let Some(user) = self.db.get_user_by_email(&normalize_email(email)?)? else {
            return Ok(false);
        };

        let password_hash = hash_password(new_password)?;
        self.db.update_user_password(user.id, &password_hash)
    }

    /// Delete the caller's account and reading progress.
    pub fn delete_user(&self, identity: &Identity) -> Result<()> {
        match self.db.delete_user(identity.user_id) {
            Ok(true) => {
                tracing::info!(user_id = identity.user_id, "User deleted");
                Ok(())
            }
            Ok(false) => Err(AppError::NotFound("User not found".to_string())),
            Err(e) => {
                tracing::error!(user_id = identity.user_id, error = %e, "Failed to delete user");
                Err(AppError::Internal("Failed to delete user".to_string()))
            }
        }
    }

    /// Delete a user by email.
    pub fn delete_user_by_email(&self, email: &str) -> Result<bool> {
        match self.db.get_user_by_email(&normalize_email(email)?)? {
            Some(user) => self.db.delete_user(user.id),
            None => Ok(false),
        }
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }

    fn sign(&self, token: std::result::Result<String, TokenError>) -> Result<String> {
        token.map_err(|e| AppError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_dummy_hash_never_matches() {
        let hash = dummy_hash().unwrap();
        assert!(PasswordHash::new(hash).is_ok());
        assert!(!verify_password("password", hash).unwrap());
    }

    #[test]
    fn test_generate_secret() {
        let secret1 = generate_secret();
        let secret2 = generate_secret();

        assert_eq!(secret1.len(), 43); // Base64 of 32 bytes
        assert_ne!(secret1, secret2);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
        assert!(normalize_email("alice").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("alice@localhost").is_err());
        assert!(normalize_email("al ice@example.com").is_err());
        assert!(normalize_email("a@b@example.com").is_err());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("librarian".parse::<Role>().unwrap(), Role::Librarian);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_require_role() {
        let librarian = Identity {
            user_id: 1,
            role: Role::Librarian,
        };
        let reader = Identity {
            user_id: 2,
            role: Role::User,
        };

        assert!(require_role(&librarian, Role::Librarian).is_ok());
        assert!(matches!(
            require_role(&reader, Role::Librarian),
            Err(AppError::Forbidden(_))
        ));
    }
}
