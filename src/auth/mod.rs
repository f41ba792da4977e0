mod password;
mod resolver;
mod session;

pub use password::{hash_password, verify_password};
pub use resolver::{resolve_identity, Identity, RequireUser};
pub use session::{clear_session_cookie, extract_token, issue_token, session_cookie, verify_token, Claims};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::ProfileRow;
use crate::error::AppError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email already in use")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    Validation(String),
    #[error("Session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("Password hashing failed: {0}")]
    Hash(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailTaken => AppError::Conflict(err.to_string()),
            AuthError::InvalidCredentials | AuthError::Token(_) => {
                AppError::Unauthorized(err.to_string())
            }
            AuthError::Validation(msg) => AppError::InvalidInput(msg),
            AuthError::Hash(msg) => AppError::Internal(msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Individual,
    Organization,
    Ngo,
}

impl Role {
    /// Case-insensitive match against the fixed role set. Anything else is unset.
    pub fn normalize(raw: &str) -> Option<Role> {
        match raw.trim().to_lowercase().as_str() {
            "individual" => Some(Role::Individual),
            "organization" => Some(Role::Organization),
            "ngo" => Some(Role::Ngo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Individual => "individual",
            Role::Organization => "organization",
            Role::Ngo => "ngo",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Individual => "Individual",
            Role::Organization => "Organization",
            Role::Ngo => "NGO",
        }
    }
}

/// Which page set a signed-in user gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Member(Role),
    Ngo,
    Unassigned,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserData {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl UserData {
    /// Identity from session claims plus the profile row, if one was found.
    pub fn from_profile(id: Uuid, email: &str, profile: Option<ProfileRow>) -> Self {
        match profile {
            Some(p) => Self {
                id,
                email: if p.email.is_empty() { email.to_string() } else { p.email },
                name: p.name.filter(|n| !n.trim().is_empty()),
                role: p.role.as_deref().and_then(Role::normalize),
            },
            None => Self {
                id,
                email: email.to_string(),
                name: None,
                role: None,
            },
        }
    }

    pub fn audience(&self) -> Audience {
        match self.role {
            Some(Role::Ngo) => Audience::Ngo,
            Some(role @ (Role::Individual | Role::Organization)) => Audience::Member(role),
            None => Audience::Unassigned,
        }
    }

    pub fn is_ngo(&self) -> bool {
        self.audience() == Audience::Ngo
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

pub struct ValidSignUp {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl SignUpForm {
    pub fn validate(self) -> Result<ValidSignUp, AuthError> {
        let email = self.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Validation("Enter a valid email address".to_string()));
        }
        if self.password.chars().count() < 6 {
            return Err(AuthError::Validation(
                "Password should be at least 6 characters".to_string(),
            ));
        }
        let role = Role::normalize(&self.role)
            .ok_or_else(|| AuthError::Validation("Select an account type".to_string()))?;
        Ok(ValidSignUp {
            name: self.name.trim().to_string(),
            email,
            password: self.password,
            role,
        })
    }
}
