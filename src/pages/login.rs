use crate::models::LoginCredentials;

use super::FormError;

/// Fallback shown when a login fails without a server message.
pub const LOGIN_FAILED: &str = "Login failed";

/// The sign-in form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both fields are required; an incomplete form never reaches the network.
    pub fn validate(&self) -> Result<LoginCredentials, FormError> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(FormError::invalid("Username and password are required"));
        }
        Ok(LoginCredentials {
            username: self.username.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

pub fn view(error: Option<&str>) -> String {
    let mut output = String::from("QAtron\nSign In\n\n");
    output.push_str("Sign in with `qboard login --username <name>`.\n");
    if let Some(error) = error {
        output.push_str(&format!("\nError: {}\n", error));
    }
    output
}
