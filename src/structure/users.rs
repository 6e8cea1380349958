use serde::{Deserialize, Serialize};

/// Stored account. `_id` is assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub exp: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl SignupRequest {
    /// Both credentials with the email trimmed, or `None` when either is blank.
    pub fn credentials(&self) -> Option<(String, &str)> {
        credentials(self.email.as_deref(), self.password.as_deref())
    }
}

impl LoginRequest {
    pub fn credentials(&self) -> Option<(String, &str)> {
        credentials(self.email.as_deref(), self.password.as_deref())
    }
}

fn credentials<'a>(email: Option<&str>, password: Option<&'a str>) -> Option<(String, &'a str)> {
    let email = email.map(str::trim).filter(|e| !e.is_empty())?;
    let password = password.filter(|p| !p.is_empty())?;
    Some((email.to_string(), password))
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub email: String,
}
