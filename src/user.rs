use serde::Deserialize;

#[derive(Debug)]
#[cfg_attr(feature = "backend-sql", derive(sqlx::FromRow))]
pub struct User {
    pub username: String,
    pub pwhash: String,
    pub session_id: Option<String>,
}

/// Submitted by both the signup and login forms.
#[derive(Debug, Deserialize)]
pub struct AccountForm {
    pub username: String,
    pub password: String,
}
