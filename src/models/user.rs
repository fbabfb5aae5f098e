use serde::Serialize;

/// An account that can sign in and keep a watchlist
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// PBKDF2 hash in `pbkdf2_sha256$<iterations>$<salt>$<hash>` form
    pub password_hash: String,
}

/// Fields needed to register a user; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Public view of a user, as returned by `/auth/me`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfileResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
}

impl From<&User> for UserProfileResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
        }
    }
}
