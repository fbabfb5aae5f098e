//! Credentials and session tokens
//!
//! Passwords are stored in the `pbkdf2_sha256$<iterations>$<salt>$<hash>` layout
//! used by Django, so accounts created by either stack verify in the other.
//! Sessions are stateless HS256 JWTs: a short-lived access token plus a longer
//! refresh token that can only be exchanged for new access tokens.
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::Sha256;
use uuid::Uuid;

use crate::{
    db::UserStore,
    error::{AppError, AppResult},
    models::{Claims, LoginRequest, NewUser, TokenPair, TokenType, User},
};

const PBKDF2_ALGORITHM: &str = "pbkdf2_sha256";
/// Iteration count for new hashes; existing hashes keep the count they were made with
pub const PBKDF2_ITERATIONS: u32 = 600_000;
const HASH_LEN: usize = 32;

/// Hashes a password with a fresh salt and the default iteration count
pub fn hash_password(password: &str) -> String {
    hash_password_with_iterations(password, PBKDF2_ITERATIONS)
}

pub fn hash_password_with_iterations(password: &str, iterations: u32) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let hash = derive(password, &salt, iterations);
    format!(
        "{}${}${}${}",
        PBKDF2_ALGORITHM,
        iterations,
        salt,
        STANDARD.encode(hash)
    )
}

/// Checks a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.splitn(4, '$');
    let (Some(algorithm), Some(iterations), Some(salt), Some(expected)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    if algorithm != PBKDF2_ALGORITHM {
        return false;
    }

    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let Ok(expected) = STANDARD.decode(expected) else {
        return false;
    };

    constant_time_eq(&derive(password, salt, iterations), &expected)
}

/// Runs password hashing on the blocking thread pool
async fn run_blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))
}

fn derive(password: &str, salt: &str, iterations: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Issues and verifies JWTs
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::seconds(refresh_ttl_secs),
        }
    }

    /// Issues an access/refresh pair for a user who just authenticated
    pub fn issue_pair(&self, user: &User) -> AppResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue(user.id, &user.email, &user.username, TokenType::Access)?,
            refresh_token: self.issue(user.id, &user.email, &user.username, TokenType::Refresh)?,
        })
    }

    fn issue(
        &self,
        user_id: i64,
        email: &str,
        username: &str,
        token_type: TokenType,
    ) -> AppResult<String> {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            user_id,
            email: email.to_string(),
            username: username.to_string(),
            token_type,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Decodes a token, checking signature, expiry and that it is of the expected type
    pub fn verify(&self, token: &str, expected: TokenType) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected token");
                AppError::Unauthorized("Invalid or expired token".to_string())
            })?;

        if data.claims.token_type != expected {
            return Err(AppError::Unauthorized("Wrong token type".to_string()));
        }

        Ok(data.claims)
    }

    /// Exchanges a refresh token for a new access token
    pub fn refresh(&self, refresh_token: &str) -> AppResult<String> {
        let claims = self.verify(refresh_token, TokenType::Refresh)?;
        self.issue(
            claims.user_id,
            &claims.email,
            &claims.username,
            TokenType::Access,
        )
    }
}

/// Authenticates by email and password and issues a token pair
pub async fn login(
    users: &dyn UserStore,
    tokens: &TokenService,
    request: LoginRequest,
) -> AppResult<TokenPair> {
    let (Some(email), Some(password)) = (
        request.email.filter(|e| !e.is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::InvalidInput(
            "Email and password are required".to_string(),
        ));
    };

    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let user = users.find_by_email(&email).await?.ok_or_else(invalid)?;
    let stored = user.password_hash.clone();
    let verified = run_blocking(move || verify_password(&password, &stored)).await?;
    if !verified {
        tracing::info!(user_id = user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    tracing::info!(user_id = user.id, "User logged in");
    tokens.issue_pair(&user)
}

/// Creates a user with a freshly hashed password
pub async fn register_user(
    users: &dyn UserStore,
    username: &str,
    email: &str,
    password: &str,
) -> AppResult<User> {
    let password = password.to_string();
    let password_hash = run_blocking(move || hash_password(&password)).await?;

    users
        .create(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;

    const TEST_ITERATIONS: u32 = 1_000;

    fn user() -> User {
        User {
            id: 7,
            username: "testuser".to_string(),
            email: "test@example.com".to_string(),
            password_hash: String::new(),
        }
    }

    #[test]
    fn test_password_round_trip() {
        let encoded = hash_password_with_iterations("testpassword123", TEST_ITERATIONS);

        assert!(encoded.starts_with("pbkdf2_sha256$1000$"));
        assert!(verify_password("testpassword123", &encoded));
        assert!(!verify_password("testpassword124", &encoded));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password_with_iterations("same", TEST_ITERATIONS);
        let b = hash_password_with_iterations("same", TEST_ITERATIONS);
        assert_ne!(a, b);
    }

    #[test]
    fn test_verifies_known_django_hash() {
        // Same layout and digest as Django's PBKDF2PasswordHasher
        let encoded = "pbkdf2_sha256$1000$salt$YywoEuRtRgQQK6dhjp1tfS+BKPYma0oDJk0qBGC33LM=";
        assert!(verify_password("password", encoded));
        assert!(!verify_password("Password", encoded));
    }

    #[test]
    fn test_malformed_hashes_never_verify() {
        for encoded in [
            "",
            "plaintext",
            "md5$1$salt$hash",
            "pbkdf2_sha256$notanumber$salt$aGFzaA==",
            "pbkdf2_sha256$1000$salt$***",
        ] {
            assert!(!verify_password("password", encoded), "{}", encoded);
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let tokens = TokenService::new("secret", 300, 86_400);
        let pair = tokens.issue_pair(&user()).unwrap();

        let claims = tokens.verify(&pair.access_token, TokenType::Access).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let tokens = TokenService::new("secret", 300, 86_400);
        let pair = tokens.issue_pair(&user()).unwrap();

        assert!(tokens.verify(&pair.refresh_token, TokenType::Access).is_err());
        assert!(tokens.verify(&pair.access_token, TokenType::Refresh).is_err());
        assert!(tokens.refresh(&pair.access_token).is_err());
    }

    #[test]
    fn test_refresh_issues_access_token() {
        let tokens = TokenService::new("secret", 300, 86_400);
        let pair = tokens.issue_pair(&user()).unwrap();

        let access = tokens.refresh(&pair.refresh_token).unwrap();
        let claims = tokens.verify(&access, TokenType::Access).unwrap();
        assert_eq!(claims.username, "testuser");
    }

    #[test]
    fn test_rejects_expired_and_foreign_tokens() {
        // Expired well beyond the default 60s leeway
        let expired = TokenService::new("secret", -600, -600);
        let pair = expired.issue_pair(&user()).unwrap();
        assert!(expired.verify(&pair.access_token, TokenType::Access).is_err());

        let other = TokenService::new("other-secret", 300, 300);
        let foreign = other.issue_pair(&user()).unwrap();
        let tokens = TokenService::new("secret", 300, 300);
        assert!(tokens.verify(&foreign.access_token, TokenType::Access).is_err());
    }

    async fn store_with_user() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .create(NewUser {
                username: "testuser".to_string(),
                email: "test@example.com".to_string(),
                password_hash: hash_password_with_iterations("testpassword123", TEST_ITERATIONS),
            })
            .await
            .unwrap();
        store
    }

    fn login_request(email: Option<&str>, password: Option<&str>) -> LoginRequest {
        LoginRequest {
            email: email.map(str::to_string),
            password: password.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_login_success() {
        let store = store_with_user().await;
        let tokens = TokenService::new("secret", 300, 86_400);

        let pair = login(
            &store,
            &tokens,
            login_request(Some("test@example.com"), Some("testpassword123")),
        )
        .await
        .unwrap();

        assert!(tokens.verify(&pair.access_token, TokenType::Access).is_ok());
    }

    #[tokio::test]
    async fn test_login_leaves_runtime_responsive() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let store = InMemoryStore::new();
        store
            .create(NewUser {
                username: "slowhash".to_string(),
                email: "slow@example.com".to_string(),
                password_hash: hash_password_with_iterations("testpassword123", 200_000),
            })
            .await
            .unwrap();
        let tokens = TokenService::new("secret", 300, 86_400);

        // Single-threaded runtime: the ticker only advances if login yields
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(std::time::Duration::from_millis(1));
                loop {
                    interval.tick().await;
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
            })
        };
        tokio::task::yield_now().await;
        let before = ticks.load(Ordering::Relaxed);

        login(
            &store,
            &tokens,
            login_request(Some("slow@example.com"), Some("testpassword123")),
        )
        .await
        .unwrap();

        let after = ticks.load(Ordering::Relaxed);
        ticker.abort();
        assert!(after > before, "ticker stalled during password verification");
    }

    #[tokio::test]
    async fn test_login_failures() {
        let store = store_with_user().await;
        let tokens = TokenService::new("secret", 300, 86_400);

        let missing = login(&store, &tokens, login_request(Some("test@example.com"), None)).await;
        assert!(matches!(missing, Err(AppError::InvalidInput(_))));

        let wrong = login(
            &store,
            &tokens,
            login_request(Some("test@example.com"), Some("nope")),
        )
        .await;
        assert!(matches!(wrong, Err(AppError::Unauthorized(_))));

        let unknown = login(
            &store,
            &tokens,
            login_request(Some("who@example.com"), Some("testpassword123")),
        )
        .await;
        assert!(matches!(unknown, Err(AppError::Unauthorized(_))));
    }
}
