use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, errors::Result as JWTResult, DecodingKey, EncodingKey,
    Header, TokenData, Validation,
};

use crate::config::Constants;
use crate::structure::users::Claims;

pub fn create_jwt(email: &str, secret: &str) -> JWTResult<String> {
    let expiration = (Utc::now() + Duration::hours(Constants::TOKEN_TTL_HOURS)).timestamp();
    let claims = Claims {
        email: email.to_string(),
        exp: expiration as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn verify_jwt(token: &str, secret: &str) -> JWTResult<TokenData<Claims>> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
}

/// Accepts either a raw token or `Bearer <token>`.
pub fn token_from_header(value: &str) -> Option<&str> {
    let value = value.trim_start();
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then_some(token)
}

/// Why a presented token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Missing,
    Expired,
    Invalid,
}

impl TokenRejection {
    pub fn message(self) -> &'static str {
        match self {
            TokenRejection::Missing => "Token missing",
            TokenRejection::Expired => "Token expired",
            TokenRejection::Invalid => "Invalid token",
        }
    }
}

/// Validates an `Authorization` header value and returns the token's email.
pub fn authenticate(header: Option<&str>, secret: &str) -> Result<String, TokenRejection> {
    let token = header
        .and_then(token_from_header)
        .ok_or(TokenRejection::Missing)?;
    match verify_jwt(token, secret) {
        Ok(data) => Ok(data.claims.email),
        Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => Err(TokenRejection::Expired),
        Err(_) => Err(TokenRejection::Invalid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_token_verifies() {
        let token = create_jwt("a@b.c", SECRET).unwrap();
        let data = verify_jwt(&token, SECRET).unwrap();
        assert_eq!(data.claims.email, "a@b.c");
        let ttl = data.claims.exp as i64 - Utc::now().timestamp();
        assert!(ttl > 7000 && ttl <= 7200);
    }

    #[test]
    fn header_forms() {
        assert_eq!(token_from_header("Bearer abc"), Some("abc"));
        assert_eq!(token_from_header("abc"), Some("abc"));
        assert_eq!(token_from_header("Bearer "), None);
        assert_eq!(token_from_header("  Bearer   "), None);
        assert_eq!(token_from_header(" Bearer abc "), Some("abc"));
        assert_eq!(token_from_header(""), None);
    }

    #[test]
    fn rejections() {
        assert_eq!(authenticate(None, SECRET), Err(TokenRejection::Missing));
        assert_eq!(
            authenticate(Some("Bearer not-a-jwt"), SECRET),
            Err(TokenRejection::Invalid)
        );

        let token = create_jwt("a@b.c", "other-secret").unwrap();
        assert_eq!(
            authenticate(Some(&token), SECRET),
            Err(TokenRejection::Invalid)
        );

        let expired = encode(
            &Header::default(),
            &Claims {
                email: "a@b.c".into(),
                exp: (Utc::now().timestamp() - 3600) as usize,
            },
            &EncodingKey::from_secret(SECRET.as_ref()),
        )
        .unwrap();
        assert_eq!(
            authenticate(Some(&format!("Bearer {expired}")), SECRET),
            Err(TokenRejection::Expired)
        );

        let token = create_jwt("a@b.c", SECRET).unwrap();
        assert_eq!(authenticate(Some(&token), SECRET), Ok("a@b.c".to_string()));
    }
}
