use crate::{
    error::{AppError, AppResult},
    models::User,
    schema::users,
    DbPool,
};
use argon2::Argon2;
use axum::{
    async_trait,
    extract::{FromRequest, RequestParts},
    headers::{authorization::Bearer, Authorization},
    http::StatusCode,
    Extension, TypedHeader,
};
use diesel::{OptionalExtension, QueryDsl};
use diesel_async::RunQueryDsl;
use jsonwebtoken::{
    errors::Result as JwtResult, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use password_hash::{
    self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

// one day
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

pub fn hash_password(password: impl AsRef<[u8]>) -> password_hash::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_ref(), &salt)
        .map(|h| h.to_string())
}

pub fn verify_password(
    password: impl AsRef<[u8]>,
    password_hash: impl AsRef<str>,
) -> password_hash::Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash.as_ref())?;
    Ok(Argon2::default()
        .verify_password(password.as_ref(), &parsed_hash)
        .is_ok())
}

pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// `is_staff` is informational for clients. Requests are authorized against
/// the account row, not the claim.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub is_staff: bool,
    pub exp: u64,
}

impl AuthKeys {
    pub fn from_base64_secret(secret: &str) -> JwtResult<AuthKeys> {
        Ok(AuthKeys {
            encoding: EncodingKey::from_base64_secret(secret)?,
            decoding: DecodingKey::from_base64_secret(secret)?,
        })
    }

    pub fn generate_jwt(&self, user: &User, exp: Duration) -> JwtResult<String> {
        self.encode(&Claims {
            user_id: user.id,
            is_staff: user.is_staff,
            exp: jsonwebtoken::get_current_timestamp() + exp.as_secs(),
        })
    }

    pub fn encode(&self, claims: &Claims) -> JwtResult<String> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding)
    }

    pub fn validate_jwt(&self, token: &str) -> JwtResult<TokenData<Claims>> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
    }
}

/// The signed-in caller, taken from an `Authorization: Bearer` header and
/// checked against the current account row on every request.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i32,
    pub is_staff: bool,
}

impl AuthUser {
    pub fn owns(&self, owner_id: i32) -> bool {
        self.user_id == owner_id
    }

    pub fn require_staff(&self) -> AppResult<()> {
        if self.is_staff {
            Ok(())
        } else {
            Err(AppError::from(StatusCode::FORBIDDEN, "staff only"))
        }
    }
}

#[async_trait]
impl<B> FromRequest<B> for AuthUser
where
    B: Send,
{
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request(req)
                .await
                .map_err(|_| AppError::from(StatusCode::UNAUTHORIZED, "missing bearer token"))?;
        let Extension(keys) = Extension::<Arc<AuthKeys>>::from_request(req)
            .await
            .map_err(|_| anyhow::anyhow!("auth keys extension is missing"))?;

        let data = keys
            .validate_jwt(bearer.token())
            .map_err(|_| AppError::from(StatusCode::UNAUTHORIZED, "invalid or expired token"))?;
        let user_id = data.claims.user_id;

        let Extension(pool) = Extension::<DbPool>::from_request(req)
            .await
            .map_err(|_| anyhow::anyhow!("database pool extension is missing"))?;
        let conn = &mut pool.get().await?;
        let account = users::table
            .find(user_id)
            .select((users::is_active, users::is_staff))
            .first::<(bool, bool)>(conn)
            .await
            .optional()?;

        match account {
            Some((true, is_staff)) => Ok(AuthUser { user_id, is_staff }),
            _ => {
                tracing::debug!(user_id, "token for an inactive or deleted account");
                Err(AppError::from(
                    StatusCode::UNAUTHORIZED,
                    "the account is inactive or no longer exists",
                ))
            }
        }
    }
}

pub struct StaffOnly(pub AuthUser);

#[async_trait]
impl<B> FromRequest<B> for StaffOnly
where
    B: Send,
{
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request(req).await?;
        user.require_staff()?;
        Ok(StaffOnly(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // base64 of "a test secret that is long enough"
    const SECRET: &str = "YSB0ZXN0IHNlY3JldCB0aGF0IGlzIGxvbmcgZW5vdWdo";

    #[test]
    fn passwords_verify_against_their_hash() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn garbage_hashes_are_errors() {
        assert!(verify_password("hunter22", "not a phc string").is_err());
    }

    #[test]
    fn tokens_carry_the_user_and_staff_flag() {
        let keys = AuthKeys::from_base64_secret(SECRET).unwrap();
        let token = keys
            .encode(&Claims {
                user_id: 7,
                is_staff: true,
                exp: jsonwebtoken::get_current_timestamp() + 60,
            })
            .unwrap();

        let claims = keys.validate_jwt(&token).unwrap().claims;
        assert_eq!(claims.user_id, 7);
        assert!(claims.is_staff);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = AuthKeys::from_base64_secret(SECRET).unwrap();
        let token = keys
            .encode(&Claims {
                user_id: 7,
                is_staff: false,
                exp: jsonwebtoken::get_current_timestamp() - 3600,
            })
            .unwrap();

        assert!(keys.validate_jwt(&token).is_err());
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let keys = AuthKeys::from_base64_secret(SECRET).unwrap();
        let other = AuthKeys::from_base64_secret("b3RoZXIgc2VjcmV0").unwrap();
        let token = other
            .encode(&Claims {
                user_id: 1,
                is_staff: true,
                exp: jsonwebtoken::get_current_timestamp() + 60,
            })
            .unwrap();

        assert!(keys.validate_jwt(&token).is_err());
    }

    #[test]
    fn secrets_must_be_base64() {
        assert!(AuthKeys::from_base64_secret("not base64!!").is_err());
    }

    #[test]
    fn only_staff_pass_the_staff_check() {
        let member = AuthUser {
            user_id: 3,
            is_staff: false,
        };
        assert!(member.require_staff().is_err());
        assert!(member.owns(3));
        assert!(!member.owns(4));
    }
}
