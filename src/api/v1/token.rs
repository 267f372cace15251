use jsonwebtoken::TokenData;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{error::Error, util::ObjectIdString};

use super::auth::{UserModel, UserRole};

#[derive(Clone)]
pub struct JwtState {
    validation: jsonwebtoken::Validation,
    header: jsonwebtoken::Header,

    encoding_key: jsonwebtoken::EncodingKey,
    decoding_key: jsonwebtoken::DecodingKey,

    session_expiry: Duration,
    reset_expiry: Duration,
}

impl JwtState {
    pub fn new(secret: &str, session_expiry: Duration, reset_expiry: Duration) -> Self {
        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        // expiry is checked against the claims directly, see is_expired
        validation.validate_exp = false;

        Self {
            header,
            validation,

            encoding_key: jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),

            session_expiry,
            reset_expiry,
        }
    }

    pub fn reset_expiry(&self) -> Duration {
        self.reset_expiry
    }
}

pub fn current_timestamp() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Bearer-token claims: identity and role, nothing else. The role claim is
/// advisory; the admin gate re-reads the live account.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionTokenClaims {
    pub sub: ObjectIdString,
    pub role: UserRole,
    pub exp: i64,
}

impl SessionTokenClaims {
    pub fn is_expired(&self) -> bool {
        self.exp < current_timestamp().unix_timestamp()
    }
}

pub fn generate_session_token(jwt_state: &JwtState, user: &UserModel) -> Result<String, Error> {
    let exp = (current_timestamp() + jwt_state.session_expiry).unix_timestamp();

    generate_session_token_with_exp(jwt_state, user, exp)
}

pub fn generate_session_token_with_exp(
    jwt_state: &JwtState,
    user: &UserModel,
    exp: i64,
) -> Result<String, Error> {
    jsonwebtoken::encode(
        &jwt_state.header,
        &SessionTokenClaims {
            sub: user.id.into(),
            role: user.role,
            exp,
        },
        &jwt_state.encoding_key,
    )
    .map_err(Into::into)
}

pub fn decode_session_token(
    jwt_state: &JwtState,
    token: &str,
) -> Result<TokenData<SessionTokenClaims>, Error> {
    jsonwebtoken::decode(token, &jwt_state.decoding_key, &jwt_state.validation).map_err(Into::into)
}

pub const RESET_TOKEN_PURPOSE: &str = "reset";

/// Password-reset claims. Signed with the same key as session tokens but
/// purpose-tagged, so neither kind verifies as the other.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResetTokenClaims {
    pub sub: ObjectIdString,
    pub email: String,
    pub purpose: String,
    pub exp: i64,
}

impl ResetTokenClaims {
    pub fn is_expired(&self) -> bool {
        self.exp < current_timestamp().unix_timestamp()
    }
}

pub fn generate_reset_token(
    jwt_state: &JwtState,
    user: &UserModel,
    email: &str,
) -> Result<String, Error> {
    let exp = (current_timestamp() + jwt_state.reset_expiry).unix_timestamp();

    generate_reset_token_with_exp(jwt_state, user, email, exp)
}

pub fn generate_reset_token_with_exp(
    jwt_state: &JwtState,
    user: &UserModel,
    email: &str,
    exp: i64,
) -> Result<String, Error> {
    jsonwebtoken::encode(
        &jwt_state.header,
        &ResetTokenClaims {
            sub: user.id.into(),
            email: email.to_string(),
            purpose: RESET_TOKEN_PURPOSE.to_string(),
            exp,
        },
        &jwt_state.encoding_key,
    )
    .map_err(Into::into)
}

pub fn decode_reset_token(
    jwt_state: &JwtState,
    token: &str,
) -> Result<TokenData<ResetTokenClaims>, Error> {
    let token: TokenData<ResetTokenClaims> =
        jsonwebtoken::decode(token, &jwt_state.decoding_key, &jwt_state.validation)?;

    if token.claims.purpose != RESET_TOKEN_PURPOSE {
        return Err(Error::Jwt(
            jsonwebtoken::errors::ErrorKind::InvalidToken.into(),
        ));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use bson::oid::ObjectId;
    use rust_decimal::Decimal;

    use super::*;

    fn jwt_state() -> JwtState {
        JwtState::new("test-secret", Duration::days(1), Duration::minutes(15))
    }

    fn user_model() -> UserModel {
        let now = bson::DateTime::now();

        UserModel {
            id: ObjectId::new(),
            phone_number: "01234567890".to_string(),
            email: Some("jane@x.com".to_string()),
            password: String::new(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            role: UserRole::Customer,
            wallet: Decimal::ZERO,
            orders_count: 0,
            is_deleted: false,
            is_email_activated: false,
            email_activation_code: None,
            email_activation_expires_at: None,
            is_phone_activated: false,
            phone_activation_code: None,
            phone_activation_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_session_token_roundtrip() {
        let jwt = jwt_state();
        let user = user_model();

        let token = generate_session_token(&jwt, &user).unwrap();

        let token = decode_session_token(&jwt, &token).unwrap();
        assert_eq!(token.claims.sub, user.id);
        assert_eq!(token.claims.role, user.role);
        assert!(!token.claims.is_expired());
    }

    #[test]
    fn test_session_token_expired() {
        let jwt = jwt_state();
        let user = user_model();

        let token = generate_session_token_with_exp(
            &jwt,
            &user,
            (current_timestamp() + Duration::seconds(-1)).unix_timestamp(),
        )
        .unwrap();

        let token = decode_session_token(&jwt, &token).unwrap();
        assert!(token.claims.is_expired());
    }

    #[test]
    fn test_session_token_wrong_secret() {
        let jwt = jwt_state();
        let other = JwtState::new("other-secret", Duration::days(1), Duration::minutes(15));
        let user = user_model();

        let token = generate_session_token(&jwt, &user).unwrap();

        decode_session_token(&other, &token).unwrap_err();
    }

    #[test]
    fn test_reset_token_roundtrip() {
        let jwt = jwt_state();
        let user = user_model();

        let token = generate_reset_token(&jwt, &user, "jane@x.com").unwrap();

        let token = decode_reset_token(&jwt, &token).unwrap();
        assert_eq!(token.claims.sub, user.id);
        assert_eq!(token.claims.email, "jane@x.com");
        assert_eq!(token.claims.purpose, RESET_TOKEN_PURPOSE);
        assert!(!token.claims.is_expired());
    }

    #[test]
    fn test_reset_token_expired() {
        let jwt = jwt_state();
        let user = user_model();

        let token = generate_reset_token_with_exp(
            &jwt,
            &user,
            "jane@x.com",
            (current_timestamp() + Duration::seconds(-1)).unix_timestamp(),
        )
        .unwrap();

        let token = decode_reset_token(&jwt, &token).unwrap();
        assert!(token.claims.is_expired());
    }

    #[test]
    fn test_token_kinds_do_not_cross_verify() {
        let jwt = jwt_state();
        let user = user_model();

        // a session token is not a reset token
        let session = generate_session_token(&jwt, &user).unwrap();
        decode_reset_token(&jwt, &session).unwrap_err();

        // and a reset token is not a session token
        let reset = generate_reset_token(&jwt, &user, "jane@x.com").unwrap();
        decode_session_token(&jwt, &reset).unwrap_err();
    }
}
