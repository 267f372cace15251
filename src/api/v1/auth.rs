use argon2::Argon2;
use axum::{
    extract::{FromRef, FromRequestParts, State},
    headers::{authorization::Bearer, Authorization},
    http::request::Parts,
    Json, RequestPartsExt, TypedHeader,
};
use bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use time::OffsetDateTime;

use crate::{
    error::Error,
    mongo_ext::Collection,
    util::{hash_password, verify_password, Envelope, FormattedDateTime, ObjectIdString},
    validate,
};

use super::token::{decode_session_token, generate_session_token, JwtState};

#[derive(Clone)]
pub struct UserCollection(pub Collection<UserModel>);

impl std::ops::Deref for UserCollection {
    type Target = Collection<UserModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The persisted account document, camelCase on the wire to match the
/// legacy collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password: String,

    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,

    #[serde(default)]
    pub wallet: Decimal,
    #[serde(default)]
    pub orders_count: i64,

    #[serde(default)]
    pub is_deleted: bool,

    #[serde(default)]
    pub is_email_activated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_activation_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_activation_expires_at: Option<bson::DateTime>,

    // the phone pair mirrors the email pair but no operation drives it yet
    #[serde(default)]
    pub is_phone_activated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_activation_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_activation_expires_at: Option<bson::DateTime>,

    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    Customer,
}

/// First gate stage: a verified, unexpired bearer token. A missing header is
/// unauthenticated, a bad or expired token is forbidden.
#[derive(Debug)]
pub struct UserAccess {
    pub id: ObjectId,
    pub role: UserRole,
}

impl UserAccess {
    pub fn from_token(jwt_state: &JwtState, token: &str) -> Result<Self, Error> {
        let token = decode_session_token(jwt_state, token)
            .map_err(|_| Error::Forbidden)
            .tap_err(|_| tracing::debug!("session token did not verify"))?;

        if token.claims.is_expired() {
            return Err(Error::Forbidden);
        }

        Ok(Self {
            id: token.claims.sub.0,
            role: token.claims.role,
        })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for UserAccess
where
    JwtState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(token)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::Unauthenticated)?;

        let jwt = JwtState::from_ref(state);

        Self::from_token(&jwt, token.token())
    }
}

/// Second gate stage: the live account must exist and hold the admin role.
/// The token's role claim is not trusted; the store decides.
#[derive(Debug)]
pub struct AdminAccess {
    pub id: ObjectId,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminAccess
where
    JwtState: FromRef<S>,
    UserCollection: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let access = parts.extract_with_state::<UserAccess, _>(state).await?;
        let users = UserCollection::from_ref(state);

        let user = users
            .find_one_by_id(access.id)
            .await?
            .ok_or_else(|| Error::validation("Access denied"))
            .tap_err(|_| tracing::debug!("token for an account that no longer exists"))?;

        if user.role != UserRole::Admin {
            return Err(Error::validation("Access denied"));
        }

        Ok(Self { id: access.id })
    }
}

/// Account view returned to clients; the password digest and pending
/// activation codes stay server-side.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: ObjectIdString,

    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,

    pub wallet: Decimal,
    pub orders_count: i64,

    pub is_email_activated: bool,
    pub is_phone_activated: bool,

    pub created_at: FormattedDateTime,
    pub updated_at: FormattedDateTime,
}

impl From<UserModel> for UserResponse {
    fn from(value: UserModel) -> Self {
        Self {
            id: value.id.into(),
            phone_number: value.phone_number,
            email: value.email,
            first_name: value.first_name,
            last_name: value.last_name,
            role: value.role,
            wallet: value.wallet,
            orders_count: value.orders_count,
            is_email_activated: value.is_email_activated,
            is_phone_activated: value.is_phone_activated,
            created_at: value.created_at.into(),
            updated_at: value.updated_at.into(),
        }
    }
}

/// Phone numbers are reserved store-wide, soft-deleted accounts included.
pub async fn ensure_phone_unique(
    users: &UserCollection,
    phone_number: &str,
    exclude: Option<ObjectId>,
) -> Result<(), Error> {
    let mut filter = bson::doc! { "phoneNumber": phone_number };
    if let Some(id) = exclude {
        filter.insert("_id", bson::doc! { "$ne": id });
    }

    let count = users.count_documents(filter, None).await?;

    if count > 0 {
        return Err(Error::validation("Phone number is already in use"));
    }

    Ok(())
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[tracing::instrument(
    skip_all,
    fields(
        phone = %request.phone_number,
    )
)]
pub async fn register(
    State(users): State<UserCollection>,
    State(argon): State<Argon2<'static>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Envelope<()>>, Error> {
    validate::validate_name("First name", &request.first_name)?;
    validate::validate_name("Last name", &request.last_name)?;
    validate::validate_phone_number(&request.phone_number)?;
    validate::validate_password(&request.password)?;
    validate::validate_email(&request.email)?;

    // check-then-insert leaves a race window; the unique index backstops it
    ensure_phone_unique(&users, &request.phone_number, None).await?;

    let now = OffsetDateTime::now_utc();
    let model = UserModel {
        id: ObjectId::new(),
        phone_number: request.phone_number,
        email: Some(request.email),
        password: hash_password(&argon, &request.password)?,
        first_name: request.first_name,
        last_name: request.last_name,
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
        created_at: now.into(),
        updated_at: now.into(),
    };

    users.insert_one(&model, None).await?;

    Ok(Json(Envelope::message(
        "Your account has been created successfully",
    )))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub token: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub id: ObjectIdString,
    pub authenticated: bool,
    pub wallet: Decimal,
}

#[tracing::instrument(skip_all)]
pub async fn login(
    State(users): State<UserCollection>,
    State(argon): State<Argon2<'static>>,
    State(jwt_state): State<JwtState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Envelope<LoginData>>, Error> {
    let (email, password) = match (request.email, request.password) {
        (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
            (email, password)
        }
        _ => return Err(Error::validation("Email and password are required")),
    };

    let user = users
        .find_one(
            bson::doc! {
                "email": &email,
                "isDeleted": { "$ne": true },
            },
            None,
        )
        .await?;

    // unknown email and wrong password are indistinguishable to the caller
    let user = match user {
        Some(user) if verify_password(&argon, &password, &user.password) => user,
        _ => return Err(Error::InvalidCredentials),
    };

    let token = generate_session_token(&jwt_state, &user)?;

    Ok(Json(Envelope::data(LoginData {
        token,
        first_name: user.first_name,
        last_name: user.last_name,
        role: user.role,
        id: user.id.into(),
        authenticated: true,
        wallet: user.wallet,
    })))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::{extract::FromRequestParts, Json};

    use crate::{
        api::v1::{tests::bootstrap, token},
        error::Error,
    };

    use super::UserRole;

    fn register_request(phone: &str, email: &str) -> super::RegisterRequest {
        super::RegisterRequest {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            phone_number: phone.to_string(),
            password: "Password123!".to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register() {
        let bootstrap = bootstrap().await;

        let Json(envelope) = super::register(
            bootstrap.users(),
            bootstrap.argon(),
            Json(register_request("01234567890", "jane@x.com")),
        )
        .await
        .unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.code, 200);
        assert_eq!(
            envelope.message,
            "Your account has been created successfully"
        );
    }

    #[tokio::test]
    async fn test_register_duplicate_phone() {
        let bootstrap = bootstrap().await;

        super::register(
            bootstrap.users(),
            bootstrap.argon(),
            Json(register_request("01234567890", "jane@x.com")),
        )
        .await
        .unwrap();

        // same phone, different email
        let error = super::register(
            bootstrap.users(),
            bootstrap.argon(),
            Json(register_request("01234567890", "other@x.com")),
        )
        .await
        .unwrap_err();

        assert_matches!(
            error,
            Error::Validation(message) if message == "Phone number is already in use"
        );
    }

    #[tokio::test]
    async fn test_register_validation_messages() {
        let bootstrap = bootstrap().await;

        let mut request = register_request("01234567890", "jane@x.com");
        request.first_name = "J".to_string();

        let error = super::register(bootstrap.users(), bootstrap.argon(), Json(request))
            .await
            .unwrap_err();
        assert_matches!(
            error,
            Error::Validation(message)
                if message == "\"First name\" must be at least 3 characters long"
        );

        let mut request = register_request("1234567890", "jane@x.com");
        request.phone_number = "1234567890".to_string();

        let error = super::register(bootstrap.users(), bootstrap.argon(), Json(request))
            .await
            .unwrap_err();
        assert_matches!(
            error,
            Error::Validation(message)
                if message == "\"Phone number\" should be in the standard format"
        );
    }

    #[tokio::test]
    async fn test_login() {
        let bootstrap = bootstrap().await;

        super::register(
            bootstrap.users(),
            bootstrap.argon(),
            Json(register_request("01234567890", "jane@x.com")),
        )
        .await
        .unwrap();

        let Json(envelope) = super::login(
            bootstrap.users(),
            bootstrap.argon(),
            bootstrap.jwt_state(),
            Json(super::LoginRequest {
                email: Some("jane@x.com".to_string()),
                password: Some("Password123!".to_string()),
            }),
        )
        .await
        .unwrap();

        let data = envelope.data.unwrap();
        assert!(data.authenticated);
        assert_eq!(data.first_name, "Jane");
        assert_eq!(data.role, UserRole::Customer);

        // the issued token verifies and carries the account's claims
        let access =
            super::UserAccess::from_token(&bootstrap.app_state.jwt_state, &data.token).unwrap();
        assert_eq!(access.id, data.id.0);
        assert_eq!(access.role, UserRole::Customer);
    }

    #[tokio::test]
    async fn test_login_does_not_reveal_which_credential_failed() {
        let bootstrap = bootstrap().await;

        super::register(
            bootstrap.users(),
            bootstrap.argon(),
            Json(register_request("01234567890", "jane@x.com")),
        )
        .await
        .unwrap();

        let wrong_password = super::login(
            bootstrap.users(),
            bootstrap.argon(),
            bootstrap.jwt_state(),
            Json(super::LoginRequest {
                email: Some("jane@x.com".to_string()),
                password: Some("wrong".to_string()),
            }),
        )
        .await
        .unwrap_err();

        let unknown_email = super::login(
            bootstrap.users(),
            bootstrap.argon(),
            bootstrap.jwt_state(),
            Json(super::LoginRequest {
                email: Some("nobody@x.com".to_string()),
                password: Some("Password123!".to_string()),
            }),
        )
        .await
        .unwrap_err();

        assert_matches!(wrong_password, Error::InvalidCredentials);
        assert_matches!(unknown_email, Error::InvalidCredentials);
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.to_string(), "Invalid email or password");
        assert_eq!(wrong_password.status(), unknown_email.status());
    }

    #[tokio::test]
    async fn test_login_missing_fields() {
        let bootstrap = bootstrap().await;

        let error = super::login(
            bootstrap.users(),
            bootstrap.argon(),
            bootstrap.jwt_state(),
            Json(super::LoginRequest {
                email: Some("jane@x.com".to_string()),
                password: None,
            }),
        )
        .await
        .unwrap_err();

        assert_matches!(
            error,
            Error::Validation(message) if message == "Email and password are required"
        );
    }

    #[tokio::test]
    async fn test_user_access() {
        let bootstrap = bootstrap().await;

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .header(
                "Authorization",
                format!("Bearer {}", bootstrap.user_token()),
            )
            .body(())
            .unwrap()
            .into_parts();

        let access = super::UserAccess::from_request_parts(&mut parts, &bootstrap.app_state)
            .await
            .unwrap();

        assert_eq!(access.id, bootstrap.user_id());
    }

    #[tokio::test]
    async fn test_user_access_missing_header() {
        let bootstrap = bootstrap().await;

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .body(())
            .unwrap()
            .into_parts();

        let error = super::UserAccess::from_request_parts(&mut parts, &bootstrap.app_state)
            .await
            .unwrap_err();

        assert_matches!(error, Error::Unauthenticated);
    }

    #[tokio::test]
    async fn test_user_access_invalid_token() {
        let bootstrap = bootstrap().await;

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .header("Authorization", "Bearer not-a-token")
            .body(())
            .unwrap()
            .into_parts();

        let error = super::UserAccess::from_request_parts(&mut parts, &bootstrap.app_state)
            .await
            .unwrap_err();

        assert_matches!(error, Error::Forbidden);
    }

    #[tokio::test]
    async fn test_user_access_expired_token() {
        let bootstrap = bootstrap().await;

        let token = token::generate_session_token_with_exp(
            &bootstrap.app_state.jwt_state,
            &bootstrap.user_model,
            0,
        )
        .unwrap();

        let error = super::UserAccess::from_token(&bootstrap.app_state.jwt_state, &token)
            .unwrap_err();

        assert_matches!(error, Error::Forbidden);
    }

    #[tokio::test]
    async fn test_admin_access() {
        let bootstrap = bootstrap().await;

        // bootstrap's first account is an admin
        let admin = bootstrap.admin_access().await.unwrap();
        assert_eq!(admin.id, bootstrap.user_id());
    }

    #[tokio::test]
    async fn test_admin_access_rejects_customer() {
        let bootstrap = bootstrap().await;
        let customer = bootstrap
            .derive("01112223334", "customer@x.com", "password", UserRole::Customer)
            .await;

        let error = customer.admin_access().await.unwrap_err();

        assert_matches!(error, Error::Validation(message) if message == "Access denied");
    }

    #[tokio::test]
    async fn test_admin_access_does_not_trust_role_claim() {
        let bootstrap = bootstrap().await;
        let customer = bootstrap
            .derive("01112223334", "customer@x.com", "password", UserRole::Customer)
            .await;

        // forge a token whose role claim says admin; the store read wins
        let mut forged = customer.user_model.clone();
        forged.role = UserRole::Admin;
        let token =
            token::generate_session_token(&bootstrap.app_state.jwt_state, &forged).unwrap();

        let error = crate::api::v1::tests::admin_access_with_token(&bootstrap.app_state, &token)
            .await
            .unwrap_err();

        assert_matches!(error, Error::Validation(message) if message == "Access denied");
    }
}
