use argon2::Argon2;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use time::{Duration, OffsetDateTime};

use crate::{
    error::Error,
    mail::Mailer,
    util::{generate_activation_code, hash_password, Envelope},
    validate,
};

use super::{
    auth::{UserAccess, UserCollection},
    token::{decode_reset_token, generate_reset_token, JwtState},
};

const ACTIVATION_CODE_LENGTH: usize = 6;
const ACTIVATION_CODE_EXPIRY: Duration = Duration::minutes(15);

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SendEmailActivationCodeRequest {
    #[serde(default)]
    pub email: String,
}

#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn send_email_activation_code(
    State(users): State<UserCollection>,
    State(mailer): State<Mailer>,
    Json(request): Json<SendEmailActivationCodeRequest>,
) -> Result<Json<Envelope<()>>, Error> {
    validate::validate_activation_email(&request.email)?;

    let code = generate_activation_code(ACTIVATION_CODE_LENGTH);
    let expires_at = OffsetDateTime::now_utc() + ACTIVATION_CODE_EXPIRY;

    users
        .find_one_and_update(
            bson::doc! {
                "email": &request.email,
                "isDeleted": { "$ne": true },
            },
            bson::doc! {
                "$set": {
                    "emailActivationCode": &code,
                    "emailActivationExpiresAt": bson::DateTime::from(expires_at),
                }
            },
            None,
        )
        .await?
        .ok_or_else(|| Error::validation("Email is invalid"))
        .tap_err(|_| tracing::debug!("activation code requested for an unknown email"))?;

    mailer.send_detached(
        "Activation code for password reset".to_string(),
        format!("Your activation code is: {}", code),
        request.email,
    );

    Ok(Json(Envelope::message(
        "An activation code has been sent to you. Please use this code to set your new password.",
    )))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EmailActivationRequest {
    #[serde(default)]
    pub email_activation_code: Option<String>,
}

#[tracing::instrument(skip_all, fields(user = ?user))]
pub async fn email_activation(
    user: UserAccess,
    State(users): State<UserCollection>,
    Json(request): Json<EmailActivationRequest>,
) -> Result<Json<Envelope<()>>, Error> {
    let code = match request.email_activation_code {
        None => return Err(Error::validation("\"Email activation code\" is required")),
        Some(code) if code.is_empty() => {
            return Err(Error::validation(
                "\"Email activation code\" should not be empty",
            ))
        }
        Some(code) => code,
    };

    let account = users
        .find_one_by_id(user.id)
        .await?
        .ok_or_else(|| Error::Internal(anyhow::anyhow!("account {} does not exist", user.id)))?;

    match account.email_activation_code {
        Some(expected) if expected == code => {}
        _ => return Err(Error::validation("The code is invalid")),
    }

    let expired = account
        .email_activation_expires_at
        .map(|it| OffsetDateTime::from(it) < OffsetDateTime::now_utc())
        .unwrap_or(true);

    if expired {
        return Err(Error::validation("The code has expired. Please try again."));
    }

    // clearing the code makes it single-use
    users
        .update_one_by_id(
            user.id,
            bson::doc! {
                "$set": {
                    "isEmailActivated": true,
                    "updatedAt": bson::DateTime::from(OffsetDateTime::now_utc()),
                },
                "$unset": {
                    "emailActivationCode": "",
                    "emailActivationExpiresAt": "",
                },
            },
        )
        .await?;

    Ok(Json(Envelope::message(
        "Your email has been successfully verified",
    )))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RequestPasswordResetRequest {
    #[serde(default)]
    pub email: String,
}

#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn request_password_reset(
    State(users): State<UserCollection>,
    State(jwt_state): State<JwtState>,
    State(mailer): State<Mailer>,
    Json(request): Json<RequestPasswordResetRequest>,
) -> Result<Json<Envelope<()>>, Error> {
    validate::validate_email(&request.email)?;

    let user = users
        .find_one(
            bson::doc! {
                "email": &request.email,
                "isDeleted": { "$ne": true },
            },
            None,
        )
        .await?
        .ok_or_else(|| Error::validation("Email not found"))?;

    let token = generate_reset_token(&jwt_state, &user, &request.email)?;

    // awaited on purpose: the caller should learn when the mail bounced
    mailer
        .send(
            "Password Reset Request",
            &format!(
                "Here is your password reset token: {}. It is valid for {} minutes.",
                token,
                jwt_state.reset_expiry().whole_minutes(),
            ),
            &request.email,
        )
        .await?;

    Ok(Json(Envelope::message(
        "A password reset token has been sent to your email.",
    )))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub reset_token: String,
    #[serde(default)]
    pub new_password: String,
}

#[tracing::instrument(skip_all)]
pub async fn reset_password(
    State(users): State<UserCollection>,
    State(argon): State<Argon2<'static>>,
    State(jwt_state): State<JwtState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<Envelope<()>>, Error> {
    if request.reset_token.is_empty() {
        return Err(Error::validation("\"Reset token\" is required"));
    }
    validate::validate_password(&request.new_password)?;

    let token = decode_reset_token(&jwt_state, &request.reset_token)
        .ok()
        .filter(|it| !it.claims.is_expired())
        .ok_or_else(|| Error::validation("Invalid or expired reset token"))
        .tap_err(|_| tracing::debug!("reset token did not verify"))?;

    let user = users
        .find_one_by_id(token.claims.sub.0)
        .await?
        .ok_or_else(|| Error::validation("User not found"))?;

    let password = hash_password(&argon, &request.new_password)?;

    users
        .update_one_by_id(
            user.id,
            bson::doc! {
                "$set": {
                    "password": password,
                    "updatedAt": bson::DateTime::from(OffsetDateTime::now_utc()),
                }
            },
        )
        .await?;

    Ok(Json(Envelope::message(
        "Password has been successfully updated",
    )))
}
