//! Field validators for the JSON request bodies.
//!
//! Each rule is a plain function; the message strings are load-bearing and
//! must not be reworded, clients match on them.

use bson::oid::ObjectId;

use crate::error::Error;

/// First/last name: English letters and spaces, 3 to 256 characters.
/// `field` is the display name, e.g. "First name".
pub fn validate_name(field: &str, value: &str) -> Result<(), Error> {
    if value.is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    if !value.chars().all(|it| it.is_ascii_alphabetic() || it == ' ') {
        return Err(Error::validation(format!(
            "{field} should contain only English letters"
        )));
    }
    if value.chars().count() < 3 {
        return Err(Error::validation(format!(
            "\"{field}\" must be at least 3 characters long"
        )));
    }
    if value.chars().count() > 256 {
        return Err(Error::validation(format!(
            "\"{field}\" must be at most 256 characters long"
        )));
    }

    Ok(())
}

/// Local format: exactly 11 digits, leading zero.
pub fn validate_phone_number(value: &str) -> Result<(), Error> {
    if value.is_empty() {
        return Err(Error::validation("\"Phone number\" is required"));
    }
    if !value.starts_with('0') {
        return Err(Error::validation(
            "\"Phone number\" should be in the standard format",
        ));
    }
    if value.chars().count() != 11 {
        return Err(Error::validation("\"Phone number\" should be 11 digits"));
    }

    Ok(())
}

pub fn validate_password(value: &str) -> Result<(), Error> {
    if value.is_empty() {
        return Err(Error::validation("Password is required"));
    }
    if value.chars().count() < 8 {
        return Err(Error::validation(
            "\"Password\" must be at least 8 characters long",
        ));
    }
    if value.chars().count() > 256 {
        return Err(Error::validation(
            "\"Password\" must be at most 256 characters long",
        ));
    }

    Ok(())
}

/// Required email, registration and password-reset wording.
pub fn validate_email(value: &str) -> Result<(), Error> {
    if value.is_empty() {
        return Err(Error::validation("Email is required"));
    }
    if !validator::validate_email(value) {
        return Err(Error::validation(
            "\"Email\" must be a valid email address",
        ));
    }

    Ok(())
}

/// Optional email on profile update; only the format is checked.
pub fn validate_update_email(value: &str) -> Result<(), Error> {
    if !value.is_empty() && !validator::validate_email(value) {
        return Err(Error::validation("\"Email\" should be in a standard format"));
    }

    Ok(())
}

/// Activation-code dispatch uses its own wording.
pub fn validate_activation_email(value: &str) -> Result<(), Error> {
    if value.is_empty() {
        return Err(Error::validation("\"Email\" should not be empty"));
    }
    if !validator::validate_email(value) {
        return Err(Error::validation("\"Email\" should be in a valid format"));
    }

    Ok(())
}

pub fn validate_address(value: &str) -> Result<(), Error> {
    if value.is_empty() {
        return Err(Error::validation("\"Address\" is required"));
    }
    if value.parse::<ObjectId>().is_err() {
        return Err(Error::validation("\"Address\" must be a valid id"));
    }

    Ok(())
}
