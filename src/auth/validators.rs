// src/auth/validators.rs

use super::models::{GooglePayload, RequestOtpPayload, VerifyOtpPayload};
use crate::common::validation::{is_valid_date, is_valid_email};
use crate::common::{ValidationResult, Validator};

pub struct AuthValidator;

fn check_identity(
    result: &mut ValidationResult,
    email: &str,
    name: Option<&str>,
    dob: Option<&str>,
) {
    if !is_valid_email(email.trim()) {
        result.add_error("email", "Invalid email address");
    }

    if let Some(name) = name {
        let len = name.trim().chars().count();
        if !(2..=60).contains(&len) {
            result.add_error("name", "Name must be between 2 and 60 characters");
        }
    }

    if let Some(dob) = dob {
        if !is_valid_date(dob) {
            result.add_error("dob", "Date of birth must be YYYY-MM-DD");
        }
    }
}

impl Validator<RequestOtpPayload> for AuthValidator {
    fn validate(&self, data: &RequestOtpPayload) -> ValidationResult {
        let mut result = ValidationResult::new();
        check_identity(&mut result, &data.email, data.name.as_deref(), data.dob.as_deref());
        result
    }
}

impl Validator<VerifyOtpPayload> for AuthValidator {
    fn validate(&self, data: &VerifyOtpPayload) -> ValidationResult {
        let mut result = ValidationResult::new();
        check_identity(&mut result, &data.email, data.name.as_deref(), data.dob.as_deref());

        let otp_len = data.otp.trim().chars().count();
        if !(4..=8).contains(&otp_len) {
            result.add_error("otp", "OTP must be between 4 and 8 characters");
        }
        result
    }
}

impl Validator<GooglePayload> for AuthValidator {
    fn validate(&self, data: &GooglePayload) -> ValidationResult {
        let mut result = ValidationResult::new();
        if data.id_token.trim().len() < 10 {
            result.add_error("idToken", "idToken is required");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::OtpPurpose;

    fn request(email: &str, name: Option<&str>, dob: Option<&str>) -> RequestOtpPayload {
        RequestOtpPayload {
            purpose: OtpPurpose::Signup,
            name: name.map(str::to_string),
            dob: dob.map(str::to_string),
            email: email.to_string(),
        }
    }

    #[test]
    fn test_request_otp_rules() {
        assert!(AuthValidator.validate(&request("a@x.com", None, None)).is_valid);
        assert!(AuthValidator
            .validate(&request(" A@X.com ", Some("Ann"), Some("1990-01-31")))
            .is_valid);

        let bad = AuthValidator.validate(&request("nope", Some("A"), Some("31/01/1990")));
        let fields: Vec<&str> = bad.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "name", "dob"]);
    }

    #[test]
    fn test_verify_otp_length() {
        let mut payload = VerifyOtpPayload {
            purpose: OtpPurpose::Login,
            name: None,
            dob: None,
            email: "a@x.com".to_string(),
            otp: "123".to_string(),
            remember: None,
        };
        assert!(!AuthValidator.validate(&payload).is_valid);
        payload.otp = "123456".to_string();
        assert!(AuthValidator.validate(&payload).is_valid);
        payload.otp = "123456789".to_string();
        assert!(!AuthValidator.validate(&payload).is_valid);
    }

    #[test]
    fn test_google_token_required() {
        let short = GooglePayload {
            id_token: "abc".to_string(),
            remember: None,
        };
        assert!(!AuthValidator.validate(&short).is_valid);
    }
}
