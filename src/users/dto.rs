use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, FieldError};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref DATE_RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn check_len(errors: &mut Vec<FieldError>, path: &str, value: &str, min: usize, max: usize) {
    if value.len() < min {
        errors.push(FieldError::new(
            path,
            format!("{path} must be at least {min} characters long"),
        ));
    } else if value.len() > max {
        errors.push(FieldError::new(
            path,
            format!("{path} cannot be longer than {max} characters"),
        ));
    }
}

fn check_email(errors: &mut Vec<FieldError>, email: &str) {
    if !is_valid_email(email) {
        errors.push(FieldError::new("email", "Invalid email address"));
    } else if email.len() > 99 {
        errors.push(FieldError::new(
            "email",
            "email cannot be longer than 99 characters",
        ));
    }
}

fn finish(errors: Vec<FieldError>) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Request body for registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    #[serde(default)]
    pub role: Option<String>,
    pub gender: String,
    pub address: String,
    pub joined_on: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        check_len(&mut errors, "name", &self.name, 3, 60);
        check_email(&mut errors, &self.email);
        check_len(&mut errors, "password", &self.password, 6, 20);
        if self.phone.len() != 11 {
            errors.push(FieldError::new(
                "phone",
                "Phone number must be exactly 11 characters long",
            ));
        }
        if let Some(role) = &self.role {
            check_len(&mut errors, "role", role, 1, 15);
        }
        check_len(&mut errors, "gender", &self.gender, 1, 15);
        check_len(&mut errors, "address", &self.address, 3, 99);
        if !DATE_RE.is_match(&self.joined_on) {
            errors.push(FieldError::new(
                "joinedOn",
                "Joining date must be in YYYY-MM-DD format",
            ));
        }
        finish(errors)
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        check_email(&mut errors, &self.email);
        if self.password.is_empty() {
            errors.push(FieldError::new("password", "password is required"));
        }
        finish(errors)
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl ForgotPasswordRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        check_email(&mut errors, &self.email);
        finish(errors)
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub id: Uuid,
    pub password: String,
    pub token: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        check_len(&mut errors, "password", &self.password, 6, 20);
        if self.token.is_empty() {
            errors.push(FieldError::new("token", "token is required"));
        }
        finish(errors)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

impl UpdateRoleRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        check_len(&mut errors, "role", &self.role, 1, 15);
        finish(errors)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRollRequest {
    pub roll: String,
}

impl UpdateRollRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        check_len(&mut errors, "roll", &self.roll, 1, 15);
        finish(errors)
    }
}

/// Token payload returned to clients. The refresh token travels only in
/// the httpOnly cookie, never in the body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenBody {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub meta: PageMeta,
    pub data: Vec<T>,
}
