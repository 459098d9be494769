//! Input rules shared by the JSON API and the admin forms.
//!
//! Failures are collected per field into [`FieldErrors`], which serialises
//! as `{"field": ["message", ...]}`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

pub const NIM_DIGITS: usize = 9;
pub const NAME_MAX_CHARS: usize = 50;
pub const EMAIL_MAX_CHARS: usize = 50;
pub const PASSWORD_MIN_CHARS: usize = 6;
pub const OTP_DIGITS: usize = 4;

/// Field-level validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// First message recorded for `field`.
    pub fn first(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|m| m.first()).map(String::as_str)
    }

    /// `Ok(())` when no rule failed, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Nomor Induk Mahasiswa: a 9-digit student number whose digits 3-6 name the
/// program of study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Nim(i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NimError {
    NotInteger,
    WrongLength,
}

impl Nim {
    pub fn as_i64(self) -> i64 {
        self.0
    }

    /// The 4-digit program-of-study code embedded at digits 3-6.
    pub fn program_code(self) -> String {
        self.0.to_string()[2..6].to_string()
    }

    /// Accepts a JSON number or a digit string, as HTML forms and mobile
    /// clients send either.
    pub fn from_json(value: &Value) -> Result<Self, NimError> {
        match value {
            Value::Number(n) => match n.as_u64() {
                Some(n) => n.to_string().parse(),
                None => Err(NimError::NotInteger),
            },
            Value::String(s) => s.parse(),
            _ => Err(NimError::NotInteger),
        }
    }
}

impl FromStr for Nim {
    type Err = NimError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NimError::NotInteger);
        }
        if raw.len() > 1 && raw.starts_with('0') {
            return Err(NimError::NotInteger);
        }
        if raw.len() != NIM_DIGITS {
            return Err(NimError::WrongLength);
        }
        raw.parse::<i64>().map(Nim).map_err(|_| NimError::NotInteger)
    }
}

impl TryFrom<i64> for Nim {
    type Error = NimError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        value.to_string().parse()
    }
}

impl fmt::Display for Nim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn required(field: &str) -> String {
    format!("The {} field is required.", field)
}

pub fn taken(field: &str) -> String {
    format!("The {} has already been taken.", field)
}

/// Validate the `nim` field, recording messages under `field`.
pub fn check_nim(errors: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<Nim> {
    let value = match value {
        None | Some(Value::Null) => {
            errors.add(field, required(field));
            return None;
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.add(field, required(field));
            return None;
        }
        Some(value) => value,
    };

    match Nim::from_json(value) {
        Ok(nim) => Some(nim),
        Err(NimError::NotInteger) => {
            errors.add(field, format!("The {} field must be an integer.", field));
            None
        }
        Err(NimError::WrongLength) => {
            errors.add(field, format!("The {} field must be {} digits.", field, NIM_DIGITS));
            None
        }
    }
}

/// Letters, whitespace and periods only, at most 50 characters.
pub fn check_name(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<String> {
    let name = match present(value) {
        Some(name) => name,
        None => {
            errors.add(field, required(field));
            return None;
        }
    };

    let mut ok = true;
    if !name
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace() || c == '.')
    {
        errors.add(field, format!("The {} field format is invalid.", field));
        ok = false;
    }
    if name.chars().count() > NAME_MAX_CHARS {
        errors.add(field, too_long(field, NAME_MAX_CHARS));
        ok = false;
    }
    ok.then(|| name.to_string())
}

/// A well-formed address on `domain` or one of its subdomains.
pub fn check_institution_email(
    errors: &mut FieldErrors,
    field: &str,
    value: &str,
    domain: &str,
) -> Option<String> {
    let email = value.trim();
    let mut ok = true;
    if !is_valid_email(email) {
        errors.add(field, invalid_email(field));
        ok = false;
    } else if !email_in_domain(email, domain) {
        errors.add(
            field,
            format!("The {} field must end with one of the following: {}.", field, domain),
        );
        ok = false;
    }
    if email.chars().count() > EMAIL_MAX_CHARS {
        errors.add(field, too_long(field, EMAIL_MAX_CHARS));
        ok = false;
    }
    ok.then(|| email.to_ascii_lowercase())
}

/// Required, syntactically valid email of any domain.
pub fn check_email(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<String> {
    match present(value) {
        None => {
            errors.add(field, required(field));
            None
        }
        Some(email) if !is_valid_email(email) => {
            errors.add(field, invalid_email(field));
            None
        }
        Some(email) => Some(email.to_ascii_lowercase()),
    }
}

/// At least 6 characters. When `confirmation` is given it must match.
pub fn check_password(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
    confirmation: Option<Option<&str>>,
) -> Option<String> {
    let password = match value.filter(|p| !p.is_empty()) {
        Some(password) => password,
        None => {
            errors.add(field, required(field));
            return None;
        }
    };

    let mut ok = true;
    if password.chars().count() < PASSWORD_MIN_CHARS {
        errors.add(
            field,
            format!("The {} field must be at least {} characters.", field, PASSWORD_MIN_CHARS),
        );
        ok = false;
    }
    if let Some(confirmation) = confirmation {
        match confirmation.filter(|c| !c.is_empty()) {
            None => {
                let confirmation_field = format!("{}_confirmation", field);
                errors.add(&confirmation_field, required(&confirmation_field));
                ok = false;
            }
            Some(c) if c != password => {
                errors.add(field, format!("The {} field confirmation does not match.", field));
                ok = false;
            }
            Some(_) => {}
        }
    }
    ok.then(|| password.to_string())
}

/// Exactly four ASCII digits.
pub fn check_otp(errors: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<String> {
    let raw = match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    };
    if raw.is_empty() {
        errors.add(field, required(field));
        return None;
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        errors.add(field, format!("The {} field must be a number.", field));
        return None;
    }
    if raw.len() != OTP_DIGITS {
        errors.add(field, format!("The {} field must be {} digits.", field, OTP_DIGITS));
        return None;
    }
    Some(raw)
}

pub fn check_required(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<String> {
    match present(value) {
        Some(v) => Some(v.to_string()),
        None => {
            errors.add(field, required(field));
            None
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// The address's domain equals `domain` or is a subdomain of it.
pub fn email_in_domain(email: &str, domain: &str) -> bool {
    match email.rsplit_once('@') {
        Some((_, host)) => {
            let host = host.to_ascii_lowercase();
            let domain = domain.to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{}", domain))
        }
        None => false,
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn too_long(field: &str, max: usize) -> String {
    format!("The {} field must not be greater than {} characters.", field, max)
}

fn invalid_email(field: &str) -> String {
    format!("The {} field must be a valid email address.", field)
}
