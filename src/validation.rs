use chrono::NaiveDate;
use regex::Regex;

use crate::models::{CreateLeadRequest, EmploymentType, NewLead};

/// Minimum monthly income accepted at intake, before any lender-specific
/// rules are consulted.
pub const MIN_INCOME_THRESHOLD: f64 = 15000.0;

/// Validates an intake payload field by field.
///
/// Unlike most error paths in this service, validation does not stop at the
/// first failure: every offending field is collected as a
/// `"field: message"` entry so the caller can fix the whole payload in one
/// round trip. Returns the typed lead on success.
pub fn validate_lead_payload(payload: &CreateLeadRequest) -> Result<NewLead, Vec<String>> {
    let mut errors = Vec::new();

    let phone_regex = Regex::new(r"^\d{10}$").unwrap();
    if !phone_regex.is_match(&payload.phone) {
        errors.push("phone: Phone must be 10 digits".to_string());
    }

    // RFC 5322 simplified email regex
    let email_regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap();
    if !email_regex.is_match(&payload.email) {
        errors.push("email: Invalid email format".to_string());
    }

    if payload.first_name.trim().is_empty() {
        errors.push("firstName: First name is required".to_string());
    }
    if payload.last_name.trim().is_empty() {
        errors.push("lastName: Last name is required".to_string());
    }

    let date_regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    let date_of_birth = if date_regex.is_match(&payload.date_of_birth) {
        match NaiveDate::parse_from_str(&payload.date_of_birth, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.push("dateOfBirth: Date must be a valid calendar date".to_string());
                None
            }
        }
    } else {
        errors.push("dateOfBirth: Date must be in YYYY-MM-DD format".to_string());
        None
    };

    if payload.monthly_income < MIN_INCOME_THRESHOLD {
        errors.push(format!(
            "monthlyIncome: Income must be at least {}",
            MIN_INCOME_THRESHOLD
        ));
    }

    let employment_type = match EmploymentType::parse(&payload.employment_type) {
        Some(employment) => Some(employment),
        None => {
            errors.push(format!(
                "employmentType: Must be one of [{}]",
                EmploymentType::ALL.map(|t| t.as_str()).join(", ")
            ));
            None
        }
    };

    let pan_regex = Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").unwrap();
    if !pan_regex.is_match(&payload.pan_number) {
        errors.push("panNumber: Invalid PAN format".to_string());
    }

    if payload.address.trim().is_empty() {
        errors.push("address: Address is required".to_string());
    }
    if payload.city.trim().is_empty() {
        errors.push("city: City is required".to_string());
    }
    if payload.state.trim().is_empty() {
        errors.push("state: State is required".to_string());
    }

    let pincode_regex = Regex::new(r"^\d{6}$").unwrap();
    if !pincode_regex.is_match(&payload.pincode) {
        errors.push("pincode: Pincode must be 6 digits".to_string());
    }

    if payload.source.trim().is_empty() {
        errors.push("source: Source is required".to_string());
    }

    let (Some(date_of_birth), Some(employment_type)) = (date_of_birth, employment_type) else {
        return Err(errors);
    };
    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewLead {
        phone: payload.phone.clone(),
        email: payload.email.clone(),
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        date_of_birth,
        monthly_income: payload.monthly_income,
        employment_type,
        pan_number: payload.pan_number.clone(),
        address: payload.address.trim().to_string(),
        city: payload.city.trim().to_string(),
        state: payload.state.trim().to_string(),
        pincode: payload.pincode.clone(),
        source: payload.source.trim().to_string(),
    })
}
