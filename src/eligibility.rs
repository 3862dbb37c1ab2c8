//! Per-lender eligibility screening.
//!
//! Rules are evaluated in a fixed order (income floor, income ceiling, age,
//! employment type, allowed states, excluded states) and the first failing
//! check wins, so the recorded skip reason is deterministic for a given
//! lead and rule set.

use chrono::{Datelike, NaiveDate};
use serde_json::{json, Value};

use crate::models::{EligibilityRules, EmploymentType, Lead};

/// Outcome of screening one lead against one lender's rules.
#[derive(Debug, Clone, PartialEq)]
pub enum EligibilityDecision {
    Eligible,
    /// Human-readable reason naming the first failed check.
    Ineligible(String),
}

impl EligibilityDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, EligibilityDecision::Eligible)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            EligibilityDecision::Eligible => None,
            EligibilityDecision::Ineligible(reason) => Some(reason),
        }
    }
}

/// Age in whole years at `as_of`, accounting for a birthday that has not
/// yet occurred in the `as_of` year.
pub fn calculate_age(date_of_birth: NaiveDate, as_of: NaiveDate) -> i32 {
    let mut age = as_of.year() - date_of_birth.year();
    let month_diff = as_of.month() as i32 - date_of_birth.month() as i32;
    if month_diff < 0 || (month_diff == 0 && as_of.day() < date_of_birth.day()) {
        age -= 1;
    }
    age
}

/// Screens a lead against a lender's rules.
///
/// State comparisons are exact string matches against the configured codes.
pub fn evaluate(lead: &Lead, rules: &EligibilityRules, as_of: NaiveDate) -> EligibilityDecision {
    if lead.monthly_income < rules.min_income {
        return EligibilityDecision::Ineligible(format!(
            "Income {} < min {}",
            lead.monthly_income, rules.min_income
        ));
    }
    if let Some(max_income) = rules.max_income {
        if lead.monthly_income > max_income {
            return EligibilityDecision::Ineligible(format!(
                "Income {} > max {}",
                lead.monthly_income, max_income
            ));
        }
    }

    let age = calculate_age(lead.date_of_birth, as_of);
    if age < rules.min_age || age > rules.max_age {
        return EligibilityDecision::Ineligible(format!(
            "Age {} not in range {}-{}",
            age, rules.min_age, rules.max_age
        ));
    }

    if !rules
        .allowed_employment_types
        .contains(&lead.employment_type)
    {
        let allowed = rules
            .allowed_employment_types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return EligibilityDecision::Ineligible(format!(
            "Employment type \"{}\" not in [{}]",
            lead.employment_type, allowed
        ));
    }

    if let Some(allowed_states) = &rules.allowed_states {
        if !allowed_states.iter().any(|s| *s == lead.state) {
            return EligibilityDecision::Ineligible(format!(
                "State \"{}\" not in allowed states [{}]",
                lead.state,
                allowed_states.join(", ")
            ));
        }
    }
    if let Some(excluded_states) = &rules.excluded_states {
        if excluded_states.iter().any(|s| *s == lead.state) {
            return EligibilityDecision::Ineligible(format!(
                "State \"{}\" is excluded",
                lead.state
            ));
        }
    }

    EligibilityDecision::Eligible
}

/// The lead fields a routing decision was based on, frozen at decision time.
///
/// Stored alongside every routing log row so the audit trail stays accurate
/// even after the lead record itself is updated.
#[derive(Debug, Clone)]
pub struct EligibilitySnapshot {
    pub monthly_income: f64,
    pub age: i32,
    pub employment_type: EmploymentType,
    pub state: String,
}

impl EligibilitySnapshot {
    pub fn capture(lead: &Lead, as_of: NaiveDate) -> Self {
        Self {
            monthly_income: lead.monthly_income,
            age: calculate_age(lead.date_of_birth, as_of),
            employment_type: lead.employment_type,
            state: lead.state.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "monthlyIncome": self.monthly_income,
            "age": self.age,
            "employmentType": self.employment_type.as_str(),
            "state": self.state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LeadStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn lead_with(income: f64, dob: &str, employment: EmploymentType, state: &str) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            phone: "9876543210".to_string(),
            email: "lead@example.com".to_string(),
            first_name: "Asha".to_string(),
            last_name: "Verma".to_string(),
            date_of_birth: NaiveDate::parse_from_str(dob, "%Y-%m-%d").unwrap(),
            monthly_income: income,
            employment_type: employment,
            pan_number: "ABCDE1234F".to_string(),
            address: "14 MG Road".to_string(),
            city: "Pune".to_string(),
            state: state.to_string(),
            pincode: "411001".to_string(),
            status: LeadStatus::New,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn base_rules() -> EligibilityRules {
        EligibilityRules {
            min_income: 20000.0,
            max_income: None,
            min_age: 21,
            max_age: 58,
            allowed_employment_types: vec![EmploymentType::Salaried, EmploymentType::SelfEmployed],
            allowed_states: None,
            excluded_states: None,
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn age_counts_completed_years_only() {
        let dob = NaiveDate::from_ymd_opt(1990, 6, 16).unwrap();
        // Birthday is tomorrow relative to as_of.
        assert_eq!(calculate_age(dob, as_of()), 33);

        let dob = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        // Birthday is today.
        assert_eq!(calculate_age(dob, as_of()), 34);

        let dob = NaiveDate::from_ymd_opt(1990, 6, 14).unwrap();
        assert_eq!(calculate_age(dob, as_of()), 34);
    }

    #[test]
    fn age_handles_earlier_month() {
        let dob = NaiveDate::from_ymd_opt(1990, 12, 1).unwrap();
        assert_eq!(calculate_age(dob, as_of()), 33);
    }

    #[test]
    fn passes_all_checks() {
        let lead = lead_with(45000.0, "1992-04-17", EmploymentType::Salaried, "MH");
        assert!(evaluate(&lead, &base_rules(), as_of()).is_eligible());
    }

    #[test]
    fn fails_income_floor() {
        let lead = lead_with(12000.0, "1992-04-17", EmploymentType::Salaried, "MH");
        let decision = evaluate(&lead, &base_rules(), as_of());
        assert_eq!(decision.reason(), Some("Income 12000 < min 20000"));
    }

    #[test]
    fn fails_income_ceiling() {
        let mut rules = base_rules();
        rules.max_income = Some(100000.0);
        let lead = lead_with(150000.0, "1992-04-17", EmploymentType::Salaried, "MH");
        let decision = evaluate(&lead, &rules, as_of());
        assert_eq!(decision.reason(), Some("Income 150000 > max 100000"));
    }

    #[test]
    fn fails_age_range() {
        let lead = lead_with(45000.0, "2006-01-01", EmploymentType::Salaried, "MH");
        let decision = evaluate(&lead, &base_rules(), as_of());
        assert_eq!(decision.reason(), Some("Age 18 not in range 21-58"));
    }

    #[test]
    fn fails_employment_type() {
        let lead = lead_with(45000.0, "1992-04-17", EmploymentType::Student, "MH");
        let decision = evaluate(&lead, &base_rules(), as_of());
        assert_eq!(
            decision.reason(),
            Some("Employment type \"student\" not in [salaried, self_employed]")
        );
    }

    #[test]
    fn fails_allowed_states() {
        let mut rules = base_rules();
        rules.allowed_states = Some(vec!["MH".to_string(), "DL".to_string()]);
        let lead = lead_with(45000.0, "1992-04-17", EmploymentType::Salaried, "UP");
        let decision = evaluate(&lead, &rules, as_of());
        assert_eq!(
            decision.reason(),
            Some("State \"UP\" not in allowed states [MH, DL]")
        );
    }

    #[test]
    fn fails_excluded_state() {
        let mut rules = base_rules();
        rules.excluded_states = Some(vec!["BR".to_string()]);
        let lead = lead_with(45000.0, "1992-04-17", EmploymentType::Salaried, "BR");
        let decision = evaluate(&lead, &rules, as_of());
        assert_eq!(decision.reason(), Some("State \"BR\" is excluded"));
    }

    #[test]
    fn state_match_is_case_sensitive() {
        let mut rules = base_rules();
        rules.allowed_states = Some(vec!["MH".to_string()]);
        let lead = lead_with(45000.0, "1992-04-17", EmploymentType::Salaried, "mh");
        assert!(!evaluate(&lead, &rules, as_of()).is_eligible());
    }

    #[test]
    fn income_check_wins_over_later_failures() {
        // Lead fails income, age and employment at once; income is reported.
        let lead = lead_with(1000.0, "2006-01-01", EmploymentType::Unemployed, "MH");
        let decision = evaluate(&lead, &base_rules(), as_of());
        assert_eq!(decision.reason(), Some("Income 1000 < min 20000"));
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let lead = lead_with(45000.0, "1992-04-17", EmploymentType::SelfEmployed, "KA");
        let snapshot = EligibilitySnapshot::capture(&lead, as_of());
        let value = snapshot.to_json();
        assert_eq!(value["monthlyIncome"], 45000.0);
        assert_eq!(value["age"], 32);
        assert_eq!(value["employmentType"], "self_employed");
        assert_eq!(value["state"], "KA");
    }
}
