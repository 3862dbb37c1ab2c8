use std::env;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use rust_lead_router::db::Database;
use rust_lead_router::models::{
    EmploymentType, LeadStatus, LenderOutcome, NewLead, NewLenderResponse, NewRoutingLog,
    RoutingDecision,
};
use rust_lead_router::storage::{LeadStore, PgLeadStore};

/// Integration smoke test for the Postgres lead store.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn lead_round_trip_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let store = PgLeadStore::new(db.pool.clone());

    // Unique phone and email so repeated runs never trip the identity indexes.
    let suffix = Uuid::new_v4().as_u128() % 1_000_000_000;
    let phone = format!("9{:09}", suffix);
    let email = format!("smoke-{}@example.com", suffix);

    let new_lead = NewLead {
        phone: phone.clone(),
        email: email.clone(),
        first_name: "Asha".to_string(),
        last_name: "Verma".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1992, 4, 17)
            .ok_or_else(|| anyhow::anyhow!("bad fixture date"))?,
        monthly_income: 45000.0,
        employment_type: EmploymentType::Salaried,
        pan_number: "ABCDE1234F".to_string(),
        address: "14 MG Road".to_string(),
        city: "Pune".to_string(),
        state: "MH".to_string(),
        pincode: "411001".to_string(),
        source: "website".to_string(),
    };
    let raw = serde_json::json!({ "phone": phone, "email": email, "source": "website" });

    let lead = store.create_lead(&new_lead, &raw).await?;
    assert_ne!(lead.id, Uuid::nil());
    assert_eq!(lead.status, LeadStatus::New);
    assert_eq!(lead.monthly_income, 45000.0);

    // Identity lookups: by id, by phone alone, by email alone.
    let by_id = store.find_lead_by_id(lead.id).await?;
    assert_eq!(by_id.map(|l| l.id), Some(lead.id));
    let by_phone = store
        .find_lead_by_phone_or_email(&phone, "nobody@example.com")
        .await?;
    assert_eq!(by_phone.map(|l| l.id), Some(lead.id));
    let by_email = store.find_lead_by_phone_or_email("0000000000", &email).await?;
    assert_eq!(by_email.map(|l| l.id), Some(lead.id));

    store.update_lead_status(lead.id, LeadStatus::Completed).await?;
    let updated = store
        .find_lead_by_id(lead.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("lead vanished after status update"))?;
    assert_eq!(updated.status, LeadStatus::Completed);

    // The create recorded the first source; a merge appends another.
    store
        .add_lead_source(lead.id, "partner-app", &serde_json::json!({ "channel": "app" }))
        .await?;
    let sources = store.sources_for_lead(lead.id).await?;
    let names: Vec<&str> = sources.iter().map(|s| s.source_name.as_str()).collect();
    assert_eq!(names, vec!["website", "partner-app"]);

    Ok(())
}

/// Duplicate responses with a lapsed cooldown must surface in the retry scan.
#[tokio::test]
#[ignore]
async fn duplicate_response_surfaces_in_retry_scan() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let store = PgLeadStore::new(db.pool.clone());

    let suffix = Uuid::new_v4().as_u128() % 1_000_000_000;
    let new_lead = NewLead {
        phone: format!("8{:09}", suffix),
        email: format!("retry-{}@example.com", suffix),
        first_name: "Asha".to_string(),
        last_name: "Verma".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1992, 4, 17)
            .ok_or_else(|| anyhow::anyhow!("bad fixture date"))?,
        monthly_income: 45000.0,
        employment_type: EmploymentType::Salaried,
        pan_number: "ABCDE1234F".to_string(),
        address: "14 MG Road".to_string(),
        city: "Pune".to_string(),
        state: "MH".to_string(),
        pincode: "411001".to_string(),
        source: "website".to_string(),
    };
    let lead = store.create_lead(&new_lead, &serde_json::json!({})).await?;

    let now = Utc::now();
    let expired = store
        .create_lender_response(&NewLenderResponse {
            lead_id: lead.id,
            lender_id: "karrofin-001".to_string(),
            lender_name: "KarroFin".to_string(),
            status: LenderOutcome::Duplicate,
            response_data: Some(serde_json::json!({ "duplicate": true })),
            sent_at: now - Duration::days(31),
            responded_at: Some(now - Duration::days(31)),
            retry_after: Some(now - Duration::hours(1)),
        })
        .await?;
    // Still inside its cooldown; must not be picked up.
    store
        .create_lender_response(&NewLenderResponse {
            lead_id: lead.id,
            lender_id: "zype-001".to_string(),
            lender_name: "Zype".to_string(),
            status: LenderOutcome::Duplicate,
            response_data: None,
            sent_at: now,
            responded_at: Some(now),
            retry_after: Some(now + Duration::days(30)),
        })
        .await?;

    let ready = store.find_responses_ready_for_retry(Utc::now()).await?;
    assert!(ready.iter().any(|r| r.id == expired.id));
    assert!(ready.iter().all(|r| r.status == LenderOutcome::Duplicate));
    assert!(ready
        .iter()
        .all(|r| r.retry_after.map_or(false, |after| after < Utc::now())));

    let responses = store.responses_for_lead(lead.id).await?;
    assert_eq!(responses.len(), 2);
    // Oldest dispatch first.
    assert_eq!(responses[0].id, expired.id);

    // Routing logs read back newest first.
    store
        .create_routing_log(&NewRoutingLog {
            lead_id: lead.id,
            lender_name: "KarroFin".to_string(),
            decision: RoutingDecision::Sent,
            reason: Some("API call successful - Duplicate".to_string()),
            lead_data: serde_json::json!({ "monthlyIncome": 45000.0 }),
        })
        .await?;
    store
        .create_routing_log(&NewRoutingLog {
            lead_id: lead.id,
            lender_name: "Zype".to_string(),
            decision: RoutingDecision::SkippedIneligible,
            reason: Some("Income 45000 < min 50000".to_string()),
            lead_data: serde_json::json!({ "monthlyIncome": 45000.0 }),
        })
        .await?;
    let logs = store.routing_logs_for_lead(lead.id).await?;
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].lender_name, "Zype");
    assert_eq!(logs[1].lender_name, "KarroFin");

    Ok(())
}
