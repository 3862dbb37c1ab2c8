use crate::models::{EligibilityRules, EmploymentType, LenderName};

/// Credential set for one lender, shaped by how that lender authenticates.
#[derive(Debug, Clone)]
pub enum LenderCredentials {
    /// KarroFin-style login exchange.
    PartnerPasskey { partner_code: String, passkey: String },
    /// PocketCredit-style OAuth client credentials.
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
    /// Zype-style static API key.
    ApiKey { api_key: String },
}

/// Static configuration for one lending partner.
#[derive(Debug, Clone)]
pub struct LenderConfig {
    /// Stable lender identifier recorded on every response row.
    pub id: String,
    pub name: LenderName,
    /// Base URL of the lender API. Empty when unconfigured.
    pub base_url: String,
    /// Request timeout for this lender's HTTP client, in seconds.
    pub timeout_secs: u64,
    /// Present only when every required credential variable is set.
    pub credentials: Option<LenderCredentials>,
    pub rules: EligibilityRules,
}

impl LenderConfig {
    /// A lender participates in routing only when it has both credentials
    /// and a base URL. Anything less silently excludes it.
    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some() && !self.base_url.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Days a Duplicate outcome waits before the sweep may retry it.
    pub dedup_cooldown_days: i64,
    /// Minutes between retry sweeps.
    pub retry_interval_minutes: u64,
    /// Upper bound on one lender send, including authentication.
    pub send_timeout_secs: u64,
    pub karrofin: LenderConfig,
    pub pocketcredit: LenderConfig,
    pub zype: LenderConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let lender_timeout_secs: u64 = std::env::var("LENDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("LENDER_TIMEOUT_SECS must be a positive number"))?;
        if lender_timeout_secs == 0 {
            anyhow::bail!("LENDER_TIMEOUT_SECS must be greater than zero");
        }

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            dedup_cooldown_days: std::env::var("DEDUP_COOLDOWN_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DEDUP_COOLDOWN_DAYS must be a whole number"))
                .and_then(|days: i64| {
                    if days <= 0 {
                        anyhow::bail!("DEDUP_COOLDOWN_DAYS must be greater than zero");
                    }
                    Ok(days)
                })?,
            retry_interval_minutes: std::env::var("RETRY_INTERVAL_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RETRY_INTERVAL_MINUTES must be a whole number"))
                .and_then(|minutes: u64| {
                    if minutes == 0 {
                        anyhow::bail!("RETRY_INTERVAL_MINUTES must be greater than zero");
                    }
                    Ok(minutes)
                })?,
            send_timeout_secs: lender_timeout_secs,
            karrofin: LenderConfig {
                id: "karrofin-001".to_string(),
                name: LenderName::KarroFin,
                base_url: lender_base_url("KARROFIN_BASE_URL")?,
                timeout_secs: lender_timeout_secs,
                credentials: match (
                    optional_env("KARROFIN_PARTNER_CODE"),
                    optional_env("KARROFIN_PASSKEY"),
                ) {
                    (Some(partner_code), Some(passkey)) => Some(LenderCredentials::PartnerPasskey {
                        partner_code,
                        passkey,
                    }),
                    _ => None,
                },
                rules: EligibilityRules {
                    min_income: 20000.0,
                    max_income: None,
                    min_age: 21,
                    max_age: 58,
                    allowed_employment_types: vec![
                        EmploymentType::Salaried,
                        EmploymentType::SelfEmployed,
                    ],
                    allowed_states: None,
                    excluded_states: None,
                },
            },
            pocketcredit: LenderConfig {
                id: "pocketcredit-001".to_string(),
                name: LenderName::PocketCredit,
                base_url: lender_base_url("POCKETCREDIT_BASE_URL")?,
                timeout_secs: lender_timeout_secs,
                credentials: match (
                    optional_env("POCKETCREDIT_CLIENT_ID"),
                    optional_env("POCKETCREDIT_CLIENT_SECRET"),
                ) {
                    (Some(client_id), Some(client_secret)) => {
                        Some(LenderCredentials::ClientCredentials {
                            client_id,
                            client_secret,
                        })
                    }
                    _ => None,
                },
                rules: EligibilityRules {
                    min_income: 15000.0,
                    max_income: Some(100000.0),
                    min_age: 21,
                    max_age: 60,
                    allowed_employment_types: vec![
                        EmploymentType::Salaried,
                        EmploymentType::SelfEmployed,
                        EmploymentType::Business,
                    ],
                    allowed_states: None,
                    excluded_states: None,
                },
            },
            zype: LenderConfig {
                id: "zype-001".to_string(),
                name: LenderName::Zype,
                base_url: lender_base_url("ZYPE_BASE_URL")?,
                timeout_secs: lender_timeout_secs,
                credentials: optional_env("ZYPE_API_KEY")
                    .map(|api_key| LenderCredentials::ApiKey { api_key }),
                rules: EligibilityRules {
                    min_income: 25000.0,
                    max_income: None,
                    min_age: 23,
                    max_age: 55,
                    allowed_employment_types: vec![EmploymentType::Salaried],
                    allowed_states: Some(
                        ["MH", "DL", "KA", "TN", "TG"]
                            .into_iter()
                            .map(String::from)
                            .collect(),
                    ),
                    excluded_states: None,
                },
            },
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!(
            "Dedup cooldown: {} days, retry sweep every {} min, lender timeout {}s",
            config.dedup_cooldown_days,
            config.retry_interval_minutes,
            config.send_timeout_secs
        );
        for lender in [&config.karrofin, &config.pocketcredit, &config.zype] {
            if lender.is_enabled() {
                tracing::info!("Lender {} enabled: {}", lender.name, lender.base_url);
            } else {
                tracing::warn!(
                    "Lender {} disabled (missing credentials or base URL)",
                    lender.name
                );
            }
        }

        Ok(config)
    }

    /// Static configuration block for one lender.
    pub fn lender(&self, name: LenderName) -> &LenderConfig {
        match name {
            LenderName::KarroFin => &self.karrofin,
            LenderName::PocketCredit => &self.pocketcredit,
            LenderName::Zype => &self.zype,
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Lender base URLs are optional (absent means the lender stays disabled),
/// but when present they must be http(s).
fn lender_base_url(name: &str) -> anyhow::Result<String> {
    match optional_env(name) {
        Some(url) => {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
            Ok(url)
        }
        None => Ok(String::new()),
    }
}
