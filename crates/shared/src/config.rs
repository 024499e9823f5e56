//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger core configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Which adapters back the message log and the two ledgers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// PostgreSQL tables managed by the migrator.
    #[default]
    Postgres,
    /// Process-local state, lost on restart. Development only.
    Memory,
}

/// How a second vote from the same voter on the same loan is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotePolicy {
    /// The latest vote replaces the earlier one.
    #[default]
    LastWriterWins,
    /// The first vote stands; resubmission is refused.
    FirstVoteFinal,
}

/// Ledger core configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Account that holds pooled contributions.
    #[serde(default = "default_treasury_account")]
    pub treasury_account: String,
    /// Schema version stamped on every submitted message.
    #[serde(default = "default_message_version")]
    pub message_version: String,
    /// Adapter selection.
    #[serde(default)]
    pub backend: LedgerBackend,
    /// Seconds between two loan sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Circle sizing and contribution bounds.
    #[serde(default)]
    pub circle: CircleLimits,
    /// Emergency loan policy.
    #[serde(default)]
    pub loans: LoanPolicy,
    /// Reward token policy.
    #[serde(default)]
    pub rewards: RewardPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            treasury_account: default_treasury_account(),
            message_version: default_message_version(),
            backend: LedgerBackend::default(),
            sweep_interval_secs: default_sweep_interval_secs(),
            circle: CircleLimits::default(),
            loans: LoanPolicy::default(),
            rewards: RewardPolicy::default(),
        }
    }
}

fn default_treasury_account() -> String {
    "treasury".to_string()
}

fn default_message_version() -> String {
    "1.0.0".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Circle sizing and contribution bounds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircleLimits {
    /// Smallest allowed `max_members`.
    pub min_members: u32,
    /// Largest allowed `max_members`.
    pub max_members: u32,
    /// Smallest monthly contribution, in minor units.
    pub min_contribution: i64,
    /// Largest monthly contribution, in minor units.
    pub max_contribution: i64,
    /// How many unfinished circles one account may belong to.
    pub max_circles_per_member: usize,
}

impl Default for CircleLimits {
    fn default() -> Self {
        Self {
            min_members: 3,
            max_members: 12,
            min_contribution: 5_000,
            max_contribution: 1_000_000,
            max_circles_per_member: 5,
        }
    }
}

/// Emergency loan policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoanPolicy {
    /// Cap applied to circles that do not set their own.
    pub default_max_loan_percentage: u8,
    /// Lowest cap a circle may choose.
    pub min_loan_percentage: u8,
    /// Platform-wide ceiling on any circle's cap.
    pub max_loan_percentage: u8,
    /// Smallest loan that may be requested, in minor units.
    pub min_loan_amount: i64,
    /// Length of the voting window.
    pub voting_period_hours: i64,
    /// Loans in voting, approved or disbursed state per borrower.
    pub max_active_loans_per_borrower: usize,
    /// Vote mutability.
    pub vote_policy: VotePolicy,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            default_max_loan_percentage: 50,
            min_loan_percentage: 25,
            max_loan_percentage: 75,
            min_loan_amount: 5_000,
            voting_period_hours: 24,
            max_active_loans_per_borrower: 2,
            vote_policy: VotePolicy::default(),
        }
    }
}

/// Reward token policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RewardPolicy {
    /// Whole reward tokens credited per whole currency unit contributed.
    pub tokens_per_unit: Decimal,
    /// Number of minor-unit digits in one whole currency unit.
    pub currency_decimals: u32,
    /// Whole tokens credited to every member when a circle completes.
    pub completion_bonus_tokens: i64,
    /// Whole tokens credited to each "for" voter when a loan they backed is disbursed.
    pub emergency_support_tokens: i64,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            tokens_per_unit: Decimal::ONE_HUNDRED,
            currency_decimals: 0,
            completion_bonus_tokens: 500,
            emergency_support_tokens: 50,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("SUSU").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.treasury_account, "treasury");
        assert_eq!(config.message_version, "1.0.0");
        assert_eq!(config.backend, LedgerBackend::Postgres);
        assert_eq!(config.circle.min_members, 3);
        assert_eq!(config.circle.max_members, 12);
        assert_eq!(config.loans.default_max_loan_percentage, 50);
        assert_eq!(config.loans.max_loan_percentage, 75);
        assert_eq!(config.loans.voting_period_hours, 24);
        assert_eq!(config.loans.vote_policy, VotePolicy::LastWriterWins);
        assert_eq!(config.rewards.tokens_per_unit, Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("SUSU__DATABASE__URL", Some("postgres://localhost/susu_test")),
                ("SUSU__SERVER__PORT", Some("9090")),
                ("SUSU__LEDGER__TREASURY_ACCOUNT", Some("0.0.4242")),
                ("SUSU__LEDGER__BACKEND", Some("memory")),
                ("SUSU__LEDGER__LOANS__VOTE_POLICY", Some("first_vote_final")),
                ("RUN_MODE", Some("config-test-none")),
            ],
            || {
                let config = AppConfig::load().expect("config should load");
                assert_eq!(config.database.url, "postgres://localhost/susu_test");
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.server.host, "0.0.0.0");
                assert_eq!(config.ledger.treasury_account, "0.0.4242");
                assert_eq!(config.ledger.backend, LedgerBackend::Memory);
                assert_eq!(config.ledger.loans.vote_policy, VotePolicy::FirstVoteFinal);
                assert_eq!(config.ledger.circle.max_members, 12);
            },
        );
    }

    #[test]
    fn test_load_requires_database_url() {
        temp_env::with_vars(
            [
                ("SUSU__DATABASE__URL", None::<&str>),
                ("RUN_MODE", Some("config-test-none")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }
}
