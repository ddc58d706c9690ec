//! Service configuration loaded from `fiscald.toml`.
//!
//! [`ServiceConfig`] holds every tunable of the service: the fiscalisation
//! API endpoint, the polled table and its column mappings, status values,
//! retry/backoff settings and notification throttling. Values not present
//! in the file use the defaults below, so a partial (or missing) file still
//! yields a runnable configuration. The `DATABASE_URL` environment variable
//! takes precedence over the file for the connection string.
//!
//! [`ConfigStore`] owns the live configuration: readers take an immutable
//! snapshot once per poll cycle, writers atomically replace it.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Top-level configuration for the fiscalisation worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Endpoint receiving receipt submissions.
    pub api_url: String,
    /// Postgres connection string; empty disables store access.
    pub connection_string: String,
    /// Table polled for records awaiting fiscalisation.
    pub table_name: String,
    /// Optional raw predicate overriding the built eligibility filter.
    pub where_clause: String,
    /// Integer key column identifying a record.
    pub id_column: String,
    pub status_column: String,
    pub pending_status_value: String,
    pub timeout_status_value: String,
    pub in_progress_status_value: String,
    pub failed_status_value: String,
    /// Flag column selecting records for processing at all.
    pub to_fiscalise_column: String,
    pub to_fiscalise_value: String,
    pub poll_interval_seconds: u64,
    pub batch_size: i64,
    pub max_retries: u32,
    pub retry_backoff_base_seconds: u64,
    pub retry_backoff_max_seconds: u64,
    /// Column tracking timeout retries; empty disables tracking entirely.
    pub retry_count_column: String,
    pub last_attempt_at_column: String,
    pub last_success_at_column: String,
    /// Per-call deadline for a single submission.
    pub request_timeout_seconds: u64,

    pub receipt_type: i32,
    pub device_id: String,
    /// Platform marker selecting the USD currency (matched case-insensitively).
    pub usd_platform_value: String,
    pub usd_currency: String,
    pub default_currency: String,

    pub buyer_defaults: BuyerDefaults,
    pub line_defaults: LineDefaults,
    pub columns: ColumnMap,
    pub response_columns: ResponseColumnMap,
    pub client_lookup: ClientLookup,
    pub notify: NotifySettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.example.com/receipts".to_string(),
            connection_string: String::new(),
            table_name: "Deals".to_string(),
            where_clause: String::new(),
            id_column: "ID".to_string(),
            status_column: "FiscalisationStatus".to_string(),
            pending_status_value: "PENDING".to_string(),
            timeout_status_value: "TIMEOUT".to_string(),
            in_progress_status_value: "IN_PROGRESS".to_string(),
            failed_status_value: "FAILED".to_string(),
            to_fiscalise_column: "ToFiscalise".to_string(),
            to_fiscalise_value: "Yes".to_string(),
            poll_interval_seconds: 30,
            batch_size: 50,
            max_retries: 5,
            retry_backoff_base_seconds: 10,
            retry_backoff_max_seconds: 300,
            retry_count_column: "RetryCount".to_string(),
            last_attempt_at_column: "LastAttemptAt".to_string(),
            last_success_at_column: "LastSuccessAt".to_string(),
            request_timeout_seconds: 15,
            receipt_type: 0,
            device_id: "17436".to_string(),
            usd_platform_value: "VFEX".to_string(),
            usd_currency: "USD".to_string(),
            default_currency: "ZWG".to_string(),
            buyer_defaults: BuyerDefaults::default(),
            line_defaults: LineDefaults::default(),
            columns: ColumnMap::default(),
            response_columns: ResponseColumnMap::default(),
            client_lookup: ClientLookup::default(),
            notify: NotifySettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Timeout retries are only tracked when a counter column is configured.
    /// Without one, every timed-out record is retried on the next poll and
    /// the service never gives up on it.
    pub fn retry_tracking_enabled(&self) -> bool {
        !self.retry_count_column.trim().is_empty()
    }
}

/// Buyer identity fields the polled table does not carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuyerDefaults {
    pub province: String,
    pub city: String,
    pub vat_number: String,
    pub buyer_tin: String,
}

impl Default for BuyerDefaults {
    fn default() -> Self {
        Self {
            province: "Harare".to_string(),
            city: "Harare".to_string(),
            vat_number: "000000000".to_string(),
            buyer_tin: "0000000000".to_string(),
        }
    }
}

/// Fixed attributes of the single receipt line every submission carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineDefaults {
    pub line_type: String,
    pub hs_code: String,
    pub name: String,
    pub tax_percent: Decimal,
    pub money_type_code: i32,
}

impl Default for LineDefaults {
    fn default() -> Self {
        Self {
            line_type: "Sale".to_string(),
            hs_code: "001".to_string(),
            name: "0.92% Brokerage Fees".to_string(),
            tax_percent: Decimal::new(155, 1),
            money_type_code: 5,
        }
    }
}

/// Source column names on the polled table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub platform: String,
    pub transaction_entry: String,
    pub client_name: String,
    pub telephone_no: String,
    pub email_address: String,
    pub client_address: String,
    pub details: String,
    pub deal_date: String,
    pub brokerage: String,
    pub amount_due: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            platform: "Platform".to_string(),
            transaction_entry: "TransactionEntry".to_string(),
            client_name: "ClientName".to_string(),
            telephone_no: "TelephoneNo".to_string(),
            email_address: "EmailAddress".to_string(),
            client_address: "ClientAddress".to_string(),
            details: "Details".to_string(),
            deal_date: "DealDate".to_string(),
            brokerage: "Brokerage".to_string(),
            amount_due: "AmountDue".to_string(),
        }
    }
}

/// Destination columns for API response fields. A blank name skips that
/// field on write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseColumnMap {
    pub verification_code: String,
    pub qr_url: String,
    pub fiscalisation_status: String,
    pub d_receipt_number: String,
    pub invoice_date: String,
    pub device_id: String,
    pub error_message: String,
    pub full_response: String,
}

impl Default for ResponseColumnMap {
    fn default() -> Self {
        Self {
            verification_code: "VerificationCode".to_string(),
            qr_url: "qrlUrl".to_string(),
            fiscalisation_status: "FiscalisationStatus".to_string(),
            d_receipt_number: "dreceiptNumber".to_string(),
            invoice_date: "invoiceDate".to_string(),
            device_id: "deviceID".to_string(),
            error_message: "FiscalisationError".to_string(),
            full_response: "FiscalisationResponse".to_string(),
        }
    }
}

/// Optional enrichment of buyer details from a secondary client table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientLookup {
    pub enabled: bool,
    pub table_name: String,
    /// Key column, matched against the same-named column on the record.
    pub account_column: String,
    pub client_name_column: String,
    pub telephone_no_column: String,
    pub email_address_column: String,
    pub client_address_column: String,
}

impl Default for ClientLookup {
    fn default() -> Self {
        Self {
            enabled: true,
            table_name: "Client".to_string(),
            account_column: "Account".to_string(),
            client_name_column: "ClientName".to_string(),
            telephone_no_column: "TelephoneNo".to_string(),
            email_address_column: "EmailAddress".to_string(),
            client_address_column: "ClientAddress".to_string(),
        }
    }
}

/// Timeout notification settings. Delivery itself happens behind the
/// notifier trait; these control whether and how often it is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub enabled: bool,
    /// Minimum minutes between notifications, clamped to at least 1.
    pub throttle_minutes: i64,
    pub client_name: String,
    pub subject: String,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            throttle_minutes: 15,
            client_name: String::new(),
            subject: "Fiscalisation API timeout".to_string(),
        }
    }
}

/// Live configuration holder: immutable snapshots out, atomic replacement in.
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<ServiceConfig>>,
}

impl ConfigStore {
    /// Load the configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let path = path.into();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str::<ServiceConfig>(&contents)?
        } else {
            ServiceConfig::default()
        };

        if let Ok(url) = std::env::var("DATABASE_URL")
            && !url.is_empty()
        {
            config.connection_string = url;
        }

        Ok(Self {
            path,
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// The current configuration. A poll cycle calls this once and treats
    /// the result as immutable; replacements take effect on the next cycle.
    pub fn snapshot(&self) -> Arc<ServiceConfig> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Swap in a new configuration and persist it. The file is written to a
    /// temporary path and renamed so a crash never leaves a half-written
    /// config behind.
    #[allow(dead_code)]
    pub fn replace(&self, config: ServiceConfig) -> Result<(), ServiceError> {
        let rendered = toml::to_string_pretty(&config)?;
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, rendered)?;
        std::fs::rename(&tmp, &self.path)?;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(config);
        Ok(())
    }
}
