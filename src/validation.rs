use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Upper bound on rows a single extraction may request
pub const MAX_LIMIT: usize = 10_000_000;

/// Upper bound on activities per output file
pub const MAX_RECORDS_PER_FILE: usize = 1_000_000;

fn member_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+$").expect("valid member id regex"))
}

/// Validation utilities for input sanitization and edge case handling
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a WhatsApp member id (`<number>@s.whatsapp.net`)
    pub fn validate_member_id(member_id: &str) -> Result<()> {
        if member_id.trim().is_empty() {
            return Err(anyhow!("Member id cannot be empty"));
        }

        if member_id.len() > 254 {
            return Err(anyhow!("Member id too long (max 254 characters)"));
        }

        if !member_id_re().is_match(member_id) {
            return Err(anyhow!(
                "Member id must look like <number>@s.whatsapp.net: {member_id}"
            ));
        }

        Ok(())
    }

    /// Validate the local user's display name
    pub fn validate_display_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(anyhow!("Display name cannot be empty"));
        }

        if name.chars().count() > 100 {
            return Err(anyhow!("Display name too long (max 100 characters)"));
        }

        if name.contains('\0') || name.contains('\r') || name.contains('\n') {
            return Err(anyhow!("Display name contains invalid characters"));
        }

        Ok(())
    }

    /// Validate WhatsApp database path
    pub fn validate_database_path(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(anyhow!("WhatsApp database path does not exist: {path:?}"));
        }

        if !path.is_file() {
            return Err(anyhow!("WhatsApp database path is not a file: {path:?}"));
        }

        Ok(())
    }

    /// Validate date range
    pub fn validate_date_range(since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Result<()> {
        if let (Some(start), Some(end)) = (since, until) {
            if start > end {
                return Err(anyhow!("Start date cannot be after end date"));
            }

            let days = (end - start).num_days();
            if days > 365 * 5 {
                tracing::warn!(days, "Large date range may take a while to extract");
            }
        }

        Ok(())
    }

    /// Validate the row limit
    pub fn validate_limit(limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(anyhow!("Limit must be greater than 0"));
        }

        if limit > MAX_LIMIT {
            return Err(anyhow!("Limit too large (max 10,000,000)"));
        }

        Ok(())
    }

    /// Validate records per output file
    pub fn validate_records_per_file(records: usize) -> Result<()> {
        if records == 0 {
            return Err(anyhow!("Records per file must be greater than 0"));
        }

        if records > MAX_RECORDS_PER_FILE {
            return Err(anyhow!("Records per file too large (max 1,000,000)"));
        }

        Ok(())
    }
}
