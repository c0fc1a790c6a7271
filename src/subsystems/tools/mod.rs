//! Mock back-office tools — CRM, credit bureau and offer mart.
//!
//! All three read the same synthetic dataset (`{"customers": [...]}`), loaded
//! once at startup into a [`CustomerDirectory`].  The directory is immutable
//! after load and shared as `Arc<CustomerDirectory>`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;

/// A synthetic customer record.  Read-only for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    /// Registered 10-digit mobile number — the lookup key everywhere.
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub credit_score: u32,
    #[serde(default)]
    pub pre_approved_limit: f64,
    #[serde(default)]
    pub monthly_salary: f64,
}

#[derive(Deserialize)]
struct RawDataset {
    customers: Vec<Customer>,
}

/// In-memory customer dataset backing the mock tools.
#[derive(Debug, Clone, Default)]
pub struct CustomerDirectory {
    customers: Vec<Customer>,
}

impl CustomerDirectory {
    pub fn new(customers: Vec<Customer>) -> Self {
        Self { customers }
    }

    /// Load the dataset from a JSON file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Dataset(format!("cannot read {}: {e}", path.display())))?;
        let parsed = Self::from_json(&raw)
            .map_err(|e| AppError::Dataset(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), customers = parsed.len(), "customer dataset loaded");
        Ok(parsed)
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let dataset: RawDataset = serde_json::from_str(raw)
            .map_err(|e| AppError::Dataset(format!("malformed dataset: {e}")))?;
        Ok(Self::new(dataset.customers))
    }

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    // ── Mock CRM ──────────────────────────────────────────────────────────────

    pub fn crm_get_customer_by_phone(&self, phone: &str) -> Option<&Customer> {
        self.customers.iter().find(|c| c.phone == phone)
    }

    // ── Mock credit bureau ────────────────────────────────────────────────────

    /// Bureau score for `phone`; unknown numbers score 0.
    pub fn credit_bureau_get_score(&self, phone: &str) -> u32 {
        self.crm_get_customer_by_phone(phone)
            .map(|c| c.credit_score)
            .unwrap_or(0)
    }

    // ── Mock offer mart ───────────────────────────────────────────────────────

    /// Pre-approved limit for `phone`; unknown numbers get 0.
    pub fn offer_mart_get_preapproved_limit(&self, phone: &str) -> f64 {
        self.crm_get_customer_by_phone(phone)
            .map(|c| c.pre_approved_limit)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DATASET: &str = r#"{
        "customers": [
            {"name": "Asha Rao", "phone": "9000000001", "address": "1 Lake View",
             "city": "Mysuru", "credit_score": 760, "pre_approved_limit": 400000,
             "monthly_salary": 85000},
            {"name": "Dev Kumar", "phone": "9000000002", "address": "2 Hill Road"}
        ]
    }"#;

    #[test]
    fn crm_finds_customer_by_phone() {
        let dir = CustomerDirectory::from_json(DATASET).unwrap();
        let c = dir.crm_get_customer_by_phone("9000000001").unwrap();
        assert_eq!(c.name, "Asha Rao");
        assert_eq!(c.city.as_deref(), Some("Mysuru"));
        assert!(dir.crm_get_customer_by_phone("9999999999").is_none());
    }

    #[test]
    fn bureau_and_offer_mart_default_to_zero() {
        let dir = CustomerDirectory::from_json(DATASET).unwrap();
        assert_eq!(dir.credit_bureau_get_score("9000000001"), 760);
        assert_eq!(dir.offer_mart_get_preapproved_limit("9000000001"), 400_000.0);
        // Missing fields and unknown phones both read as zero.
        assert_eq!(dir.credit_bureau_get_score("9000000002"), 0);
        assert_eq!(dir.offer_mart_get_preapproved_limit("1234567890"), 0.0);
    }

    #[test]
    fn load_reads_file() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(DATASET.as_bytes()).unwrap();
        let dir = CustomerDirectory::load(f.path()).unwrap();
        assert_eq!(dir.len(), 2);
    }

    #[test]
    fn malformed_dataset_errors() {
        let err = CustomerDirectory::from_json(r#"{"people": []}"#).unwrap_err();
        assert!(err.to_string().contains("dataset error"));
    }

    #[test]
    fn shipped_dataset_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/sample_data.json");
        let dir = CustomerDirectory::load(&path).unwrap();
        assert!(!dir.is_empty());
        assert!(dir.customers().iter().all(|c| c.phone.len() == 10));
    }
}
