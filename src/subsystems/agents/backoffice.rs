//! Back-office tasks and the master controller.
//!
//! Each task is a deterministic wrapper over the mock tools, the rule table
//! or the letter renderer.  [`Backoffice::orchestrate`] runs them in order:
//! verify → bureau score and offer-mart limit → underwrite → sanction letter.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::AppError;
use crate::sanction::SanctionLetter;
use crate::subsystems::tools::CustomerDirectory;
use crate::underwriting::{self, Application, Assessment, Decision, RejectReason};

/// KYC result for one phone number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub verified: bool,
    pub name: String,
    pub address: String,
}

/// The application terms collected by the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanContext {
    pub customer_phone: String,
    pub loan_amount: f64,
    pub tenure_months: u32,
    pub annual_rate_pct: f64,
    pub monthly_salary: Option<f64>,
}

/// What the master controller concluded for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum PipelineOutcome {
    #[serde(rename = "KYC_FAILED")]
    KycFailed { message: String },
    #[serde(rename = "REQUIRE_SALARY")]
    RequireSalary { emi: Option<f64> },
    #[serde(rename = "REJECT")]
    Rejected { reason: RejectReason, emi: Option<f64> },
    #[serde(rename = "APPROVED")]
    Approved { emi: f64, letter: SanctionLetter, pdf_path: PathBuf },
}

impl PipelineOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            PipelineOutcome::KycFailed { .. } => "KYC_FAILED",
            PipelineOutcome::RequireSalary { .. } => "REQUIRE_SALARY",
            PipelineOutcome::Rejected { .. } => "REJECT",
            PipelineOutcome::Approved { .. } => "APPROVED",
        }
    }
}

/// Deterministic back-office shared by every session.
#[derive(Debug, Clone)]
pub struct Backoffice {
    directory: Arc<CustomerDirectory>,
    letters_dir: PathBuf,
}

impl Backoffice {
    pub fn new(directory: Arc<CustomerDirectory>, letters_dir: PathBuf) -> Self {
        Self { directory, letters_dir }
    }

    pub fn directory(&self) -> &CustomerDirectory {
        &self.directory
    }

    pub fn letters_dir(&self) -> &PathBuf {
        &self.letters_dir
    }

    /// Verification agent: KYC against the CRM.
    pub fn verify(&self, phone: &str) -> Verification {
        match self.directory.crm_get_customer_by_phone(phone) {
            Some(c) => Verification {
                verified: true,
                name: c.name.clone(),
                address: c.address.clone(),
            },
            None => Verification { verified: false, name: String::new(), address: String::new() },
        }
    }

    /// Underwriting agent: bureau score and offer-mart limit through the rule table.
    pub fn underwrite(&self, ctx: &LoanContext) -> Result<Assessment, AppError> {
        let application = Application {
            loan_amount: ctx.loan_amount,
            tenure_months: ctx.tenure_months,
            annual_rate_pct: ctx.annual_rate_pct,
            monthly_salary: ctx.monthly_salary,
            credit_score: self.directory.credit_bureau_get_score(&ctx.customer_phone),
            pre_approved_limit: self
                .directory
                .offer_mart_get_preapproved_limit(&ctx.customer_phone),
        };
        let assessment = underwriting::evaluate(&application)?;
        debug!(
            phone = %ctx.customer_phone,
            score = application.credit_score,
            limit = application.pre_approved_limit,
            decision = ?assessment.decision,
            "underwriting decision"
        );
        Ok(assessment)
    }

    /// Sanction agent: render and store the letter.
    pub fn issue_letter(
        &self,
        ctx: &LoanContext,
        customer_name: &str,
        emi: f64,
    ) -> Result<(SanctionLetter, PathBuf), AppError> {
        let letter = SanctionLetter::new(
            customer_name,
            ctx.customer_phone.as_str(),
            ctx.loan_amount,
            ctx.tenure_months,
            ctx.annual_rate_pct,
            emi,
            chrono::Local::now().date_naive(),
        );
        let path = letter.write_to(&self.letters_dir)?;
        Ok((letter, path))
    }

    /// Master controller: route one application through every desk.
    pub fn orchestrate(&self, ctx: &LoanContext) -> Result<PipelineOutcome, AppError> {
        let kyc = self.verify(&ctx.customer_phone);
        if !kyc.verified {
            info!(phone = %ctx.customer_phone, "KYC failed");
            return Ok(PipelineOutcome::KycFailed {
                message: "KYC verification failed. Please check phone.".to_string(),
            });
        }

        let assessment = self.underwrite(ctx)?;
        let outcome = match assessment.decision {
            Decision::Reject(reason) => PipelineOutcome::Rejected { reason, emi: assessment.emi },
            Decision::RequireSalary => PipelineOutcome::RequireSalary { emi: assessment.emi },
            Decision::ApproveInstant => {
                let emi = assessment.emi.unwrap_or_default();
                let (letter, pdf_path) = self.issue_letter(ctx, &kyc.name, emi)?;
                PipelineOutcome::Approved { emi, letter, pdf_path }
            }
        };
        info!(phone = %ctx.customer_phone, status = outcome.status(), "pipeline finished");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::tools::Customer;

    fn customer(phone: &str, score: u32, limit: f64) -> Customer {
        Customer {
            name: "Test Customer".to_string(),
            phone: phone.to_string(),
            address: "1 Test Road".to_string(),
            city: Some("Pune".to_string()),
            credit_score: score,
            pre_approved_limit: limit,
            monthly_salary: 60_000.0,
        }
    }

    fn backoffice(dir: &std::path::Path) -> Backoffice {
        let directory = CustomerDirectory::new(vec![
            customer("9000000001", 750, 500_000.0),
            customer("9000000002", 650, 500_000.0),
        ]);
        Backoffice::new(Arc::new(directory), dir.join("letters"))
    }

    fn ctx(phone: &str, amount: f64, salary: Option<f64>) -> LoanContext {
        LoanContext {
            customer_phone: phone.to_string(),
            loan_amount: amount,
            tenure_months: 36,
            annual_rate_pct: 12.0,
            monthly_salary: salary,
        }
    }

    #[test]
    fn verify_unknown_phone() {
        let tmp = tempfile::tempdir().unwrap();
        let v = backoffice(tmp.path()).verify("1111111111");
        assert!(!v.verified);
        assert!(v.name.is_empty());
    }

    #[test]
    fn orchestrate_unknown_phone_is_kyc_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let out = backoffice(tmp.path()).orchestrate(&ctx("1111111111", 100_000.0, None)).unwrap();
        assert_eq!(out.status(), "KYC_FAILED");
    }

    #[test]
    fn orchestrate_within_limit_issues_letter() {
        let tmp = tempfile::tempdir().unwrap();
        let out = backoffice(tmp.path()).orchestrate(&ctx("9000000001", 500_000.0, None)).unwrap();
        match out {
            PipelineOutcome::Approved { emi, letter, pdf_path } => {
                assert!((emi - 16_607.15).abs() < 0.01);
                assert_eq!(letter.customer_name, "Test Customer");
                assert!(pdf_path.starts_with(tmp.path().join("letters")));
                assert!(pdf_path.exists());
            }
            other => panic!("expected approval, got {other:?}"),
        }
    }

    #[test]
    fn orchestrate_stretch_without_salary_asks_for_it() {
        let tmp = tempfile::tempdir().unwrap();
        let out = backoffice(tmp.path()).orchestrate(&ctx("9000000001", 800_000.0, None)).unwrap();
        assert!(matches!(out, PipelineOutcome::RequireSalary { emi: Some(_) }));
    }

    #[test]
    fn orchestrate_low_score_rejects() {
        let tmp = tempfile::tempdir().unwrap();
        let out = backoffice(tmp.path()).orchestrate(&ctx("9000000002", 100_000.0, None)).unwrap();
        assert_eq!(
            out,
            PipelineOutcome::Rejected { reason: RejectReason::LowCreditScore, emi: None }
        );
        assert!(!tmp.path().join("letters").exists());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(PipelineOutcome::RequireSalary { emi: Some(1.0) }).unwrap();
        assert_eq!(json["status"], "REQUIRE_SALARY");
        assert_eq!(json["emi"], 1.0);
    }
}
