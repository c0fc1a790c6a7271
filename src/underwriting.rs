//! Underwriting rule table and EMI math.
//!
//! [`decide`] is the whole credit policy: a fixed-order, four-branch table
//! over the loan amount, the customer's pre-approved limit, the bureau score
//! and (for the stretch band) the EMI-to-salary ratio.  [`evaluate`] wraps it
//! with input validation and EMI computation.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Bureau scores strictly below this are declined outright.
pub const MIN_CREDIT_SCORE: u32 = 700;
/// Loans up to this multiple of the pre-approved limit may be stretched
/// against a salary slip.
pub const STRETCH_MULTIPLIER: f64 = 2.0;
/// Maximum share of monthly salary the EMI may consume in the stretch band.
pub const MAX_EMI_TO_SALARY: f64 = 0.5;
/// Annual interest rate used when the conversation has not negotiated one.
pub const DEFAULT_ANNUAL_RATE_PCT: f64 = 12.0;

#[derive(Debug, Error, PartialEq)]
pub enum UnderwritingError {
    #[error("loan amount must be a positive number, got {0}")]
    InvalidAmount(f64),
    #[error("tenure must be at least one month, got {0}")]
    InvalidTenure(u32),
}

/// Why an application was declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    LowCreditScore,
    EmiExceedsSalaryShare,
    ExceedsStretchLimit,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::LowCreditScore => write!(f, "credit score below {MIN_CREDIT_SCORE}"),
            RejectReason::EmiExceedsSalaryShare => write!(f, "EMI exceeds 50% of salary"),
            RejectReason::ExceedsStretchLimit => {
                write!(f, "loan amount exceeds 2x pre-approved limit")
            }
        }
    }
}

/// Outcome of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    ApproveInstant,
    /// Conditional approval: a salary slip is needed before the EMI check.
    RequireSalary,
    Reject(RejectReason),
}

/// Everything the underwriting agent needs to assess one loan request.
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub loan_amount: f64,
    pub tenure_months: u32,
    pub annual_rate_pct: f64,
    /// Monthly take-home salary; `None` (or non-positive) means no slip yet.
    pub monthly_salary: Option<f64>,
    pub credit_score: u32,
    pub pre_approved_limit: f64,
}

/// Decision plus the EMI it was computed against (absent when the credit
/// gate or the stretch ceiling rejects before any EMI is needed).
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub decision: Decision,
    pub emi: Option<f64>,
}

impl Assessment {
    pub fn reason(&self) -> Option<RejectReason> {
        match self.decision {
            Decision::Reject(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Equated monthly instalment for `principal` at `annual_rate_pct` over
/// `tenure_months`.  A zero rate degenerates to straight division.
///
/// `tenure_months` must be non-zero; [`evaluate`] enforces that.
pub fn compute_emi(principal: f64, annual_rate_pct: f64, tenure_months: u32) -> f64 {
    let r = annual_rate_pct / 12.0 / 100.0;
    let n = tenure_months as f64;
    if r == 0.0 {
        return principal / n;
    }
    let growth = (1.0 + r).powf(n);
    principal * r * growth / (growth - 1.0)
}

/// The rule table, in fixed order:
///
/// 1. score below 700 → reject (dominates everything else)
/// 2. amount within the limit → instant approval
/// 3. amount within twice the limit → salary slip first, then approve iff
///    `emi <= 0.5 * salary`
/// 4. anything larger → reject
pub fn decide(
    loan_amount: f64,
    pre_approved_limit: f64,
    credit_score: u32,
    emi: f64,
    monthly_salary: Option<f64>,
) -> Decision {
    if credit_score < MIN_CREDIT_SCORE {
        return Decision::Reject(RejectReason::LowCreditScore);
    }
    if loan_amount <= pre_approved_limit {
        return Decision::ApproveInstant;
    }
    if loan_amount <= STRETCH_MULTIPLIER * pre_approved_limit {
        return match monthly_salary.filter(|s| *s > 0.0) {
            None => Decision::RequireSalary,
            Some(salary) if emi <= MAX_EMI_TO_SALARY * salary => Decision::ApproveInstant,
            Some(_) => Decision::Reject(RejectReason::EmiExceedsSalaryShare),
        };
    }
    Decision::Reject(RejectReason::ExceedsStretchLimit)
}

/// Validate `application`, compute its EMI and run it through [`decide`].
pub fn evaluate(application: &Application) -> Result<Assessment, UnderwritingError> {
    let amount = application.loan_amount;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(UnderwritingError::InvalidAmount(amount));
    }
    if application.tenure_months == 0 {
        return Err(UnderwritingError::InvalidTenure(application.tenure_months));
    }

    let emi = compute_emi(amount, application.annual_rate_pct, application.tenure_months);
    let decision = decide(
        amount,
        application.pre_approved_limit,
        application.credit_score,
        emi,
        application.monthly_salary,
    );

    let emi = match decision {
        Decision::Reject(RejectReason::LowCreditScore)
        | Decision::Reject(RejectReason::ExceedsStretchLimit) => None,
        _ => Some(emi),
    };

    Ok(Assessment { decision, emi })
}
