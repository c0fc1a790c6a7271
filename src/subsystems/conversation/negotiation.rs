//! Rate and amount negotiation intents.

use super::parse::extract_number;

const RATE_TERMS: &[&str] = &["rate", "interest", "roi", "percentage"];
const RATE_ADJUST_TERMS: &[&str] = &["lower", "less", "reduce", "drop", "discount", "better"];

const AMOUNT_TERMS: &[&str] = &[
    "loan", "amount", "principal", "ticket", "disburse", "sanction", "lakh", "lac", "crore", "limit",
];
const AMOUNT_ADJUST_TERMS: &[&str] = &[
    "less", "lower", "reduce", "drop", "smaller", "instead", "maybe", "around", "about", "approve",
    "can you", "could you", "let's", "do",
];

/// Requested rates below this are not read as a rate at all.
pub const MIN_PLAUSIBLE_RATE_PCT: f64 = 5.0;

fn mentions_any(lowered: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| lowered.contains(t))
}

/// The customer is asking for a better interest rate.
pub fn wants_lower_rate(text: &str) -> bool {
    let lowered = text.to_lowercase();
    mentions_any(&lowered, RATE_TERMS) && mentions_any(&lowered, RATE_ADJUST_TERMS)
}

/// The customer is proposing a different loan amount.
pub fn wants_amount_adjustment(text: &str) -> bool {
    if extract_number(text).is_none() {
        return false;
    }
    let lowered = text.to_lowercase();
    lowered.contains("instead")
        || (mentions_any(&lowered, AMOUNT_TERMS) && mentions_any(&lowered, AMOUNT_ADJUST_TERMS))
}

/// Floor rate sales may pitch for a bureau score.
pub fn compute_best_rate(credit_score: u32) -> f64 {
    match credit_score {
        800.. => 9.75,
        760..=799 => 10.25,
        720..=759 => 10.75,
        680..=719 => 11.25,
        _ => 11.75,
    }
}

/// Rate sales will pitch: the score floor, or the customer's own ask when it
/// is higher.  Without a plausible ask, half a point off `current`.
pub fn propose_rate(current: f64, credit_score: u32, requested: Option<f64>) -> f64 {
    let best = compute_best_rate(credit_score);
    match requested.filter(|r| *r >= MIN_PLAUSIBLE_RATE_PCT) {
        Some(r) => best.max(r),
        None => best.max(current - 0.5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_intent_needs_both_terms() {
        assert!(wants_lower_rate("Can you lower the interest?"));
        assert!(wants_lower_rate("any discount on the ROI"));
        assert!(!wants_lower_rate("what is the rate"));
        assert!(!wants_lower_rate("lower please"));
    }

    #[test]
    fn amount_intent_needs_a_figure() {
        assert!(wants_amount_adjustment("make it 300000 instead"));
        assert!(wants_amount_adjustment("could you approve a loan of 4 lakh"));
        assert!(!wants_amount_adjustment("lower the loan amount"));
        assert!(!wants_amount_adjustment("36 months"));
    }

    #[test]
    fn best_rate_tiers() {
        assert_eq!(compute_best_rate(812), 9.75);
        assert_eq!(compute_best_rate(800), 9.75);
        assert_eq!(compute_best_rate(765), 10.25);
        assert_eq!(compute_best_rate(720), 10.75);
        assert_eq!(compute_best_rate(690), 11.25);
        assert_eq!(compute_best_rate(0), 11.75);
    }

    #[test]
    fn proposal_respects_the_floor() {
        // no ask: half a point off, never below the tier floor
        assert_eq!(propose_rate(12.0, 780, None), 11.5);
        assert_eq!(propose_rate(10.5, 780, None), 10.25);
        // an ask below the floor is lifted to it
        assert_eq!(propose_rate(12.0, 780, Some(9.0)), 10.25);
        assert_eq!(propose_rate(12.0, 780, Some(11.0)), 11.0);
        // implausible asks are ignored
        assert_eq!(propose_rate(12.0, 812, Some(2.0)), 11.5);
    }
}
