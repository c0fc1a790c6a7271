//! Currency formatting shared by chat replies and the sanction letter.

/// Format `amount` with comma-grouped thousands and `decimals` fraction digits,
/// e.g. `group_thousands(1234567.891, 2) == "1,234,567.89"`.
pub fn group_thousands(amount: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, amount.abs());
    let (whole, fraction) = match formatted.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3 + decimals + 2);
    if amount < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        grouped.push('-');
    }
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(f) = fraction {
        grouped.push('.');
        grouped.push_str(f);
    }
    grouped
}

/// Whole-rupee display used in chat: `₹500,000`.  `None` renders as `₹0`.
pub fn format_currency(amount: Option<f64>) -> String {
    match amount {
        Some(a) => format!("₹{}", group_thousands(a, 0)),
        None => "₹0".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_whole_numbers() {
        assert_eq!(group_thousands(0.0, 0), "0");
        assert_eq!(group_thousands(999.0, 0), "999");
        assert_eq!(group_thousands(1000.0, 0), "1,000");
        assert_eq!(group_thousands(1_200_000.0, 0), "1,200,000");
    }

    #[test]
    fn keeps_requested_decimals() {
        assert_eq!(group_thousands(26_570.9, 2), "26,570.90");
        assert_eq!(group_thousands(1_234_567.891, 2), "1,234,567.89");
    }

    #[test]
    fn rounds_to_whole_rupees() {
        assert_eq!(format_currency(Some(26_570.51)), "₹26,571");
        assert_eq!(format_currency(None), "₹0");
    }

    #[test]
    fn negative_amounts_keep_sign() {
        assert_eq!(group_thousands(-12_345.0, 0), "-12,345");
    }
}
