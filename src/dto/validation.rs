//! Validation and coercion helpers for DTOs.

use serde_json::Value;

/// Read a count the way a browser number field is read.
///
/// Strings keep their leading integer prefix, anything non-numeric becomes 0,
/// negatives clamp to 0, fractions truncate and overflow saturates.
///
/// # Examples
///
/// ```ignore
/// coerce_count(&json!(3))       // 3
/// coerce_count(&json!("12abc")) // 12
/// coerce_count(&json!("abc"))   // 0
/// coerce_count(&json!(-4))      // 0
/// ```
pub fn coerce_count(value: &Value) -> u32 {
    match value {
        Value::Number(number) => {
            if let Some(unsigned) = number.as_u64() {
                u32::try_from(unsigned).unwrap_or(u32::MAX)
            } else if number.is_i64() {
                0
            } else {
                number.as_f64().map_or(0, saturate_float)
            }
        }
        Value::String(text) => leading_integer(text),
        _ => 0,
    }
}

fn saturate_float(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        0
    } else if value >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        value.trunc() as u32
    }
}

fn leading_integer(text: &str) -> u32 {
    let trimmed = text.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits = unsigned
        .bytes()
        .take_while(u8::is_ascii_digit)
        .collect::<Vec<u8>>();
    if negative || digits.is_empty() {
        return 0;
    }
    digits.iter().fold(0u32, |acc, digit| {
        acc.saturating_mul(10).saturating_add(u32::from(digit - b'0'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_numbers() {
        assert_eq!(coerce_count(&json!(0)), 0);
        assert_eq!(coerce_count(&json!(17)), 17);
        assert_eq!(coerce_count(&json!(-3)), 0);
        assert_eq!(coerce_count(&json!(2.9)), 2);
        assert_eq!(coerce_count(&json!(-0.5)), 0);
        assert_eq!(coerce_count(&json!(10_000_000_000u64)), u32::MAX);
    }

    #[test]
    fn test_coerce_strings() {
        assert_eq!(coerce_count(&json!("3")), 3);
        assert_eq!(coerce_count(&json!("  12abc")), 12);
        assert_eq!(coerce_count(&json!("+5")), 5);
        assert_eq!(coerce_count(&json!("3.7")), 3);
        assert_eq!(coerce_count(&json!("-2")), 0);
        assert_eq!(coerce_count(&json!("")), 0); // empty field
        assert_eq!(coerce_count(&json!("abc")), 0);
        assert_eq!(coerce_count(&json!("99999999999")), u32::MAX);
    }

    #[test]
    fn test_coerce_other_values() {
        assert_eq!(coerce_count(&Value::Null), 0);
        assert_eq!(coerce_count(&json!(true)), 0);
        assert_eq!(coerce_count(&json!([1])), 0);
    }
}
