//! Conversions from raw CLI strings

/// Usage line printed by rank 0 when the positional argument count is wrong
pub const USAGE: &str = "Usage: randwalk [--np <p>] <domain_size> <max_steps>";

/// Parse an integer the way C's `atoi` does
///
/// Leading whitespace is skipped, one optional sign is accepted, then the
/// longest run of ASCII digits is read. Anything after the digits is ignored.
/// No digits yields 0. Out-of-range values saturate.
pub fn parse_int_lenient(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        let digit = i64::from(b - b'0');
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_numbers() {
        assert_eq!(parse_int_lenient("0"), 0);
        assert_eq!(parse_int_lenient("42"), 42);
        assert_eq!(parse_int_lenient("-17"), -17);
        assert_eq!(parse_int_lenient("+8"), 8);
    }

    #[test]
    fn test_parse_non_numeric_is_zero() {
        assert_eq!(parse_int_lenient(""), 0);
        assert_eq!(parse_int_lenient("abc"), 0);
        assert_eq!(parse_int_lenient("-"), 0);
        assert_eq!(parse_int_lenient("- 5"), 0);
        assert_eq!(parse_int_lenient("x12"), 0);
    }

    #[test]
    fn test_parse_prefix_and_whitespace() {
        assert_eq!(parse_int_lenient("  12"), 12);
        assert_eq!(parse_int_lenient("\t-3"), -3);
        assert_eq!(parse_int_lenient("100steps"), 100);
        assert_eq!(parse_int_lenient("7.9"), 7);
        assert_eq!(parse_int_lenient("12 34"), 12);
    }

    #[test]
    fn test_parse_saturates() {
        assert_eq!(parse_int_lenient("99999999999999999999999"), i64::MAX);
        assert_eq!(parse_int_lenient("-99999999999999999999999"), i64::MIN);
    }
}
