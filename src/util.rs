//! Stateless helpers for query strings and number display.

use std::collections::BTreeMap;

/// A decoded query-string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    /// Collected from keys ending in `[]`.
    List(Vec<String>),
}

/// Decode a query string (`a=1&b[]=x&b[]=y`) into a map.
///
/// A repeated plain key keeps its last value; keys ending in `[]` collect
/// every value in order. A leading `?` is ignored.
pub fn query_string_to_map(query: &str) -> BTreeMap<String, QueryValue> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut map = BTreeMap::new();

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let key = key.into_owned();
        let value = value.into_owned();
        if key.ends_with("[]") {
            match map
                .entry(key)
                .or_insert_with(|| QueryValue::List(Vec::new()))
            {
                QueryValue::List(values) => values.push(value),
                single => *single = QueryValue::List(vec![value]),
            }
        } else {
            map.insert(key, QueryValue::Single(value));
        }
    }

    map
}

pub const DEFAULT_DIGITS: usize = 2;

/// Round a number according to its magnitude.
///
/// Values with `round(log10(|v|))` in `-3..=6` are printed in fixed notation
/// with `digits - order` decimals (at least none); anything else uses
/// exponential notation with an explicit exponent sign (`1.23e+7`). `digits`
/// of 0 falls back to [`DEFAULT_DIGITS`].
pub fn smart_to_string(value: f64, digits: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let digits = if digits == 0 { DEFAULT_DIGITS } else { digits };

    let order = value.abs().log10().round() as i64;
    if (-3..=6).contains(&order) {
        let decimals = (digits as i64 - order).max(0) as usize;
        let value = round_exact_tie(value, -(decimals as i32));
        format!("{value:.decimals$}")
    } else {
        let exponent = value.abs().log10().floor() as i32;
        let value = round_exact_tie(value, exponent - digits as i32);
        let formatted = format!("{value:.digits$e}");
        match formatted.split_once('e') {
            Some((mantissa, exp)) => match exp.parse::<i32>() {
                Ok(exp) => format!("{mantissa}e{exp:+}"),
                Err(_) => formatted.clone(),
            },
            None => formatted.clone(),
        }
    }
}

/// `{:.N}` rounds exact ties to even; round them away from zero instead.
/// `unit` is the power of ten of the last digit kept.
fn round_exact_tie(value: f64, unit: i32) -> f64 {
    let scale = 10f64.powi(unit.abs());
    let scaled = if unit >= 0 { value / scale } else { value * scale };
    if scaled.fract().abs() != 0.5 {
        return value;
    }
    if unit >= 0 {
        scaled.round() * scale
    } else {
        scaled.round() / scale
    }
}

/// Format a number like C's `%g`: six significant digits, trailing zeros
/// dropped, exponent form (`1e-05`, `1.23457e+06`) outside `1e-4..1e6`.
pub fn format_g(value: f64) -> String {
    const PRECISION: i32 = 6;
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let scientific = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return value.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return value.to_string();
    };

    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction_zeros(mantissa),
            exponent.abs()
        )
    } else {
        let decimals = (PRECISION - 1 - exponent) as usize;
        trim_fraction_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_empty_map() {
        assert!(query_string_to_map("").is_empty());
        assert!(query_string_to_map("?").is_empty());
    }

    #[test]
    fn query_decodes_pairs() {
        let map = query_string_to_map("layer_height=0.2&label=eval%20part");
        assert_eq!(map["layer_height"], QueryValue::Single("0.2".into()));
        assert_eq!(map["label"], QueryValue::Single("eval part".into()));
    }

    #[test]
    fn repeated_plain_key_keeps_last() {
        let map = query_string_to_map("a=1&a=2");
        assert_eq!(map["a"], QueryValue::Single("2".into()));
    }

    #[test]
    fn bracket_keys_collect_lists() {
        let map = query_string_to_map("?sizes[]=1&sizes[]=2&sizes[]=3");
        assert_eq!(
            map["sizes[]"],
            QueryValue::List(vec!["1".into(), "2".into(), "3".into()])
        );
    }

    #[test]
    fn key_without_value() {
        let map = query_string_to_map("flag");
        assert_eq!(map["flag"], QueryValue::Single(String::new()));
    }

    #[test]
    fn smart_zero() {
        assert_eq!(smart_to_string(0.0, 2), "0");
    }

    #[test]
    fn smart_fixed_notation_scales_with_magnitude() {
        assert_eq!(smart_to_string(0.2, 2), "0.200");
        assert_eq!(smart_to_string(1.5, 2), "1.50");
        assert_eq!(smart_to_string(42.0, 2), "42");
        assert_eq!(smart_to_string(1234.4, 2), "1234");
        assert_eq!(smart_to_string(-0.2, 2), "-0.200");
    }

    #[test]
    fn smart_exponential_outside_range() {
        assert_eq!(smart_to_string(12_345_678.0, 2), "1.23e+7");
        assert_eq!(smart_to_string(0.000_012_34, 2), "1.23e-5");
    }

    #[test]
    fn smart_ties_round_away_from_zero() {
        assert_eq!(smart_to_string(1234.5, 2), "1235");
        assert_eq!(smart_to_string(100.5, 2), "101");
        assert_eq!(smart_to_string(-100.5, 2), "-101");
        assert_eq!(smart_to_string(0.0625, 2), "0.063");
        assert_eq!(smart_to_string(12_250_000.0, 2), "1.23e+7");
    }

    #[test]
    fn format_g_matches_printf() {
        assert_eq!(format_g(0.1 + 0.2), "0.3");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(1_234_567.0), "1.23457e+06");
        assert_eq!(format_g(123_456.0), "123456");
        assert_eq!(format_g(2.0), "2");
        assert_eq!(format_g(-0.0001), "-0.0001");
        assert_eq!(format_g(0.0), "0");
    }

    #[test]
    fn smart_zero_digits_uses_default() {
        assert_eq!(smart_to_string(1.5, 0), smart_to_string(1.5, DEFAULT_DIGITS));
    }

    #[test]
    fn smart_non_finite() {
        assert_eq!(smart_to_string(f64::NAN, 2), "NaN");
    }
}
