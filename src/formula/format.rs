//! Significant-figure formatting for measured values.

/// Default significant digits of a reported uncertainty.
pub const DEFAULT_SIG_DIGITS: i32 = 2;

/// Round to `ndigits` decimal places (negative rounds to tens, hundreds, ...).
///
/// Ties go to even, on the exact binary value.
pub fn round_to(value: f64, ndigits: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    if ndigits >= 0 {
        let text = format!("{:.*}", ndigits as usize, value);
        text.parse().unwrap_or(value)
    } else {
        let scale = 10f64.powi(-ndigits);
        (value / scale).round_ties_even() * scale
    }
}

/// `value ± uncertainty` with the uncertainty rounded to `sig_digits`
/// significant digits and the value rounded to the same decimal place.
///
/// A zero or non-finite uncertainty formats only the value, in `%g` style.
pub fn scientific_round(value: f64, uncertainty: f64, sig_digits: i32) -> String {
    if uncertainty == 0.0 || !uncertainty.is_finite() {
        return format_general(value, sig_digits.max(1) as usize);
    }
    let order = uncertainty.abs().log10().floor() as i32;
    let ndigits = -order + sig_digits - 1;
    let u = round_to(uncertainty, ndigits);
    let v = round_to(value, ndigits);
    if order >= 0 {
        format!("{v:.0} ± {u:.0}")
    } else {
        let decimals = ndigits as usize;
        format!("{v:.decimals$} ± {u:.decimals$}")
    }
}

/// C-style `%.{sig}g`: fixed or exponent notation, trailing zeros trimmed.
pub fn format_general(value: f64, sig: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sig = sig.max(1);
    // Rust's `{:e}` does the rounding; read the exponent back from it.
    let sci = format!("{:.*e}", sig - 1, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => (sci.clone(), 0),
    };

    if exp < -4 || exp >= sig as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(&mantissa), sign, exp.abs())
    } else {
        let decimals = (sig as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_uncertainty_precision() {
        assert_eq!(scientific_round(9.0, 0.447, 2), "9.00 ± 0.45");
        assert_eq!(scientific_round(1.23456, 0.0123, 2), "1.235 ± 0.012");
        assert_eq!(scientific_round(1234.4, 56.0, 2), "1234 ± 56");
        assert_eq!(scientific_round(98763.0, 432.0, 2), "98760 ± 430");
        assert_eq!(scientific_round(12.34, 1.5, 2), "12 ± 2");
    }

    #[test]
    fn zero_uncertainty_uses_general_format() {
        assert_eq!(scientific_round(9.0, 0.0, 2), "9");
        assert_eq!(scientific_round(0.012345, f64::NAN, 2), "0.012");
        assert_eq!(scientific_round(123456.0, 0.0, 2), "1.2e+05");
    }

    #[test]
    fn general_format_matches_printf() {
        assert_eq!(format_general(1.0e-5, 2), "1e-05");
        assert_eq!(format_general(0.0001234, 2), "0.00012");
        assert_eq!(format_general(99.9, 2), "1e+02");
        assert_eq!(format_general(-2.5, 3), "-2.5");
        assert_eq!(format_general(f64::INFINITY, 2), "inf");
    }

    #[test]
    fn round_to_handles_negative_places() {
        assert_eq!(round_to(1234.5, -1), 1230.0);
        assert_eq!(round_to(1.4142, 2), 1.41);
        assert_eq!(round_to(1.41421356, 3), 1.414);
    }
}
