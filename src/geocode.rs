//! Short deterministic location codes for captured evidence.
//!
//! The code is a display and grouping aid, not an identifier: nearby
//! points may legitimately collide at coarse precision. The same input
//! always produces the same output, which the consistency tests rely on.

/// Default scale factor applied to each coordinate before encoding.
///
/// Chosen so that sub-meter differences produce visibly different codes
/// in the expected operating area. Tunable; changing it changes every
/// code, so treat it as a deployment-wide constant.
pub const DEFAULT_SCALE: f64 = 8000.0;

const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Encode a coordinate pair into a short location code using the
/// default scale, e.g. `"K3F9T1+A2"`.
pub fn encode(latitude: f64, longitude: f64) -> String {
    encode_scaled(latitude, longitude, DEFAULT_SCALE)
}

/// Encode with an explicit scale factor.
///
/// Total over all finite inputs: negative coordinates are folded by
/// absolute value and `(0, 0)` encodes without panicking.
pub fn encode_scaled(latitude: f64, longitude: f64, scale: f64) -> String {
    let lat = to_base36((latitude.abs() * scale) as u64);
    let lng = to_base36((longitude.abs() * scale) as u64);

    format!(
        "{}{}+{}{}",
        tail(&lat, 3),
        tail(&lng, 3),
        tail(&lat, 2),
        tail(&lng, 2)
    )
}

/// Upper-case base-36 rendering of an integer.
fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    // Digits are drawn from a fixed ASCII alphabet.
    String::from_utf8(digits).unwrap_or_default()
}

/// Last `n` characters of an ASCII string, or the whole string when
/// shorter.
fn tail(s: &str, n: usize) -> &str {
    &s[s.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_deterministic() {
        let a = encode(18.5204, 73.8567);
        let b = encode(18.5204, 73.8567);
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_origin_and_negatives_do_not_panic() {
        let origin = encode(0.0, 0.0);
        assert!(origin.contains('+'));

        let neg = encode(-33.8688, -151.2093);
        let pos = encode(33.8688, 151.2093);
        // Absolute-value fold: sign is not encoded.
        assert_eq!(neg, pos);
    }

    #[test]
    fn test_encode_format_shape() {
        let code = encode(18.5204, 73.8567);
        let parts: Vec<&str> = code.split('+').collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 6);
        assert_eq!(parts[1].len(), 4);
        assert!(code.chars().all(|c| c == '+' || c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_nearby_points_differ_at_fine_precision() {
        // ~14m apart at this latitude; the scale is chosen so these
        // produce different codes.
        let a = encode(18.52040, 73.85670);
        let b = encode(18.52053, 73.85670);
        assert_ne!(a, b);
    }

    #[test]
    fn test_custom_scale_changes_output() {
        let fine = encode_scaled(18.5204, 73.8567, 8000.0);
        let coarse = encode_scaled(18.5204, 73.8567, 100.0);
        assert_ne!(fine, coarse);
    }

    #[test]
    fn test_to_base36_zero() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
    }
}
