//! Identifier normalization.
//!
//! The indexer keys every entity by a felt rendered as `0x` followed by
//! exactly [`ID_HEX_WIDTH`] lowercase hex digits. Values supplied by callers
//! (numbers, short hex strings, decimal strings) must be padded to that form
//! before they are used in a filter, otherwise equality predicates never match.

use alloy_primitives::U256;

use crate::error::SyncError;

/// Number of hex digits in a normalized identifier (256 bits).
pub const ID_HEX_WIDTH: usize = 64;

/// A value that can be normalized into a padded hex identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdInput {
    /// Already-numeric value.
    Uint(U256),
    /// Signed value; only non-negative values are accepted.
    Int(i128),
    /// `0x`-prefixed hex or plain decimal digits.
    Text(String),
}

impl From<U256> for IdInput {
    fn from(v: U256) -> Self {
        Self::Uint(v)
    }
}

impl From<u64> for IdInput {
    fn from(v: u64) -> Self {
        Self::Uint(U256::from(v))
    }
}

impl From<u128> for IdInput {
    fn from(v: u128) -> Self {
        Self::Uint(U256::from(v))
    }
}

impl From<i64> for IdInput {
    fn from(v: i64) -> Self {
        Self::Int(v as i128)
    }
}

impl From<i128> for IdInput {
    fn from(v: i128) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for IdInput {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for IdInput {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&String> for IdInput {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

/// Normalize `input` into `0x` + 64 zero-padded lowercase hex digits.
///
/// Idempotent: a normalized identifier is returned unchanged.
///
/// # Errors
/// [`SyncError::Normalization`] for negative values, empty or non-numeric
/// strings, and values that do not fit in 256 bits.
pub fn normalize_id(input: impl Into<IdInput>) -> Result<String, SyncError> {
    let value = match input.into() {
        IdInput::Uint(v) => v,
        IdInput::Int(v) if v < 0 => {
            return Err(SyncError::normalization(v.to_string(), "negative value"));
        }
        IdInput::Int(v) => U256::from(v as u128),
        IdInput::Text(s) if is_normalized(&s) => return Ok(s),
        IdInput::Text(s) => parse_text(&s)?,
    };
    Ok(format!("0x{}", hex::encode(value.to_be_bytes::<32>())))
}

/// Normalize every identifier in `inputs`, failing on the first invalid one.
pub fn normalize_ids<I, T>(inputs: I) -> Result<Vec<String>, SyncError>
where
    I: IntoIterator<Item = T>,
    T: Into<IdInput>,
{
    inputs.into_iter().map(|input| normalize_id(input)).collect()
}

/// Returns `true` if `s` is already in normalized form.
pub fn is_normalized(s: &str) -> bool {
    s.strip_prefix("0x").is_some_and(|digits| {
        digits.len() == ID_HEX_WIDTH
            && digits
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    })
}

fn parse_text(raw: &str) -> Result<U256, SyncError> {
    let s = raw.trim();
    if s.starts_with('-') {
        return Err(SyncError::normalization(raw, "negative value"));
    }

    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    if digits.is_empty() {
        return Err(SyncError::normalization(raw, "no digits"));
    }
    let valid = match radix {
        16 => digits.bytes().all(|b| b.is_ascii_hexdigit()),
        _ => digits.bytes().all(|b| b.is_ascii_digit()),
    };
    if !valid {
        return Err(SyncError::normalization(raw, "not a number"));
    }

    // Leading zeros never change the value but would trip the width check below.
    let significant = digits.trim_start_matches('0');
    if radix == 16 && significant.len() > ID_HEX_WIDTH {
        return Err(SyncError::normalization(raw, "wider than 256 bits"));
    }
    if significant.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(significant, radix)
        .map_err(|_| SyncError::normalization(raw, "wider than 256 bits"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn pads_short_hex() {
        assert_eq!(normalize_id("0x1").unwrap(), ONE);
        assert_eq!(normalize_id("0X1").unwrap(), ONE);
    }

    #[test]
    fn numbers_and_decimal_strings() {
        assert_eq!(normalize_id(1u64).unwrap(), ONE);
        assert_eq!(normalize_id("1").unwrap(), ONE);
        assert_eq!(
            normalize_id(255u128).unwrap(),
            normalize_id("0xff").unwrap()
        );
        assert!(normalize_id(0i64).unwrap().ends_with("0000"));
    }

    #[test]
    fn lowercases_hex() {
        let id = normalize_id("0xABCDEF").unwrap();
        assert!(id.ends_with("abcdef"));
        assert!(is_normalized(&id));
    }

    #[test]
    fn normalized_text_is_returned_as_is() {
        let padded = format!("0x{}", "0".repeat(62) + "2a");
        assert!(is_normalized(&padded));
        assert_eq!(normalize_id(padded.as_str()).unwrap(), padded);
        // surrounding whitespace or uppercase digits take the parsing path
        assert!(!is_normalized(&format!(" {padded}")));
        assert_eq!(normalize_id(format!(" {padded}")).unwrap(), padded);
        let upper = format!("0x{}", "0".repeat(62) + "2A");
        assert!(!is_normalized(&upper));
        assert_eq!(normalize_id(upper).unwrap(), padded);
    }

    #[test]
    fn idempotent() {
        for raw in ["0x1", "12345", "0x49d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7"] {
            let once = normalize_id(raw).unwrap();
            let twice = normalize_id(once.as_str()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn rejects_negative() {
        assert!(normalize_id(-1i64).unwrap_err().is_caller_error());
        assert!(normalize_id("-5").is_err());
    }

    #[test]
    fn rejects_garbage_and_empty() {
        assert!(normalize_id("").is_err());
        assert!(normalize_id("0x").is_err());
        assert!(normalize_id("0xzz").is_err());
        assert!(normalize_id("12a").is_err());
    }

    #[test]
    fn rejects_too_wide() {
        let wide = format!("0x1{}", "0".repeat(ID_HEX_WIDTH));
        assert!(normalize_id(wide).is_err());

        // 2^256 in decimal
        let decimal =
            "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert!(normalize_id(decimal).is_err());
    }

    #[test]
    fn leading_zeros_beyond_width_are_fine() {
        let padded = format!("0x{}1", "0".repeat(ID_HEX_WIDTH + 3));
        assert_eq!(normalize_id(padded).unwrap(), ONE);
    }

    #[test]
    fn batch_normalization() {
        let ids = normalize_ids(["0x1", "2"]).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(normalize_ids(["0x1", "-2"]).is_err());
    }
}
