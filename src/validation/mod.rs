use bigdecimal::BigDecimal;
use std::fmt;

pub const IDEMPOTENCY_KEY_MAX_LEN: usize = 255;
pub const REFERENCE_ID_MAX_LEN: usize = 255;
pub const DESCRIPTION_MAX_LEN: usize = 1024;
/// NUMERIC(20, 6): up to 14 integer digits, 6 fractional digits.
pub const AMOUNT_MAX_INTEGER_DIGITS: i64 = 14;
pub const AMOUNT_MAX_SCALE: i64 = 6;
pub const OWNER_KINDS: &[&str] = &["user", "system"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

/// Amounts are validated on the decimal type itself. Comparing through floats
/// loses scale and admits off-by-one-cent rejections.
pub fn validate_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    let normalized = amount.normalized();
    let scale = normalized.fractional_digit_count();
    if scale > AMOUNT_MAX_SCALE {
        return Err(ValidationError::new(
            field,
            format!("must have at most {} decimal places", AMOUNT_MAX_SCALE),
        ));
    }

    // A negative scale means trailing integer zeros; they still occupy
    // integer digits.
    let integer_digits = normalized.digits() as i64 - scale;
    if integer_digits > AMOUNT_MAX_INTEGER_DIGITS {
        return Err(ValidationError::new(
            field,
            format!("must have at most {} integer digits", AMOUNT_MAX_INTEGER_DIGITS),
        ));
    }

    Ok(())
}

pub fn validate_idempotency_key(key: &str) -> ValidationResult {
    validate_required("Idempotency-Key", key)?;
    validate_max_len("Idempotency-Key", key, IDEMPOTENCY_KEY_MAX_LEN)?;
    Ok(())
}

/// Serde helpers for decimal amounts: serialized as strings, accepted as
/// either JSON strings or JSON numbers. Number literals are re-parsed from
/// their source text so scale survives the trip.
pub mod serde_amount {
    use bigdecimal::BigDecimal;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(text) => text,
            serde_json::Value::Number(number) => number.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected a number or numeric string, got {}",
                    other
                )));
            }
        };

        BigDecimal::from_str(text.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::str::FromStr;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[serde(with = "serde_amount")]
        amount: BigDecimal,
    }

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn validates_enum_values() {
        assert!(validate_enum("ownerType", "user", OWNER_KINDS).is_ok());
        assert!(validate_enum("ownerType", "robot", OWNER_KINDS).is_err());
    }

    #[test]
    fn validates_positive_amount() {
        let positive = BigDecimal::from_str("1.23").unwrap();
        let zero = BigDecimal::from(0);
        let negative = BigDecimal::from(-1);

        assert!(validate_amount("amount", &positive).is_ok());
        assert!(validate_amount("amount", &zero).is_err());
        assert!(validate_amount("amount", &negative).is_err());
    }

    #[test]
    fn validates_amount_scale() {
        assert!(validate_amount("amount", &BigDecimal::from_str("1.123456").unwrap()).is_ok());
        assert!(validate_amount("amount", &BigDecimal::from_str("1.1234567").unwrap()).is_err());
        // Trailing zeros do not count against the scale.
        assert!(validate_amount("amount", &BigDecimal::from_str("1.1000000000").unwrap()).is_ok());
    }

    #[test]
    fn validates_amount_magnitude() {
        let max = BigDecimal::from_str("99999999999999.999999").unwrap();
        let too_big = BigDecimal::from_str("100000000000000").unwrap();

        assert!(validate_amount("amount", &max).is_ok());
        assert!(validate_amount("amount", &too_big).is_err());
    }

    #[test]
    fn validates_idempotency_key() {
        assert!(validate_idempotency_key("k1").is_ok());
        assert!(validate_idempotency_key("").is_err());
        assert!(validate_idempotency_key(&"x".repeat(256)).is_err());
    }

    #[test]
    fn deserializes_amount_from_string() {
        let payload: Payload = serde_json::from_str(r#"{"amount": "100.50"}"#).unwrap();
        assert_eq!(payload.amount, BigDecimal::from_str("100.50").unwrap());
    }

    #[test]
    fn deserializes_amount_from_number() {
        let payload: Payload = serde_json::from_str(r#"{"amount": 100.50}"#).unwrap();
        assert_eq!(payload.amount, BigDecimal::from_str("100.50").unwrap());
    }

    #[test]
    fn rejects_non_numeric_amount() {
        assert!(serde_json::from_str::<Payload>(r#"{"amount": "lots"}"#).is_err());
    }

    #[test]
    fn serializes_amount_as_string() {
        #[derive(serde::Serialize)]
        struct Out {
            #[serde(with = "serde_amount")]
            amount: BigDecimal,
        }

        let out = Out {
            amount: BigDecimal::from_str("42.100000").unwrap(),
        };
        assert_eq!(
            serde_json::to_string(&out).unwrap(),
            r#"{"amount":"42.100000"}"#
        );
    }
}
