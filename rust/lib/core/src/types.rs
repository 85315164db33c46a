use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};

/// A record id paired with its display name.
///
/// This is the wire form of a to-one relation: `[42, "Azure Interior"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub id: i64,
    pub name: String,
}

impl RecordRef {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

impl Serialize for RecordRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.id)?;
        tup.serialize_element(&self.name)?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for RecordRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RefVisitor;

        impl<'de> Visitor<'de> for RefVisitor {
            type Value = RecordRef;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a [id, name] pair")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RecordRef, A::Error> {
                let id: serde_json::Value = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let name: serde_json::Value = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                if seq.next_element::<serde_json::Value>()?.is_some() {
                    return Err(de::Error::invalid_length(3, &self));
                }
                let id = cast_to_integer(&id)
                    .ok_or_else(|| de::Error::custom(format!("invalid record id: {}", id)))?;
                let name = name
                    .as_str()
                    .ok_or_else(|| de::Error::custom(format!("invalid record name: {}", name)))?;
                Ok(RecordRef::new(id, name))
            }
        }

        deserializer.deserialize_seq(RefVisitor)
    }
}

/// Interpret a JSON value as an integer.
///
/// Accepts integers and floats without a fractional part, since JSON
/// clients do not always distinguish the two.
pub fn cast_to_integer(v: &serde_json::Value) -> Option<i64> {
    if let Some(i) = v.as_i64() {
        return Some(i);
    }
    match v.as_f64() {
        Some(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
        _ => None,
    }
}

/// Get the current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Upper-case the first character of `s`, leaving the rest unchanged.
pub fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_ref_serializes_as_pair() {
        let r = RecordRef::new(3, "Deco Addict");
        assert_eq!(serde_json::to_value(&r).unwrap(), json!([3, "Deco Addict"]));
    }

    #[test]
    fn record_ref_accepts_float_id() {
        let r: RecordRef = serde_json::from_value(json!([3.0, "Deco Addict"])).unwrap();
        assert_eq!(r, RecordRef::new(3, "Deco Addict"));
    }

    #[test]
    fn record_ref_rejects_other_shapes() {
        assert!(serde_json::from_value::<RecordRef>(json!(3)).is_err());
        assert!(serde_json::from_value::<RecordRef>(json!([3])).is_err());
        assert!(serde_json::from_value::<RecordRef>(json!([3, 4])).is_err());
        assert!(serde_json::from_value::<RecordRef>(json!([3, "a", "b"])).is_err());
        assert!(serde_json::from_value::<RecordRef>(json!(["a", "b"])).is_err());
    }

    #[test]
    fn test_cast_to_integer() {
        assert_eq!(cast_to_integer(&json!(5)), Some(5));
        assert_eq!(cast_to_integer(&json!(5.0)), Some(5));
        assert_eq!(cast_to_integer(&json!(5.5)), None);
        assert_eq!(cast_to_integer(&json!(false)), None);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("search"), "Search");
        assert_eq!(title_case(""), "");
        assert_eq!(title_case("Read"), "Read");
    }

    #[test]
    fn test_now_rfc3339() {
        assert!(now_rfc3339().contains('T'));
    }
}
