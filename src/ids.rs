use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Strongly typed correlation identifier backed by ULID.
///
/// One is generated per outbound call and echoed back unchanged by the serving
/// side, which is what lets responses arriving out of order find their caller.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct CorrelationId(pub ulid::Ulid);

impl CorrelationId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Parse the id carried on a wire message. Empty or malformed ids yield `None`.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        if value.is_empty() {
            return None;
        }
        value.parse().ok()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = ulid::Ulid::from_string(s)?;
        Ok(CorrelationId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_wire() {
        let id = CorrelationId::new();
        assert_eq!(CorrelationId::from_wire(&id.to_string()), Some(id));
        assert_eq!(CorrelationId::from_wire(""), None);
        assert_eq!(CorrelationId::from_wire("not-a-ulid"), None);
    }

    #[test]
    fn test_wire_form_is_ulid_text() {
        let id = CorrelationId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 26);
        assert_eq!(text.parse::<CorrelationId>().unwrap(), id);
        assert!("not-a-ulid".parse::<CorrelationId>().is_err());
    }
}
