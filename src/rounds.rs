use crate::shared::serde_ext::parse_via_string;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

static ROUND_ORDER: [RoundName; 5] = RoundName::ALL;

/// The fixed, ordered round sequence. Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoundName {
    Round0,
    Round1,
    Round2,
    Round3,
    Final,
}

impl RoundName {
    pub const ALL: [RoundName; 5] = [
        RoundName::Round0,
        RoundName::Round1,
        RoundName::Round2,
        RoundName::Round3,
        RoundName::Final,
    ];

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim() {
            "round0" => Ok(Self::Round0),
            "round1" => Ok(Self::Round1),
            "round2" => Ok(Self::Round2),
            "round3" => Ok(Self::Round3),
            "final" => Ok(Self::Final),
            _ => Err(format!(
                "expected one of {}",
                Self::ALL.map(Self::as_str).join(", ")
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Round0 => "round0",
            Self::Round1 => "round1",
            Self::Round2 => "round2",
            Self::Round3 => "round3",
            Self::Final => "final",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Self> {
        ROUND_ORDER.get(self.index() + 1).copied()
    }

    /// Inclusive slice of the sequence from `from` to `to`.
    pub fn range(from: Self, to: Self) -> Result<&'static [RoundName], String> {
        if from > to {
            return Err(format!(
                "from_round must be <= to_round, got {from} -> {to}"
            ));
        }
        Ok(&ROUND_ORDER[from.index()..=to.index()])
    }
}

impl fmt::Display for RoundName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RoundName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RoundName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        parse_via_string(deserializer, "round_name", Self::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_inclusive_and_ordered() {
        let rounds = RoundName::range(RoundName::Round1, RoundName::Round3).expect("range");
        assert_eq!(
            rounds,
            &[RoundName::Round1, RoundName::Round2, RoundName::Round3]
        );
        let err = RoundName::range(RoundName::Final, RoundName::Round1).expect_err("reversed");
        assert!(err.contains("from_round must be <= to_round"));
    }

    #[test]
    fn next_stops_after_final() {
        assert_eq!(RoundName::Round3.next(), Some(RoundName::Final));
        assert_eq!(RoundName::Final.next(), None);
    }

    #[test]
    fn parse_rejects_unknown_and_traversal_names() {
        assert_eq!(RoundName::parse("final"), Ok(RoundName::Final));
        assert!(RoundName::parse("round4").is_err());
        assert!(RoundName::parse("../round1").is_err());
        let err = serde_json::from_str::<RoundName>("\"bogus\"").expect_err("bogus");
        assert!(err.to_string().contains("round_name"));
    }
}
