//! Agent identity and the result of resolving one.

use serde::{Deserialize, Serialize};

/// Slice color for breakdown groups that belong to neither faction.
pub const NEUTRAL_GRAY: &str = "#999";

const ENLIGHTENED_GREEN: &str = "#00b300";
const RESISTANCE_BLUE: &str = "#0077e6";

/// The two factions, stored as single letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Faction {
    #[serde(rename = "E")]
    Enlightened,
    #[serde(rename = "R")]
    Resistance,
}

impl Faction {
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "E" => Some(Faction::Enlightened),
            "R" => Some(Faction::Resistance),
            _ => None,
        }
    }

    pub fn letter(&self) -> &'static str {
        match self {
            Faction::Enlightened => "E",
            Faction::Resistance => "R",
        }
    }

    pub fn opposing(&self) -> Faction {
        match self {
            Faction::Enlightened => Faction::Resistance,
            Faction::Resistance => Faction::Enlightened,
        }
    }

    /// Palette color for this faction's slices.
    pub fn color(&self) -> &'static str {
        match self {
            Faction::Enlightened => ENLIGHTENED_GREEN,
            Faction::Resistance => RESISTANCE_BLUE,
        }
    }
}

/// A resolved agent identity: name, faction, and the credential it was
/// resolved through. Cannot be built with an empty name or credential, so
/// holding an `AgentIdentity` always means a real, authenticated agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentIdentity {
    name: String,
    faction: Faction,
    token: String,
}

impl AgentIdentity {
    pub fn new(
        name: impl Into<String>,
        faction: Faction,
        token: impl Into<String>,
    ) -> Option<Self> {
        let name = name.into();
        let token = token.into();
        if name.is_empty() || token.is_empty() {
            return None;
        }
        Some(Self { name, faction, token })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn faction(&self) -> Faction {
        self.faction
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Outcome of identity resolution. An unknown credential is not an error;
/// it resolves to the `Invalid` sentinel and callers must check for it.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedAgent {
    Valid(AgentIdentity),
    Invalid,
}

impl ResolvedAgent {
    pub fn is_valid(&self) -> bool {
        matches!(self, ResolvedAgent::Valid(_))
    }

    pub fn agent(&self) -> Option<&AgentIdentity> {
        match self {
            ResolvedAgent::Valid(agent) => Some(agent),
            ResolvedAgent::Invalid => None,
        }
    }

    pub fn into_agent(self) -> Option<AgentIdentity> {
        match self {
            ResolvedAgent::Valid(agent) => Some(agent),
            ResolvedAgent::Invalid => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_rejects_empty_fields() {
        assert!(AgentIdentity::new("", Faction::Resistance, "abc").is_none());
        assert!(AgentIdentity::new("Scout", Faction::Resistance, "").is_none());
        assert!(AgentIdentity::new("Scout", Faction::Resistance, "abc").is_some());
    }

    #[test]
    fn faction_letters_round_trip() {
        assert_eq!(Faction::from_letter("E"), Some(Faction::Enlightened));
        assert_eq!(Faction::from_letter("R"), Some(Faction::Resistance));
        assert_eq!(Faction::from_letter("X"), None);
        assert_eq!(Faction::Enlightened.letter(), "E");
    }

    #[test]
    fn opposing_faction_swaps_colors() {
        assert_eq!(
            Faction::Enlightened.opposing().color(),
            Faction::Resistance.color()
        );
        assert_ne!(Faction::Enlightened.color(), Faction::Resistance.color());
    }
}
