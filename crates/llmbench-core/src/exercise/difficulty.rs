use serde::{Deserialize, Serialize};

/// Difficulty label carried by each exercise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
    SuperHard,
}

impl Difficulty {
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::SuperHard => "Super Hard",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::SuperHard => "super_hard",
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            Difficulty::Easy => Tier::Basic,
            Difficulty::Medium => Tier::Intermediate,
            Difficulty::Hard => Tier::Advanced,
            Difficulty::SuperHard => Tier::SuperHard,
        }
    }
}

/// Named exercise tier, as selected on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Basic,
    Intermediate,
    Advanced,
    SuperHard,
}

impl Tier {
    pub fn all() -> &'static [Tier] {
        &[
            Tier::Basic,
            Tier::Intermediate,
            Tier::Advanced,
            Tier::SuperHard,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Intermediate => "intermediate",
            Tier::Advanced => "advanced",
            Tier::SuperHard => "super_hard",
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        match self {
            Tier::Basic => Difficulty::Easy,
            Tier::Intermediate => Difficulty::Medium,
            Tier::Advanced => Difficulty::Hard,
            Tier::SuperHard => Difficulty::SuperHard,
        }
    }
}
