//! The dominance relation between option types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::RuleViolation;

/// Option names accepted without a custom flag.
pub const BUILTIN_OPTIONS: [&str; 3] = ["rock", "paper", "scissors"];

/// Symbol used when a generated entry leaves its emoji blank.
const FALLBACK_SYMBOL: &str = "❓";

/// One option type as described by a rule source.
///
/// The serde names match what the rule generator is asked to produce
/// (`object`, `emoji`, `logic`); the Rust-side names are accepted as
/// aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    #[serde(rename = "object", alias = "option")]
    pub option: String,

    #[serde(rename = "emoji", alias = "symbol", default)]
    pub symbol: String,

    /// Types this option loses against.
    #[serde(default)]
    pub loses_against: Vec<String>,

    /// Types this option defeats. Optional; merged with `loses_against`
    /// of the other entries during validation.
    #[serde(default)]
    pub wins_against: Vec<String>,

    /// Why this option loses, shown after the game.
    #[serde(rename = "logic", alias = "rationale", default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl RuleEntry {
    pub fn new(option: &str, symbol: &str, loses_against: &[&str]) -> Self {
        Self {
            option: option.to_string(),
            symbol: symbol.to_string(),
            loses_against: loses_against.iter().map(|s| s.to_string()).collect(),
            wins_against: Vec::new(),
            rationale: None,
        }
    }

    pub fn with_rationale(mut self, rationale: &str) -> Self {
        self.rationale = Some(rationale.to_string());
        self
    }
}

/// A validated, immutable dominance relation.
///
/// Types are addressed by index (`0..len()`), which is what the simulation
/// stores per unit. Names are lowercase.
///
/// Invariants, checked by [`RuleSet::from_entries`]:
/// - every pair of distinct types is related in exactly one direction;
/// - every type beats at least one type and loses to at least one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    entries: Vec<RuleEntry>,
    /// `loses[a][b]` is true when type `a` loses to type `b`.
    loses: Vec<Vec<bool>>,
}

impl RuleSet {
    /// Validates candidate entries and builds a rule set.
    ///
    /// Relations may be stated from either side: "A loses to B" holds when
    /// `B` is in A's `loses_against` or `A` is in B's `wins_against`. Names
    /// are compared case-insensitively.
    ///
    /// The returned set is canonical: names lowercased, and both relation
    /// lists of every entry rebuilt from the merged relation.
    pub fn from_entries(entries: Vec<RuleEntry>) -> Result<Self, RuleViolation> {
        let n = entries.len();
        if n < 3 {
            return Err(RuleViolation::TooFewOptions(n));
        }

        let names: Vec<String> = entries.iter().map(|e| normalize(&e.option)).collect();
        let mut index = HashMap::with_capacity(n);
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(RuleViolation::EmptyOption);
            }
            if index.insert(name.clone(), i).is_some() {
                return Err(RuleViolation::DuplicateOption(name.clone()));
            }
        }

        let lookup = |owner: usize, referenced: &str| -> Result<usize, RuleViolation> {
            let j = index.get(&normalize(referenced)).copied().ok_or_else(|| {
                RuleViolation::UnknownOption {
                    option: names[owner].clone(),
                    referenced: referenced.to_string(),
                }
            })?;
            if j == owner {
                return Err(RuleViolation::SelfRelation(names[owner].clone()));
            }
            Ok(j)
        };

        let mut loses = vec![vec![false; n]; n];
        for (i, entry) in entries.iter().enumerate() {
            for other in &entry.loses_against {
                let j = lookup(i, other)?;
                loses[i][j] = true;
            }
            for other in &entry.wins_against {
                let j = lookup(i, other)?;
                loses[j][i] = true;
            }
        }

        for a in 0..n {
            for b in (a + 1)..n {
                match (loses[a][b], loses[b][a]) {
                    (true, true) => {
                        return Err(RuleViolation::Contradiction(
                            names[a].clone(),
                            names[b].clone(),
                        ));
                    }
                    (false, false) => {
                        return Err(RuleViolation::Unrelated(
                            names[a].clone(),
                            names[b].clone(),
                        ));
                    }
                    _ => {}
                }
            }
        }

        for a in 0..n {
            if !(0..n).any(|b| loses[b][a]) {
                return Err(RuleViolation::NeverWins(names[a].clone()));
            }
            if !(0..n).any(|b| loses[a][b]) {
                return Err(RuleViolation::NeverLoses(names[a].clone()));
            }
        }

        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(a, entry)| {
                let symbol = entry.symbol.trim();
                RuleEntry {
                    option: names[a].clone(),
                    symbol: if symbol.is_empty() {
                        FALLBACK_SYMBOL.to_string()
                    } else {
                        symbol.to_string()
                    },
                    loses_against: (0..n)
                        .filter(|&b| loses[a][b])
                        .map(|b| names[b].clone())
                        .collect(),
                    wins_against: (0..n)
                        .filter(|&b| loses[b][a])
                        .map(|b| names[b].clone())
                        .collect(),
                    rationale: entry.rationale.filter(|r| !r.trim().is_empty()),
                }
            })
            .collect();

        Ok(Self { entries, loses })
    }

    /// The built-in rock/paper/scissors cycle.
    ///
    /// Assembled directly in canonical form; `test_builtin_is_a_three_cycle`
    /// checks it against [`RuleSet::from_entries`].
    pub fn builtin() -> Self {
        let canonical = |option: &str, symbol: &str, loses: &str, wins: &str, why: &str| RuleEntry {
            option: option.to_string(),
            symbol: symbol.to_string(),
            loses_against: vec![loses.to_string()],
            wins_against: vec![wins.to_string()],
            rationale: Some(why.to_string()),
        };
        Self {
            entries: vec![
                canonical("rock", "🪨", "paper", "scissors", "Paper wraps rock."),
                canonical("paper", "📄", "scissors", "rock", "Scissors cut paper."),
                canonical("scissors", "✂️", "rock", "paper", "Rock crushes scissors."),
            ],
            loses: vec![
                vec![false, true, false],
                vec![false, false, true],
                vec![true, false, false],
            ],
        }
    }

    /// Number of option types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the type with this name (case-insensitive).
    pub fn index_of(&self, option: &str) -> Option<usize> {
        let wanted = normalize(option);
        self.entries.iter().position(|e| e.option == wanted)
    }

    /// Name of type `kind`.
    ///
    /// # Panics
    /// Panics if `kind >= len()`.
    pub fn option(&self, kind: usize) -> &str {
        &self.entries[kind].option
    }

    /// Display symbol of type `kind`.
    pub fn symbol(&self, kind: usize) -> &str {
        &self.entries[kind].symbol
    }

    /// Rationale text of type `kind`, if any.
    pub fn rationale(&self, kind: usize) -> Option<&str> {
        self.entries[kind].rationale.as_deref()
    }

    /// Returns `true` if type `a` loses to type `b`.
    pub fn loses_to(&self, a: usize, b: usize) -> bool {
        self.loses
            .get(a)
            .and_then(|row| row.get(b))
            .copied()
            .unwrap_or(false)
    }

    /// All entries in canonical form.
    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
