//! Dominance rules for Clashroom.
//!
//! A [`RuleSet`] says, for a finite set of option types, which type beats
//! which. Rule sets come from two places:
//!
//! - [`RuleSet::builtin`]: the fixed rock/paper/scissors cycle.
//! - A [`RuleProvider`]: an external generator asked to invent relations
//!   for free-form options, wrapped by [`resolve_custom`].
//!
//! Every `RuleSet` value has passed [`RuleSet::from_entries`], so anything
//! holding one can hand it straight to the simulation.

#![allow(async_fn_in_trait)]

mod error;
mod http;
mod parse;
mod provider;
mod ruleset;

pub use error::{RuleError, RuleViolation};
pub use http::{HttpRuleConfig, HttpRuleProvider};
pub use parse::parse_generated_rules;
pub use provider::{distinct_options, resolve_custom, RuleGenerator, RuleProvider};
pub use ruleset::{RuleEntry, RuleSet, BUILTIN_OPTIONS};
