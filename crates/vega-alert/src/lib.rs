//! KPI alert rules and their evaluation.
//!
//! [`engine::AlertRuleEngine`] owns a tenant's rules and triggered-alert
//! history. Each pass decides breaches through an [`evaluator::Evaluator`]:
//! the deterministic [`evaluator::LocalComparator`] for plain numeric rules,
//! or a [`evaluator::RemoteEvaluator`] backed by a text generator for rules
//! marked `semantic`. Produced alerts are appended to a log capped at 100
//! entries and sent to the rule's channels.

pub mod engine;
pub mod error;
pub mod evaluator;

#[cfg(test)]
mod tests;

pub use engine::AlertRuleEngine;
pub use error::AlertError;
pub use evaluator::{Evaluator, LocalComparator, RemoteEvaluator, Verdict};
