//! Constraint evaluation framework.
//!
//! A policy constraint such as `location EQ "eu"` is proven by three steps:
//! read the requester's claim from the [`ParticipantAgent`], have the
//! participant registry corroborate it, then compare it with the right
//! operand according to the rule's [`rules::ClaimRule`] row. Any step that
//! fails makes the constraint `false`.
//!
//! ```ignore
//! let engine = ConstraintEngine::standard(registry, Protocol::Bundle, Arc::new(SystemClock));
//! let allowed = engine.evaluate(&Constraint::new("location", Operator::Eq, "eu"), &agent);
//! ```

pub mod clock;
pub mod constraint;
pub mod context;
pub mod evaluator;
pub mod operator;
pub mod rules;

pub use clock::{Clock, FixedClock, SystemClock};
pub use constraint::{claim_key, Constraint};
pub use context::ParticipantAgent;
pub use evaluator::{
    ClaimConstraintFunction, ConstraintEngine, ConstraintFunction, DynamicClaimFunction,
    TimeIntervalFunction, POLICY_EVALUATION_TIME,
};
pub use operator::Operator;
pub use rules::{ClaimRule, Comparison, ValueSource, BUILTIN_RULES};
