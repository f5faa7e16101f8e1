//! Candidate combination and validation-driven selection of guideline sets.

pub mod audit;
pub mod combiner;
pub mod selector;

pub use audit::SelectionAudit;
pub use combiner::combine_candidates;
pub use selector::GuidelineSelector;
