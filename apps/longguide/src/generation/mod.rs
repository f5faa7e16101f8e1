// Guided generation: prompt rendering, the retrying runner, and the
// end-to-end LongGuide run built on top of them.
// All model calls go through the runner, never a backend directly.

pub mod pipeline;
pub mod prompts;
pub mod runner;

pub use pipeline::run_longguide;
pub use runner::GenerationRunner;
