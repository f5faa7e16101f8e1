pub mod example;
pub mod guideline;
pub mod result;
pub mod task;

pub use example::Example;
pub use guideline::{Guideline, GuidelineId, GuidelineKind, GuidelinePool, GuidelineSet};
pub use result::{RecordedFailure, RunResult};
pub use task::TaskType;
