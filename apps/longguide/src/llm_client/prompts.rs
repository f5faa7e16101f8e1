// Shared prompt fragments.
// Each component that prompts the model keeps its own prompts.rs alongside it;
// this file only holds the pieces several of them need.

/// Asks for a fenced JSON answer that `parse_json_block` can recover.
pub const JSON_BLOCK_INSTRUCTION: &str = "in JSON block including ```json and ```";

/// Asks for a bulleted answer that can be split into one guideline per bullet.
pub const BULLET_LIST_INSTRUCTION: &str = "Give me the list in bullet points.";
