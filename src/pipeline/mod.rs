pub mod loader; // .docx paragraphs, .xlsx task lists
pub mod llm;
pub mod prompt;
pub mod extraction; // contract paragraphs -> terms
pub mod validation; // task + terms -> judgement

pub use extraction::{extract_terms, ExtractionError};
pub use validation::{validate_task, ValidationError};
