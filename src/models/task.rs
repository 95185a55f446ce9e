use serde::{Deserialize, Serialize};

/// One billing line item to be checked against a contract's terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    /// The amount to charge, kept in its textual decimal form.
    pub amount: String,
}

impl Task {
    pub fn new(description: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            amount: amount.into(),
        }
    }
}
