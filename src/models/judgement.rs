use serde::{Deserialize, Serialize};

use super::task::Task;
use super::term::{Term, TermSet};

/// Verdict for one task against one term set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgementStatus {
    Valid,
    Invalid,
    /// The model could not decide confidently. Not an error.
    Ambiguous,
}

impl JudgementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JudgementStatus::Valid => "valid",
            JudgementStatus::Invalid => "invalid",
            JudgementStatus::Ambiguous => "ambiguous",
        }
    }

    /// Label shown to users.
    pub fn label(self) -> &'static str {
        match self {
            JudgementStatus::Valid => "VALID",
            JudgementStatus::Invalid => "INVALID",
            JudgementStatus::Ambiguous => "AMBIGUOUS",
        }
    }
}

/// Outcome of validating one task. Written once per (task, term set) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgement {
    pub task: Task,
    pub status: JudgementStatus,
    /// Set when either the relevance or the validity stage was unsure.
    pub ambiguous: bool,
    pub related_terms: TermSet,
    pub explanation: String,
    /// Main objective of the contract as stated by the relevance stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_objective: Option<String>,
}

/// Stage-1 model output: does the task pertain to the contract at all?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRelevancy {
    /// The main objective of the contract.
    pub contract_objective: String,
    /// Whether the task is relevant to the main objective of the contract.
    pub relevant: bool,
    /// Whether the relevancy of the task is ambiguous.
    pub ambiguous: bool,
}

/// Stage-2 model output: is a relevant task allowed by the terms?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityAssessment {
    /// The terms related to the task.
    pub related_terms: Vec<Term>,
    /// Short chain-of-thought reasoning for the verdict.
    pub explanation: String,
    pub status: JudgementStatus,
}
