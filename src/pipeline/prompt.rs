use crate::models::{Task, TermSet};

pub const LEGAL_SYSTEM_PROMPT: &str = "You are a helpful and meticulous legal assistant.";

/// Build the term extraction prompt for a contract's paragraphs.
///
/// Paragraphs are embedded as a JSON array so that paragraph boundaries
/// survive quoting.
pub fn build_extraction_prompt(paragraphs: &[String]) -> String {
    let lines = serde_json::to_string_pretty(paragraphs).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"You are provided with a contract text containing various terms and constraints. Extract all key terms from the document and structure them in a JSON format. Terms may be related to different sections and subsections of the document, which should be reflected in the JSON. If the contract contains multiple parts (e.g. main contract plus amendments/appendices) make sure to include the complete section reference in the section key (so the `section` key could be e.g. "2.2" or "amendment, 2.2"). It's possible that a section contains multiple terms, in which case they should be listed separately, but have the same `section` key.

The document is given below as a list of lines extracted from a .docx file. Some sections might span multiple paragraphs, make sure to join them correctly.

```json
{lines}
```"#
    )
}

/// Stage 1: is the task about what the contract is for at all?
pub fn build_relevancy_prompt(task: &Task, terms: &TermSet) -> String {
    let (task_json, terms_json) = task_and_terms_json(task, terms);
    format!(
        r#"Review the task below together with the terms extracted from a contract. First state the main objective of the contract in one sentence. Then decide whether the task is relevant to that objective, i.e. whether it is the kind of work the contract covers at all. Do not judge yet whether the task complies with individual terms. If you cannot decide confidently, mark the relevancy as ambiguous.

Task:
```json
{task_json}
```

Terms extracted from the contract:
```json
{terms_json}
```"#
    )
}

/// Stage 2: given a relevant task, does it violate any of the terms?
pub fn build_validity_prompt(task: &Task, terms: &TermSet) -> String {
    let (task_json, terms_json) = task_and_terms_json(task, terms);
    format!(
        r#"Review the task below and determine whether it violates any of the terms extracted from a contract. List the terms related to the task, give a short explanation of your reasoning, and set the status to "valid" if the task is allowed, "invalid" if it violates a term, or "ambiguous" if the terms do not allow a confident decision.

Task:
```json
{task_json}
```

Terms extracted from the contract:
```json
{terms_json}
```"#
    )
}

fn task_and_terms_json(task: &Task, terms: &TermSet) -> (String, String) {
    let task_json = serde_json::to_string_pretty(task).unwrap_or_default();
    let terms_json = serde_json::to_string_pretty(terms).unwrap_or_default();
    (task_json, terms_json)
}
