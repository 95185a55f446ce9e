//! HTML pages and htmx fragments.
//!
//! Everything user- or model-supplied goes through [`escape`]. Keys are
//! already restricted to URL- and attribute-safe characters but are escaped
//! anyway.

use crate::cache::{CacheKey, FailureMarker};
use crate::config::{APP_NAME, CONTRACT_EXTENSION, POLL_INTERVAL, TASK_LIST_EXTENSION};
use crate::jobs::JobState;
use crate::models::{ExtractionEntry, Judgement, JudgementStatus, Task, Term};

const HTMX_SRC: &str = "https://unpkg.com/htmx.org@1.9.12";
const PICO_CSS: &str = "https://cdn.jsdelivr.net/npm/@picocss/pico@1/css/pico.min.css";

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════
// Pages
// ═══════════════════════════════════════════════════════════

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · {APP_NAME}</title>
<link rel="stylesheet" href="{PICO_CSS}">
<script src="{HTMX_SRC}"></script>
<style>
.status-valid{{color:#15803d}}
.status-invalid{{color:#b91c1c}}
.status-ambiguous{{color:#b45309}}
.warning{{background:#fef3c7;padding:.5rem 1rem;border-radius:.5rem}}
.failed{{background:#fee2e2;padding:.5rem 1rem;border-radius:.5rem}}
</style>
</head>
<body>
<main class="container">
<h1>{title}</h1>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
    )
}

/// `GET /`: contract upload form.
pub fn index_page() -> String {
    let form = format!(
        r#"<form id="upload-form" hx-post="/upload" hx-encoding="multipart/form-data" hx-swap="outerHTML">
<input type="file" name="uf" accept="{CONTRACT_EXTENSION}">
<button type="submit">Submit</button>
</form>"#
    );
    page("Terms", &form)
}

// ═══════════════════════════════════════════════════════════
// Shared fragments
// ═══════════════════════════════════════════════════════════

fn pending(id: &str, poll_url: &str, label: &str) -> String {
    format!(
        r#"<div id="{id}" hx-post="{poll_url}" hx-trigger="every {POLL_INTERVAL}" hx-swap="outerHTML" aria-busy="true">{label}</div>"#,
        id = escape(id),
        poll_url = escape(poll_url),
    )
}

fn failed(id: &str, what: &str, marker: &FailureMarker) -> String {
    format!(
        r#"<div id="{id}" class="failed"><strong>{what} failed.</strong><p>{error}</p><small>{at}</small></div>"#,
        id = escape(id),
        error = escape(&marker.error),
        at = marker.failed_at.to_rfc3339(),
    )
}

fn not_started(id: &str, hint: &str) -> String {
    format!(
        r#"<div id="{id}"><p>Nothing is in progress for this item.</p><p>{hint}</p></div>"#,
        id = escape(id),
    )
}

fn term_table(terms: &[Term]) -> String {
    let rows: String = terms
        .iter()
        .map(|t| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&t.section),
                escape(&t.name),
                escape(&t.description)
            )
        })
        .collect();
    format!(
        "<table>\n<thead><tr><th>Section</th><th>Name</th><th>Description</th></tr></thead>\n<tbody>\n{rows}</tbody>\n</table>"
    )
}

// ═══════════════════════════════════════════════════════════
// Terms
// ═══════════════════════════════════════════════════════════

fn terms_id(key: &CacheKey) -> String {
    format!("terms-{key}")
}

/// Fragment for an extraction in any state.
pub fn terms_fragment(key: &CacheKey, state: &JobState<ExtractionEntry>) -> String {
    let id = terms_id(key);
    match state {
        JobState::Pending => pending(&id, &format!("/terms/{key}"), "Analyzing..."),
        JobState::Complete(entry) => terms_view(key, entry),
        JobState::Failed(marker) => failed(&id, "Term extraction", marker),
        JobState::NotStarted => not_started(&id, "Upload the contract again to extract its terms."),
    }
}

fn terms_view(key: &CacheKey, entry: &ExtractionEntry) -> String {
    let contract = escape(&entry.paragraphs.join("\n"));
    format!(
        r##"<div id="{id}">
<div style="margin-top:1rem;margin-bottom:2rem;max-height:300px;overflow:scroll">
<h3>Original Contract</h3>
<pre style="white-space:pre-wrap;padding:1rem">{contract}</pre>
</div>
<div>
<h3>Extracted Terms</h3>
<a href="/terms/{key}/json" download>Download JSON</a>
{table}
</div>
<div>
<h3>Validate Tasks</h3>
<form id="tasks-form" hx-post="/terms/{key}/tasks" hx-encoding="multipart/form-data" hx-target="#tasks" hx-swap="innerHTML">
<input type="file" name="tf" accept="{TASK_LIST_EXTENSION}">
<button type="submit">Upload task list</button>
</form>
<div id="tasks"></div>
</div>
</div>"##,
        id = escape(&terms_id(key)),
        key = escape(key.as_str()),
        table = term_table(&entry.terms),
    )
}

// ═══════════════════════════════════════════════════════════
// Tasks & judgements
// ═══════════════════════════════════════════════════════════

/// Task list with one validate form per row.
pub fn task_table(terms_key: &CacheKey, tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "<p>The task list contains no tasks.</p>".to_string();
    }

    let rows: String = tasks
        .iter()
        .map(|task| {
            format!(
                r#"<tr><td>{description}</td><td>{amount}</td><td><form hx-post="/validate" hx-swap="outerHTML">
<input type="hidden" name="terms_key" value="{terms_key}">
<input type="hidden" name="description" value="{description}">
<input type="hidden" name="amount" value="{amount}">
<button type="submit">Validate</button>
</form></td></tr>
"#,
                description = escape(&task.description),
                amount = escape(&task.amount),
                terms_key = escape(terms_key.as_str()),
            )
        })
        .collect();

    format!(
        "<table>\n<thead><tr><th>Task</th><th>Amount</th><th>Judgement</th></tr></thead>\n<tbody>\n{rows}</tbody>\n</table>"
    )
}

fn judgement_id(key: &CacheKey) -> String {
    format!("judgement-{key}")
}

/// Fragment for a judgement in any state.
pub fn judgement_fragment(key: &CacheKey, state: &JobState<Judgement>) -> String {
    let id = judgement_id(key);
    match state {
        JobState::Pending => pending(&id, &format!("/judgements/{key}"), "Validating..."),
        JobState::Complete(judgement) => judgement_view(key, judgement),
        JobState::Failed(marker) => failed(&id, "Validation", marker),
        JobState::NotStarted => not_started(&id, "Submit the task again to validate it."),
    }
}

fn status_class(status: JudgementStatus) -> &'static str {
    match status {
        JudgementStatus::Valid => "status-valid",
        JudgementStatus::Invalid => "status-invalid",
        JudgementStatus::Ambiguous => "status-ambiguous",
    }
}

fn judgement_view(key: &CacheKey, judgement: &Judgement) -> String {
    let warning = if judgement.ambiguous {
        r#"<p class="warning">Ambiguous: the model was not confident about this judgement. Review it manually.</p>"#
    } else {
        ""
    };
    let objective = judgement
        .contract_objective
        .as_deref()
        .map(|o| format!("<p><small>Contract objective: {}</small></p>", escape(o)))
        .unwrap_or_default();
    let related = if judgement.related_terms.is_empty() {
        String::new()
    } else {
        format!(
            "<details><summary>Related terms ({})</summary>\n{}\n</details>",
            judgement.related_terms.len(),
            term_table(&judgement.related_terms.terms)
        )
    };

    format!(
        r#"<div id="{id}">
<strong class="{class}">{label}</strong>
{warning}
<p>{explanation}</p>
{objective}
{related}
</div>"#,
        id = escape(&judgement_id(key)),
        class = status_class(judgement.status),
        label = judgement.status.label(),
        explanation = escape(&judgement.explanation),
    )
}
