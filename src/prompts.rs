//! Classification prompt and response schema.
//!
//! Keeping the prompt and the JSON schema side by side means the wording that
//! asks for `is_paper` / `title` / `author` and the schema that constrains the
//! answer cannot drift apart. Callers override the prompt through
//! [`crate::config::RenamerConfig::prompt`]; the schema is fixed.

use serde_json::{json, Value};

/// Default instruction sent with every first-page image.
pub const DEFAULT_CLASSIFY_PROMPT: &str = r#"You are given an image of the first page of a PDF document.

Decide whether the document is an academic paper: a journal article,
conference paper, preprint, thesis, or technical report with a title block
and named authors.

Answer with a JSON object with exactly these fields:
- "is_paper": true if the document is an academic paper, false otherwise
- "title": the full title of the paper as printed, or "" if none is visible
- "author": the first author's family name followed by "et al." when there
  are several authors, or "" if no author is visible

Output ONLY the JSON object. Do not wrap it in code fences."#;

/// Name of the structured-output schema sent to OpenAI-compatible endpoints.
pub const SCHEMA_NAME: &str = "paper_classification";

/// JSON schema of the classification record.
///
/// Used as `response_format.json_schema.schema` with `strict: true`, which
/// requires every property to be listed in `required` and forbids extras.
pub fn classification_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "is_paper": { "type": "boolean" },
            "title": { "type": "string" },
            "author": { "type": "string" }
        },
        "required": ["is_paper", "title", "author"],
        "additionalProperties": false
    })
}
