//! System prompts for the cataloging assistant.
//!
//! The base prompt is shared by every request; feature prompts are appended
//! only for the kinds of help a request asks for. The field itself always
//! travels in the user message as JSON.

use colophon_core::AiRequest;

use crate::providers::ChatMessage;
use crate::RuntimeError;

/// Base system prompt shared across all requests.
///
/// Frames the assistant as a proposer of punctuation-only patches. The
/// guardrail enforces this regardless; the framing keeps rejections rare.
pub const BASE_SYSTEM_PROMPT: &str = r#"
You are a cataloging assistant reviewing one MARC field against AACR2 punctuation conventions.

You propose SUGGESTIONS, not EDITS. A human cataloger decides.

## Constraints
1. Propose changes to punctuation and spacing ONLY
2. Never change letters, digits, or their case
3. Only touch the field you were given, at the occurrence you were given
4. Copy original_text exactly as it appears in the field
5. Echo the request_id you were given

## Output Format (JSON)
{
  "request_id": "string",
  "findings": [
    {
      "code": "short identifier",
      "message": "what is wrong",
      "rationale": "which convention applies",
      "subfield": "a",
      "proposed_fixes": [
        {
          "patch": [
            {
              "op": "replace_subfield",
              "tag": "245",
              "subfield": "a",
              "occurrence": 0,
              "original_text": "exact current value",
              "replacement_text": "value with corrected punctuation"
            }
          ]
        }
      ]
    }
  ],
  "assistant_message": "optional short note",
  "confidence_percent": 0-100
}
"#;

/// Appended when punctuation explanations are requested.
pub const PUNCTUATION_PROMPT: &str = r#"
## Punctuation
Explain each finding in one sentence, naming the AACR2 convention.
If the field already follows the conventions, return an empty findings list.
"#;

/// Appended when subject guidance is requested.
pub const SUBJECT_PROMPT: &str = r#"
## Subject Headings
Suggest up to five LCSH-style headings in a "subjects" array.
Each heading is either a string using " -- " between subdivisions, or an object
{ "tag": "650", "ind1": " ", "ind2": "0", "subfields": { "a": "", "x": [], "z": [], "y": [], "v": [] } }.
"#;

/// Appended when call number guidance is requested.
pub const CLASSIFICATION_PROMPT: &str = r#"
## Classification
Suggest ONE Library of Congress classification number in "classification".
Never give a range such as "QA76-QA76.9". If you cannot choose a single
number, add an error { "code": "CLASSIFICATION_RANGE", "tag": "050", "message": "..." }.
"#;

/// Build the system prompt for the features a request asks for.
pub fn system_prompt(request: &AiRequest) -> String {
    let mut prompt = BASE_SYSTEM_PROMPT.to_string();
    if request.features.punctuation_explain {
        prompt.push_str(PUNCTUATION_PROMPT);
    }
    if request.features.subject_guidance {
        prompt.push_str(SUBJECT_PROMPT);
    }
    if request.features.call_number_guidance {
        prompt.push_str(CLASSIFICATION_PROMPT);
    }
    prompt
}

/// Build the message list for one request.
pub fn build_messages(request: &AiRequest) -> Result<Vec<ChatMessage>, RuntimeError> {
    let payload = serde_json::to_string_pretty(request)?;
    Ok(vec![
        ChatMessage::system(system_prompt(request)),
        ChatMessage::user(format!("Review this field and reply with JSON only.\n\n{}", payload)),
    ])
}
