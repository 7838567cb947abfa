//! LLM prompt engineering for field extraction and clarification

use casebook_domain::traits::ClarificationRequest;
use casebook_domain::{FieldKind, FieldSchema};

/// Builds the extraction prompt for one document
pub struct PromptBuilder<'a> {
    text: &'a str,
    schema: &'a FieldSchema,
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder
    pub fn new(text: &'a str, schema: &'a FieldSchema) -> Self {
        Self { text, schema }
    }

    /// Build the complete extraction prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(EXTRACTION_INSTRUCTIONS);
        prompt.push_str("\n\nFields to extract:\n");

        for name in self.schema.field_names() {
            // field_names only yields declared names
            if let Ok(spec) = self.schema.spec(name) {
                let kind = kind_label(spec.kind);
                if spec.kind == FieldKind::Code && !spec.allowed_codes.is_empty() {
                    prompt.push_str(&format!(
                        "- {} ({}, one of: {})\n",
                        name,
                        kind,
                        spec.allowed_codes.join(", ")
                    ));
                } else {
                    prompt.push_str(&format!("- {} ({})\n", name, kind));
                }
            }
        }

        prompt.push_str("\nText to analyze:\n---\n");
        prompt.push_str(self.text);
        prompt.push_str("\n---\n\n");
        prompt.push_str(OUTPUT_FORMAT_REMINDER);

        prompt
    }
}

/// Build a clarification prompt for one ambiguous field
pub fn clarification_prompt(request: &ClarificationRequest, max_snippets: usize) -> String {
    let mut prompt = String::new();

    prompt.push_str(CLARIFICATION_INSTRUCTIONS);
    prompt.push_str(&format!("\n\nField: {}\n", request.field_name));
    prompt.push_str(&format!("Question: {}\n", request.question));

    if !request.evidence.is_empty() {
        prompt.push_str("\nCompeting evidence:\n");
        for snippet in request.evidence.iter().take(max_snippets) {
            prompt.push_str(&format!("- {}\n", snippet));
        }
    }

    prompt.push_str("\n");
    prompt.push_str(CLARIFICATION_FORMAT_REMINDER);

    prompt
}

fn kind_label(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Numeric => "numeric",
        FieldKind::Date => "date, YYYY-MM-DD",
        FieldKind::Code => "code",
        FieldKind::Text => "text",
    }
}

const EXTRACTION_INSTRUCTIONS: &str = r#"You are reading a clinical document. Extract a value for each listed field that the text states or clearly implies. Skip fields the text says nothing about.

Each extracted value must follow this format:

{
  "field_name": "name from the field list",
  "value": <number, "YYYY-MM-DD" date string, or string>,
  "confidence": 0.0-1.0,
  "citation": "exact supporting text from the document",
  "reasoning": "one sentence on how the value was read"
}

Rules:
- One object per field; never guess a field the text does not support
- confidence reflects how directly the text states the value: hedged or
  inferred values get lower confidence than explicit statements
- citation must be copied verbatim from the document
- Dates use YYYY-MM-DD; numbers are bare JSON numbers, no units"#;

const OUTPUT_FORMAT_REMINDER: &str = r#"Output format (JSON array only, no additional text):
[
  {
    "field_name": "...",
    "value": ...,
    "confidence": 0.0-1.0,
    "citation": "exact text",
    "reasoning": "..."
  }
]

Remember: Return ONLY valid JSON, no markdown code blocks, no explanations."#;

const CLARIFICATION_INSTRUCTIONS: &str = r#"Several sources disagree about one field. Re-read the competing evidence below and decide which value is best supported, considering document context and plausibility."#;

const CLARIFICATION_FORMAT_REMINDER: &str = r#"If one value is best supported, return a single JSON object:
{
  "field_name": "...",
  "value": ...,
  "confidence": 0.0-1.0,
  "citation": "exact text",
  "reasoning": "..."
}

If the evidence cannot be disambiguated, return exactly: null

Return ONLY valid JSON, no markdown code blocks, no explanations."#;

#[cfg(test)]
mod tests {
    use super::*;
    use casebook_domain::FieldSpec;

    fn schema() -> FieldSchema {
        FieldSchema::new(vec![
            FieldSpec::numeric("dose_cgy").required(),
            FieldSpec::date("start_date"),
            FieldSpec::code("site", &["breast", "lung"]),
        ])
    }

    #[test]
    fn test_prompt_lists_schema_fields() {
        let schema = schema();
        let prompt = PromptBuilder::new("RT summary", &schema).build();

        assert!(prompt.contains("- dose_cgy (numeric)"));
        assert!(prompt.contains("- start_date (date, YYYY-MM-DD)"));
        assert!(prompt.contains("- site (code, one of: BREAST, LUNG)"));
    }

    #[test]
    fn test_prompt_includes_text() {
        let schema = schema();
        let prompt = PromptBuilder::new("Total dose 5400 cGy", &schema).build();
        assert!(prompt.contains("Total dose 5400 cGy"));
    }

    #[test]
    fn test_prompt_includes_instructions() {
        let schema = schema();
        let prompt = PromptBuilder::new("text", &schema).build();
        assert!(prompt.contains("clinical document"));
        assert!(prompt.contains("field_name"));
        assert!(prompt.contains("ONLY valid JSON"));
    }

    #[test]
    fn test_clarification_prompt_includes_evidence() {
        let request = ClarificationRequest {
            field_name: "start_date".to_string(),
            question: "Which start date is correct?".to_string(),
            evidence: vec![
                "treatment began 2019-07-15".to_string(),
                "RT started on 2019-07-22".to_string(),
            ],
        };

        let prompt = clarification_prompt(&request, 8);
        assert!(prompt.contains("Field: start_date"));
        assert!(prompt.contains("Which start date is correct?"));
        assert!(prompt.contains("treatment began 2019-07-15"));
        assert!(prompt.contains("RT started on 2019-07-22"));
    }

    #[test]
    fn test_clarification_prompt_limits_snippets() {
        let request = ClarificationRequest {
            field_name: "dose_cgy".to_string(),
            question: "q".to_string(),
            evidence: (0..10).map(|i| format!("snippet-{}", i)).collect(),
        };

        let prompt = clarification_prompt(&request, 3);
        assert!(prompt.contains("snippet-0"));
        assert!(prompt.contains("snippet-2"));
        assert!(!prompt.contains("snippet-3"));
    }
}
