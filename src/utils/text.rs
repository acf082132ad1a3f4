// Text utils

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, WorkerError};

/// JSON block wrapped in the tags the prompt asks for.
static TAGGED_JSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<json_format>(.*?)</json_format>").expect("valid regex"));

/// Fallback: fenced markdown code block.
static FENCED_JSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json(.*?)```").expect("valid regex"));

/// Splits `text` into at most `num_parts` contiguous parts of roughly equal
/// size. Paragraphs are the lines of the trimmed text (empty lines count);
/// each part groups `ceil(paragraphs / num_parts)` of them in original
/// order, joined by a line break and trimmed. With fewer paragraphs than
/// requested parts, fewer parts come back; callers must tolerate that.
pub fn split_text_into_parts(text: &str, num_parts: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || num_parts == 0 {
        return Vec::new();
    }

    let paragraphs: Vec<&str> = trimmed.split('\n').collect();
    let paragraphs_per_part = paragraphs.len().div_ceil(num_parts);

    paragraphs
        .chunks(paragraphs_per_part)
        .map(|chunk| chunk.join("\n").trim().to_string())
        .collect()
}

/// Pulls the delimited JSON block out of a backend reply and parses it.
/// Looks for a `<json_format>` tagged block first, then a fenced
/// ```` ```json ```` code block. No block, or a block that is not valid
/// JSON, is a hard generation error.
pub fn extract_json_block(reply: &str) -> Result<serde_json::Value> {
    let block = TAGGED_JSON_RE
        .captures(reply)
        .or_else(|| FENCED_JSON_RE.captures(reply))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim())
        .ok_or_else(|| {
            WorkerError::GenerationError(
                "No JSON block found in backend reply (neither <json_format> nor ```json)"
                    .to_string(),
            )
        })?;

    serde_json::from_str(block)
        .map_err(|e| WorkerError::GenerationError(format!("Failed to parse JSON block: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_paragraphs(n: usize) -> String {
        (1..=n)
            .map(|i| format!("Paragraph {}.", i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_split_ten_paragraphs_into_three_parts() {
        let text = numbered_paragraphs(10);
        let parts = split_text_into_parts(&text, 3);

        // ceil(10 / 3) = 4, so sizes are 4, 4, 2
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].lines().count(), 4);
        assert_eq!(parts[1].lines().count(), 4);
        assert_eq!(parts[2].lines().count(), 2);
        assert!(parts[0].starts_with("Paragraph 1."));
        assert!(parts[2].ends_with("Paragraph 10."));
    }

    #[test]
    fn test_split_fewer_paragraphs_than_parts() {
        let text = numbered_paragraphs(2);
        let parts = split_text_into_parts(&text, 5);

        // only 2 parts possible; callers tolerate fewer than requested
        assert_eq!(parts, vec!["Paragraph 1.", "Paragraph 2."]);
    }

    #[test]
    fn test_split_preserves_original_order() {
        let text = numbered_paragraphs(6);
        let parts = split_text_into_parts(&text, 2);
        assert_eq!(parts.len(), 2);
        let rejoined = parts.join("\n");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn test_split_single_part_gets_everything() {
        let text = numbered_paragraphs(4);
        let parts = split_text_into_parts(&text, 1);
        assert_eq!(parts, vec![text]);
    }

    #[test]
    fn test_split_counts_empty_lines_as_paragraphs() {
        let text = "one\n\ntwo\n\nthree\n";
        // trimmed text has 5 lines (two of them empty), ceil(5/2) = 3
        let parts = split_text_into_parts(text, 2);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "one\n\ntwo");
        assert_eq!(parts[1], "three");
    }

    #[test]
    fn test_split_empty_text_yields_no_parts() {
        assert!(split_text_into_parts("", 3).is_empty());
        assert!(split_text_into_parts("   \n  ", 3).is_empty());
    }

    #[test]
    fn test_split_zero_parts_yields_no_parts() {
        assert!(split_text_into_parts("some text", 0).is_empty());
    }

    #[test]
    fn test_extract_tagged_json_block() {
        let reply =
            "Here is the question.\n<json_format>\n{\"question\": \"Q?\"}\n</json_format>\nDone.";
        let value = extract_json_block(reply).unwrap();
        assert_eq!(value["question"], "Q?");
    }

    #[test]
    fn test_extract_fenced_json_block() {
        let reply = "Sure!\n```json\n{\"question\": \"Q?\"}\n```";
        let value = extract_json_block(reply).unwrap();
        assert_eq!(value["question"], "Q?");
    }

    #[test]
    fn test_tagged_and_fenced_yield_the_same_value() {
        let tagged = "<json_format>{\"question\": \"Q?\", \"answers\": []}</json_format>";
        let fenced = "```json\n{\"question\": \"Q?\", \"answers\": []}\n```";
        assert_eq!(
            extract_json_block(tagged).unwrap(),
            extract_json_block(fenced).unwrap()
        );
    }

    #[test]
    fn test_tagged_block_takes_precedence_over_fenced() {
        let reply =
            "<json_format>{\"from\": \"tag\"}</json_format>\n```json\n{\"from\": \"fence\"}\n```";
        let value = extract_json_block(reply).unwrap();
        assert_eq!(value["from"], "tag");
    }

    #[test]
    fn test_extract_spans_multiple_lines() {
        let reply = "<json_format>\n{\n  \"question\": \"Q?\",\n  \"quote\": \"line one\\nline two\"\n}\n</json_format>";
        let value = extract_json_block(reply).unwrap();
        assert_eq!(value["question"], "Q?");
    }

    #[test]
    fn test_extract_without_any_block_is_an_error() {
        let result = extract_json_block("I could not produce a question, sorry.");
        match result {
            Err(WorkerError::GenerationError(msg)) => {
                assert!(msg.contains("No JSON block"), "got: {}", msg)
            }
            other => panic!("Expected GenerationError, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_with_malformed_json_is_an_error() {
        let result = extract_json_block("<json_format>{not json}</json_format>");
        match result {
            Err(WorkerError::GenerationError(msg)) => {
                assert!(msg.contains("parse"), "got: {}", msg)
            }
            other => panic!("Expected GenerationError, got {:?}", other),
        }
    }
}
