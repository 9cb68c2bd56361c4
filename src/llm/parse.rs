//! Extraction of JSON payloads from LLM replies.

/// Extract the JSON portion of an LLM response.
///
/// Tries, in order: a ```json fenced block, a generic fenced block, and the
/// outermost brace span. Falls back to the whole response so the caller's
/// `serde_json` error carries the original text.
pub fn extract_json_block(response: &str) -> &str {
    // Try json code block
    if let Some(start) = response.find("```json") {
        let content_start = start + 7;
        if let Some(end) = response[content_start..].find("```") {
            return response[content_start..content_start + end].trim();
        }
    }

    // Try generic code block
    if let Some(start) = response.find("```") {
        let content_start = start + 3;
        let content_start = response[content_start..]
            .find('\n')
            .map(|i| content_start + i + 1)
            .unwrap_or(content_start);
        if let Some(end) = response[content_start..].find("```") {
            return response[content_start..content_start + end].trim();
        }
    }

    // Try raw JSON, honoring whichever delimiter opens first so an array
    // of objects is not truncated to its first element.
    let object = response.find('{');
    let array = response.find('[');
    let (start, close) = match (object, array) {
        (Some(o), Some(a)) if a < o => (a, ']'),
        (Some(o), _) => (o, '}'),
        (None, Some(a)) => (a, ']'),
        (None, None) => return response,
    };
    if let Some(end) = response.rfind(close) {
        if end > start {
            return &response[start..=end];
        }
    }

    response
}
