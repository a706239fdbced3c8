use serde_json::Value;

/// Pulls a JSON object out of model text: the body of a fenced code block
/// if one exists, otherwise the span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if let Some(fence) = trimmed.find("```") {
        let after = &trimmed[fence + 3..];
        // Drop the info string (```json).
        if let Some((_, body)) = after.split_once('\n') {
            if let Some(end) = body.find("```") {
                return Some(body[..end].trim().to_string());
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse_model_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Some(value);
    }
    let extracted = extract_json(text)?;
    if let Ok(value) = serde_json::from_str::<Value>(&extracted) {
        return Some(value);
    }
    // A fenced block can hold prose around the object too.
    let start = extracted.find('{')?;
    let end = extracted.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&extracted[start..=end]).ok()
}
