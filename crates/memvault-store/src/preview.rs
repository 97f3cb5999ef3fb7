//! Human-readable previews for stored blocks.

use crate::model::BlockRecord;

/// Maximum preview length in characters, including the ellipsis.
const PREVIEW_MAX_CHARS: usize = 80;

/// Placeholder for blocks with no renderable content.
const NO_PREVIEW: &str = "(no preview)";

/// Render a one-line preview for a stored block.
///
/// Uses the first message carrying a non-empty `text` field, rendered as
/// `"<speaker>: <text>"` and truncated to 80 characters. Treats the record
/// as read-only input.
pub fn block_preview(record: &BlockRecord) -> String {
    for message in &record.messages {
        let text = message
            .get("text")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if text.is_empty() {
            continue;
        }
        let speaker = message
            .get("speaker")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|speaker| !speaker.is_empty())
            .unwrap_or("?");
        return truncate_preview(&format!("{speaker}: {text}"));
    }
    NO_PREVIEW.to_string()
}

/// Truncate to the preview budget, ending with an ellipsis when cut.
fn truncate_preview(line: &str) -> String {
    if line.chars().count() <= PREVIEW_MAX_CHARS {
        return line.to_string();
    }
    let mut preview: String = line.chars().take(PREVIEW_MAX_CHARS - 1).collect();
    preview.push('…');
    preview
}
