use crate::core::text::normalize_text;
use crate::domain::model::RecognizedText;
use std::collections::HashMap;

/// Boxes below this confidence are dropped while merging variants.
pub const MIN_OCR_CONFIDENCE: f32 = 0.2;

/// Merge OCR output of several variants of the same image.
///
/// Each distinct text (compared after [`normalize_text`]) keeps its most
/// confident box. The result is in reading order: top edge, then left edge.
pub fn merge_variants(results: Vec<Vec<RecognizedText>>) -> Vec<RecognizedText> {
    let mut merged: Vec<RecognizedText> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for item in results.into_iter().flatten() {
        let text = item.text.trim();
        if text.is_empty() || item.confidence < MIN_OCR_CONFIDENCE {
            continue;
        }

        let key = normalize_text(text);
        match positions.get(&key) {
            Some(&index) => {
                if item.confidence > merged[index].confidence {
                    merged[index] = item;
                }
            }
            None => {
                positions.insert(key, merged.len());
                merged.push(item);
            }
        }
    }

    merged.sort_by(|a, b| {
        a.top()
            .total_cmp(&b.top())
            .then_with(|| a.left().total_cmp(&b.left()))
    });
    merged
}
