//! Keyword-based document type detection.
//!
//! Rules are checked top to bottom and the first hit wins:
//! contract → order → resolution → law → decision → unknown.

use lexrisk_shared::DocumentType;

/// Priority-ordered keyword rules. Keywords are lowercase.
const RULES: &[(DocumentType, &[&str])] = &[
    (DocumentType::Contract, &["договор", "contract", "agreement"]),
    (DocumentType::Order, &["приказ"]),
    (DocumentType::Resolution, &["постановление", "resolution"]),
    (DocumentType::Law, &["закон", "statute"]),
    (DocumentType::Decision, &["решение", "decision"]),
];

/// Classify `text`. Always returns a label; [`DocumentType::Unknown`] when
/// nothing matches.
pub fn classify(text: &str) -> DocumentType {
    let lower = text.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(ty, _)| *ty)
        .unwrap_or(DocumentType::Unknown)
}
