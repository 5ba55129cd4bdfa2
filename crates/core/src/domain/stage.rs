//! Pipeline stage normalization.
//!
//! Maps the phrasings people use for deal stages onto the exact labels the CRM
//! pipeline expects. Unmapped text is passed through unchanged; the backend is
//! the final validator of stage values.

/// Stage label assigned to new deals that do not name one.
pub const DEFAULT_DEAL_STAGE: &str = "Qualification";

const STAGE_LABELS: &[(&str, &str)] = &[
    ("qualification", "Qualification"),
    ("needs analysis", "Needs Analysis"),
    ("value proposition", "Value Proposition"),
    ("id. decision makers", "Id. Decision Makers"),
    ("identify decision makers", "Id. Decision Makers"),
    ("perception analysis", "Perception Analysis"),
    ("proposal", "Proposal/Price Quote"),
    ("proposal/price quote", "Proposal/Price Quote"),
    ("price quote", "Proposal/Price Quote"),
    ("negotiation", "Negotiation/Review"),
    ("negotiation/review", "Negotiation/Review"),
    ("closed won", "Closed Won"),
    ("closed (won)", "Closed Won"),
    ("won", "Closed Won"),
    ("closed lost", "Closed Lost"),
    ("closed (lost)", "Closed Lost"),
    ("lost", "Closed Lost"),
    ("closed lost to competition", "Closed-Lost to Competition"),
];

/// Returns the canonical label for `text`, if the phrase is known.
pub fn canonical_stage(text: &str) -> Option<&'static str> {
    let key = text.trim().to_lowercase();
    STAGE_LABELS.iter().find(|(phrase, _)| *phrase == key).map(|(_, label)| *label)
}

/// Normalizes a free-form stage phrase, falling back to the input unchanged.
pub fn normalize_stage(text: &str) -> String {
    canonical_stage(text).map(str::to_owned).unwrap_or_else(|| text.to_owned())
}

#[cfg(test)]
mod tests {
    use super::{canonical_stage, normalize_stage, DEFAULT_DEAL_STAGE};

    #[test]
    fn lookup_ignores_case_and_surrounding_whitespace() {
        assert_eq!(normalize_stage("CLOSED WON"), "Closed Won");
        assert_eq!(normalize_stage("closed won"), normalize_stage("CLOSED WON"));
        assert_eq!(normalize_stage("  Negotiation "), "Negotiation/Review");
    }

    #[test]
    fn short_phrases_map_to_full_labels() {
        assert_eq!(normalize_stage("proposal"), "Proposal/Price Quote");
        assert_eq!(normalize_stage("Proposal/Price Quote"), "Proposal/Price Quote");
        assert_eq!(normalize_stage("closed (lost)"), "Closed Lost");
    }

    #[test]
    fn unknown_stage_is_passed_through_unchanged() {
        assert_eq!(normalize_stage("banana"), "banana");
        assert_eq!(normalize_stage(" Banana "), " Banana ");
        assert_eq!(canonical_stage("banana"), None);
    }

    #[test]
    fn default_stage_is_canonical() {
        assert_eq!(canonical_stage(DEFAULT_DEAL_STAGE), Some(DEFAULT_DEAL_STAGE));
    }
}
