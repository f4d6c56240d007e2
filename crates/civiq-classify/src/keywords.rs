//! Keyword tables and the scoring pass over submission text.

use tracing::debug;

use civiq_core::report::IssueType;

use crate::{BASE_CONFIDENCE, CONFIDENCE_PER_EXTRA_HIT, Detection, MAX_CONFIDENCE};

/// Keyword-scoring detector over submission title + description.
///
/// Matching is case-insensitive on whole substrings. The type with the
/// most hits wins; ties break toward the earlier table entry, which is
/// ordered from most to least specific.
pub struct KeywordClassifier {
    tables: Vec<(IssueType, &'static [&'static str])>,
}

const POTHOLE: &[&str] = &["pothole", "pot hole", "crater", "sinkhole", "road cave"];
const STREETLIGHT: &[&str] = &[
    "streetlight",
    "street light",
    "lamp post",
    "lamppost",
    "light not working",
    "light out",
    "dark street",
];
const GARBAGE: &[&str] = &[
    "garbage",
    "trash",
    "rubbish",
    "litter",
    "waste",
    "dump",
    "overflowing bin",
];
const DRAINAGE: &[&str] = &[
    "drain",
    "drainage",
    "sewer",
    "sewage",
    "waterlogging",
    "flooded",
    "flooding",
    "clogged",
];
const ROAD_DAMAGE: &[&str] = &[
    "road damage",
    "cracked road",
    "broken road",
    "damaged pavement",
    "broken footpath",
    "guardrail",
];
const WATER_SUPPLY: &[&str] = &[
    "water supply",
    "no water",
    "water leak",
    "burst pipe",
    "pipeline",
    "tap water",
];
const POWER_OUTAGE: &[&str] = &[
    "power outage",
    "power cut",
    "no electricity",
    "blackout",
    "transformer",
    "power line",
];

impl KeywordClassifier {
    /// The stock keyword tables.
    pub fn builtin() -> Self {
        Self {
            tables: vec![
                (IssueType::Streetlight, STREETLIGHT),
                (IssueType::Pothole, POTHOLE),
                (IssueType::RoadDamage, ROAD_DAMAGE),
                (IssueType::WaterSupply, WATER_SUPPLY),
                (IssueType::PowerOutage, POWER_OUTAGE),
                (IssueType::Drainage, DRAINAGE),
                (IssueType::Garbage, GARBAGE),
            ],
        }
    }

    /// Detect an issue type from free text, or `None` when no keyword
    /// matches anywhere.
    pub fn detect(&self, text: &str) -> Option<Detection> {
        let haystack = text.to_lowercase();

        let mut best: Option<(IssueType, usize)> = None;
        for (issue_type, keywords) in &self.tables {
            let hits = keywords.iter().filter(|k| haystack.contains(**k)).count();
            if hits > 0 && best.is_none_or(|(_, best_hits)| hits > best_hits) {
                best = Some((*issue_type, hits));
            }
        }

        best.map(|(issue_type, hits)| {
            let confidence = (BASE_CONFIDENCE
                + CONFIDENCE_PER_EXTRA_HIT * (hits.saturating_sub(1)) as f64)
                .min(MAX_CONFIDENCE);
            debug!(issue_type = %issue_type, hits, confidence, "keyword detection");
            Detection {
                issue_type,
                confidence,
            }
        })
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_keyword_hit_detects_with_base_confidence() {
        let clf = KeywordClassifier::builtin();
        let d = clf.detect("There is a huge pothole on Main Street").unwrap();
        assert_eq!(d.issue_type, IssueType::Pothole);
        assert_eq!(d.confidence, BASE_CONFIDENCE);
    }

    #[test]
    fn extra_hits_raise_confidence() {
        let clf = KeywordClassifier::builtin();
        let d = clf
            .detect("Garbage everywhere: trash and litter piling up near the overflowing bin")
            .unwrap();
        assert_eq!(d.issue_type, IssueType::Garbage);
        assert!(d.confidence > BASE_CONFIDENCE);
        assert!(d.confidence <= MAX_CONFIDENCE);
    }

    #[test]
    fn confidence_caps_below_one() {
        let clf = KeywordClassifier::builtin();
        let d = clf
            .detect("drain drainage sewer sewage waterlogging flooded flooding clogged")
            .unwrap();
        assert_eq!(d.issue_type, IssueType::Drainage);
        assert_eq!(d.confidence, MAX_CONFIDENCE);
    }

    #[test]
    fn unmatched_text_detects_nothing() {
        let clf = KeywordClassifier::builtin();
        assert!(clf.detect("The park bench is wobbly").is_none());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let clf = KeywordClassifier::builtin();
        let d = clf.detect("STREETLIGHT broken outside my house").unwrap();
        assert_eq!(d.issue_type, IssueType::Streetlight);
    }

    #[test]
    fn most_hits_wins_across_types() {
        let clf = KeywordClassifier::builtin();
        // One pothole hit vs two drainage hits.
        let d = clf
            .detect("pothole full of water, drain clogged and flooded")
            .unwrap();
        assert_eq!(d.issue_type, IssueType::Drainage);
    }

    #[test]
    fn detection_is_deterministic() {
        let clf = KeywordClassifier::builtin();
        let text = "street light out, dark street at night";
        assert_eq!(clf.detect(text), clf.detect(text));
    }
}
