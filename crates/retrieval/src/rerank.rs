//! Multi-signal reranking
//!
//! The fused candidate list is rescored with eight signals, each normalized
//! to `[0, 1]`: dense similarity, lexical match, keyword overlap, section
//! boost, recency, source authority, length fit, and a subtractive
//! near-duplicate penalty. The seven positive weights sum to 1.0, so the
//! pre-penalty score reads as a weighted average.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Datelike;

use scilit_config::{RetrievalConfig, SignalWeights};
use scilit_core::{Passage, Section};

use crate::expansion::ExpandedQuery;
use crate::fusion::FusedCandidate;
use crate::tokenize::{jaccard, token_set};

/// Per-section boost values, already normalized to `[0, 1]`.
///
/// Results and abstracts carry the paper's claims; methods and
/// introductions mostly restate context; references and appendices are
/// rarely quotable evidence.
#[derive(Debug, Clone)]
pub struct SectionBoosts {
    pub primary: f32,
    pub secondary: f32,
    pub background: f32,
    pub residual: f32,
}

impl Default for SectionBoosts {
    fn default() -> Self {
        Self {
            primary: 1.0,
            secondary: 0.7,
            background: 0.3,
            residual: 0.0,
        }
    }
}

impl SectionBoosts {
    pub fn boost(&self, section: Section) -> f32 {
        match section {
            Section::Abstract | Section::Results => self.primary,
            Section::Discussion | Section::Conclusion => self.secondary,
            Section::Methods | Section::Introduction => self.background,
            Section::References | Section::Appendix | Section::Unknown => self.residual,
        }
    }
}

/// Domain authority table, normalized to `[0, 1]`. Matched against the
/// host of `source_url` by suffix, so subdomains inherit the score.
fn default_authority_domains() -> Vec<(String, f32)> {
    vec![
        ("nasa.gov".to_string(), 1.0),
        ("nature.com".to_string(), 0.86),
        ("science.org".to_string(), 0.86),
        ("nih.gov".to_string(), 0.71),
        ("cell.com".to_string(), 0.71),
        ("plos.org".to_string(), 0.57),
        ("doi.org".to_string(), 0.29),
    ]
}

#[derive(Debug, Clone)]
pub struct RerankerConfig {
    pub weights: SignalWeights,
    pub section_boosts: SectionBoosts,
    pub authority_domains: Vec<(String, f32)>,
    /// Token-set Jaccard above which a passage counts as a near-duplicate
    /// of a higher-ranked one.
    pub duplicate_threshold: f32,
    /// Character-length band scoring a full length-fit signal.
    pub length_band: (usize, usize),
    /// Reference year for the recency signal. Injectable for tests.
    pub current_year: i32,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            section_boosts: SectionBoosts::default(),
            authority_domains: default_authority_domains(),
            duplicate_threshold: 0.95,
            length_band: (300, 800),
            current_year: chrono::Utc::now().year(),
        }
    }
}

impl From<&RetrievalConfig> for RerankerConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            weights: config.weights,
            duplicate_threshold: config.duplicate_threshold,
            length_band: (config.min_passage_chars, config.max_passage_chars),
            ..Self::default()
        }
    }
}

/// All eight signal values for one passage, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalBreakdown {
    pub similarity: f32,
    pub lexical: f32,
    pub keyword_overlap: f32,
    pub section_boost: f32,
    pub recency: f32,
    pub authority: f32,
    pub length_fit: f32,
    pub duplicate_penalty: f32,
}

impl SignalBreakdown {
    fn weighted_positive(&self, w: &SignalWeights) -> f32 {
        w.similarity * self.similarity
            + w.lexical * self.lexical
            + w.keyword_overlap * self.keyword_overlap
            + w.section_boost * self.section_boost
            + w.recency * self.recency
            + w.authority * self.authority
            + w.length_fit * self.length_fit
    }

    pub fn final_score(&self, w: &SignalWeights) -> f32 {
        self.weighted_positive(w) - w.duplicate_penalty * self.duplicate_penalty
    }

    /// Human-readable note naming the two strongest weighted contributions,
    /// surfaced in citations.
    pub fn relevance_reason(&self, w: &SignalWeights) -> String {
        let mut contributions = [
            ("semantic similarity", w.similarity * self.similarity),
            ("keyword match", w.lexical * self.lexical),
            ("query term overlap", w.keyword_overlap * self.keyword_overlap),
            ("high-evidence section", w.section_boost * self.section_boost),
            ("recent publication", w.recency * self.recency),
            ("authoritative source", w.authority * self.authority),
            ("well-sized passage", w.length_fit * self.length_fit),
        ];
        contributions.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let top: Vec<&str> = contributions
            .iter()
            .take(2)
            .filter(|(_, value)| *value > 0.0)
            .map(|(name, _)| *name)
            .collect();
        if top.is_empty() {
            "retrieved candidate".to_string()
        } else {
            top.join(", ")
        }
    }
}

/// A reranked passage with its score and signal breakdown.
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub passage: Arc<Passage>,
    pub signals: SignalBreakdown,
    pub score: f32,
}

pub struct Reranker {
    config: RerankerConfig,
}

impl Reranker {
    pub fn new(config: RerankerConfig) -> Self {
        Self { config }
    }

    pub fn weights(&self) -> SignalWeights {
        self.config.weights
    }

    /// Rescore and reorder fused candidates. Ties break by passage id, so
    /// reranking the same candidates always yields the same order.
    pub fn rerank(&self, candidates: &[FusedCandidate], query: &ExpandedQuery) -> Vec<RankedResult> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let query_terms: HashSet<String> = query.terms.iter().cloned().collect();
        let max_lexical = candidates
            .iter()
            .filter_map(|c| c.lexical_score)
            .fold(0.0f32, f32::max);

        // Preliminary pass: seven positive signals, no penalty yet.
        let mut scored: Vec<(RankedResult, HashSet<String>)> = candidates
            .iter()
            .map(|candidate| {
                let tokens = token_set(&candidate.passage.text);
                let signals = self.positive_signals(candidate, &query_terms, &tokens, max_lexical);
                let score = signals.weighted_positive(&self.config.weights);
                (
                    RankedResult {
                        passage: Arc::clone(&candidate.passage),
                        signals,
                        score,
                    },
                    tokens,
                )
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.score
                .partial_cmp(&a.0.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.passage.id.cmp(&b.0.passage.id))
        });

        // Penalty pass: each passage is compared against those ranked above
        // it preliminarily, so of two near-duplicates only the weaker one
        // is penalized.
        let mut seen: Vec<HashSet<String>> = Vec::with_capacity(scored.len());
        let mut results: Vec<RankedResult> = Vec::with_capacity(scored.len());
        for (mut result, tokens) in scored {
            let is_duplicate = seen
                .iter()
                .any(|prior| jaccard(prior, &tokens) > self.config.duplicate_threshold);
            if is_duplicate {
                result.signals.duplicate_penalty = 1.0;
                result.score = result.signals.final_score(&self.config.weights);
            }
            seen.push(tokens);
            results.push(result);
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.passage.id.cmp(&b.passage.id))
        });
        results
    }

    fn positive_signals(
        &self,
        candidate: &FusedCandidate,
        query_terms: &HashSet<String>,
        passage_tokens: &HashSet<String>,
        max_lexical: f32,
    ) -> SignalBreakdown {
        SignalBreakdown {
            similarity: candidate.similarity.unwrap_or(0.0).clamp(0.0, 1.0),
            lexical: normalize_lexical(candidate.lexical_score, max_lexical),
            keyword_overlap: keyword_overlap(query_terms, passage_tokens),
            section_boost: self.config.section_boosts.boost(candidate.passage.section),
            recency: self.recency(candidate.passage.year),
            authority: self.authority(candidate.passage.source_url.as_deref()),
            length_fit: self.length_fit(candidate.passage.char_len()),
            duplicate_penalty: 0.0,
        }
    }

    /// Step function over publication age. Missing years score zero rather
    /// than being guessed at.
    fn recency(&self, year: Option<i32>) -> f32 {
        let Some(year) = year else { return 0.0 };
        let age = self.config.current_year.saturating_sub(year);
        if age < 0 {
            // Publication year in the future, treat as current
            return 1.0;
        }
        match age {
            0..=2 => 1.0,
            3..=5 => 0.6,
            6..=10 => 0.2,
            _ => 0.0,
        }
    }

    fn authority(&self, source_url: Option<&str>) -> f32 {
        let Some(url) = source_url else { return 0.0 };
        let Some(host) = host_of(url) else { return 0.0 };
        self.config
            .authority_domains
            .iter()
            .filter(|(domain, _)| host == *domain || host.ends_with(&format!(".{domain}")))
            .map(|(_, score)| *score)
            .fold(0.0, f32::max)
    }

    fn length_fit(&self, len: usize) -> f32 {
        let (min, max) = self.config.length_band;
        if len == 0 {
            0.0
        } else if len < min {
            len as f32 / min as f32
        } else if len > max {
            max as f32 / len as f32
        } else {
            1.0
        }
    }
}

fn normalize_lexical(score: Option<f32>, max_lexical: f32) -> f32 {
    match score {
        Some(s) if max_lexical > 0.0 => (s / max_lexical).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Fraction of query terms present in the passage.
fn keyword_overlap(query_terms: &HashSet<String>, passage_tokens: &HashSet<String>) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let hits = query_terms.intersection(passage_tokens).count();
    hits as f32 / query_terms.len() as f32
}

fn host_of(url: &str) -> Option<String> {
    let rest = url.split("://").nth(1).unwrap_or(url);
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.rsplit('@').next()?;
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expansion::TermDictionary;

    fn passage(id: &str, text: &str, section: Section, year: Option<i32>, url: Option<&str>) -> Arc<Passage> {
        Arc::new(Passage {
            id: id.to_string(),
            document_id: format!("doc-{id}"),
            section,
            text: text.to_string(),
            source_url: url.map(String::from),
            year,
        })
    }

    fn fused(passage: Arc<Passage>, similarity: Option<f32>, lexical: Option<f32>) -> FusedCandidate {
        FusedCandidate {
            passage,
            score: 0.0,
            similarity,
            lexical_score: lexical,
        }
    }

    fn reranker() -> Reranker {
        Reranker::new(RerankerConfig {
            current_year: 2024,
            ..RerankerConfig::default()
        })
    }

    fn query(text: &str) -> ExpandedQuery {
        TermDictionary::empty().expand(text)
    }

    #[test]
    fn test_signals_stay_in_unit_range() {
        let r = reranker();
        let text = "Microgravity exposure reduced bone density in murine models. ".repeat(8);
        let candidates = vec![fused(
            passage("p1", &text, Section::Results, Some(2023), Some("https://www.nasa.gov/x")),
            Some(0.9),
            Some(14.0),
        )];
        let ranked = r.rerank(&candidates, &query("microgravity bone density"));
        let s = ranked[0].signals;
        for value in [
            s.similarity,
            s.lexical,
            s.keyword_overlap,
            s.section_boost,
            s.recency,
            s.authority,
            s.length_fit,
            s.duplicate_penalty,
        ] {
            assert!((0.0..=1.0).contains(&value), "signal out of range: {value}");
        }
        assert!(ranked[0].score <= 1.0);
    }

    #[test]
    fn test_section_boost_table() {
        let boosts = SectionBoosts::default();
        assert_eq!(boosts.boost(Section::Results), 1.0);
        assert_eq!(boosts.boost(Section::Abstract), 1.0);
        assert_eq!(boosts.boost(Section::Discussion), 0.7);
        assert_eq!(boosts.boost(Section::Methods), 0.3);
        assert_eq!(boosts.boost(Section::Unknown), 0.0);
    }

    #[test]
    fn test_recency_steps() {
        let r = reranker();
        assert_eq!(r.recency(Some(2023)), 1.0);
        assert_eq!(r.recency(Some(2020)), 0.6);
        assert_eq!(r.recency(Some(2015)), 0.2);
        assert_eq!(r.recency(Some(2010)), 0.0);
        assert_eq!(r.recency(None), 0.0);
        assert_eq!(r.recency(Some(2026)), 1.0);
    }

    #[test]
    fn test_authority_suffix_match() {
        let r = reranker();
        assert_eq!(r.authority(Some("https://ntrs.nasa.gov/citations/1")), 1.0);
        assert_eq!(r.authority(Some("https://www.nature.com/articles/x")), 0.86);
        assert_eq!(r.authority(Some("https://example.com/paper")), 0.0);
        assert_eq!(r.authority(None), 0.0);
        // "notnasa.gov" must not inherit nasa.gov's score
        assert_eq!(r.authority(Some("https://notnasa.gov/x")), 0.0);
    }

    #[test]
    fn test_length_fit_band() {
        let r = reranker();
        assert_eq!(r.length_fit(500), 1.0);
        assert_eq!(r.length_fit(300), 1.0);
        assert_eq!(r.length_fit(800), 1.0);
        assert!((r.length_fit(150) - 0.5).abs() < 1e-6);
        assert!((r.length_fit(1600) - 0.5).abs() < 1e-6);
        assert_eq!(r.length_fit(0), 0.0);
    }

    #[test]
    fn test_near_duplicate_is_penalized_below_original() {
        let r = reranker();
        let text = "Spaceflight induced significant bone density loss in load-bearing \
                    regions of murine femurs over the thirty day mission period.";
        let candidates = vec![
            fused(
                passage("a-original", text, Section::Results, Some(2023), None),
                Some(0.9),
                Some(10.0),
            ),
            // Near-identical text, slightly weaker similarity
            fused(
                passage("b-duplicate", text, Section::Results, Some(2023), None),
                Some(0.88),
                Some(10.0),
            ),
            fused(
                passage(
                    "c-distinct",
                    "Bone density loss correlated with spaceflight duration across \
                     independent murine cohorts housed in the rodent habitat.",
                    Section::Results,
                    Some(2023),
                    None,
                ),
                Some(0.8),
                Some(9.0),
            ),
        ];

        let ranked = r.rerank(&candidates, &query("bone density loss spaceflight"));
        assert_eq!(ranked[0].passage.id, "a-original");
        assert_eq!(ranked[0].signals.duplicate_penalty, 0.0);

        let duplicate = ranked.iter().find(|r| r.passage.id == "b-duplicate").unwrap();
        assert_eq!(duplicate.signals.duplicate_penalty, 1.0);
        // Full penalty drops the duplicate below the distinct passage
        assert_eq!(ranked.last().unwrap().passage.id, "b-duplicate");
    }

    #[test]
    fn test_expansion_terms_count_toward_overlap() {
        let r = reranker();
        let p = passage(
            "p1",
            "Weightlessness conditions accelerated muscle atrophy in flight crews.",
            Section::Results,
            Some(2023),
            None,
        );
        let candidates = vec![fused(Arc::clone(&p), Some(0.5), None)];

        let plain = query("microgravity effects");
        let without = r.rerank(&candidates, &plain);

        let mut entries = std::collections::BTreeMap::new();
        entries.insert(
            "microgravity".to_string(),
            std::iter::once("weightlessness".to_string()).collect(),
        );
        let expanded = TermDictionary::from_entries(entries).expand("microgravity effects");
        let with = r.rerank(&candidates, &expanded);

        assert!(with[0].signals.keyword_overlap > 0.0);
        assert!(with[0].signals.keyword_overlap >= without[0].signals.keyword_overlap);
    }

    #[test]
    fn test_rerank_is_deterministic() {
        let r = reranker();
        let candidates: Vec<FusedCandidate> = (0..5)
            .map(|i| {
                fused(
                    passage(&format!("p{i}"), "identical scoring inputs here", Section::Results, Some(2023), None),
                    Some(0.5),
                    Some(2.0),
                )
            })
            .collect();
        let q = query("scoring inputs");
        let first: Vec<String> = r.rerank(&candidates, &q).iter().map(|x| x.passage.id.clone()).collect();
        let second: Vec<String> = r.rerank(&candidates, &q).iter().map(|x| x.passage.id.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_final_score_matches_weighted_formula() {
        let weights = SignalWeights::default();
        let signals = SignalBreakdown {
            similarity: 0.8,
            lexical: 0.5,
            keyword_overlap: 0.4,
            section_boost: 1.0,
            recency: 0.6,
            authority: 1.0,
            length_fit: 0.9,
            duplicate_penalty: 1.0,
        };
        let expected = weights.similarity * 0.8
            + weights.lexical * 0.5
            + weights.keyword_overlap * 0.4
            + weights.section_boost * 1.0
            + weights.recency * 0.6
            + weights.authority * 1.0
            + weights.length_fit * 0.9
            - weights.duplicate_penalty * 1.0;
        assert!((signals.final_score(&weights) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_relevance_reason_names_strong_signals() {
        let weights = SignalWeights::default();
        let signals = SignalBreakdown {
            similarity: 0.9,
            section_boost: 1.0,
            ..SignalBreakdown::default()
        };
        let reason = signals.relevance_reason(&weights);
        assert!(reason.contains("semantic similarity"));
    }
}
