//! BM25F scoring: field-weighted Okapi BM25 with an optional phrase bonus.
//!
//! For each candidate document, per term and per field: `wTF = boost_f *
//! tf_{term,f,doc} / (1 - b + b * len_{f,doc} / avg_len_f)`, then `normTF =
//! (k1+1)*wTF / (k1+wTF)`, multiplied by a global (additive, non-negative)
//! IDF and summed across query terms and fields.

use std::cmp::Ordering;

use crate::knobs;
use crate::sqlite_segment::{PostingEntry, SegmentReader};

#[derive(Debug, Clone)]
pub struct FieldStats {
    pub field: String,
    pub avg_field_length: f64,
}

pub struct ScoringContext {
    pub doc_count: u64,
    pub field_avg_lengths: Vec<FieldStats>,
}

impl ScoringContext {
    pub fn build(reader: &SegmentReader, fields: &[String]) -> crate::error::Result<Self> {
        let stats = reader.corpus_stats()?;
        let mut field_avg_lengths = Vec::with_capacity(fields.len());
        for field in fields {
            let total_terms = reader.field_total_terms(field)?.unwrap_or(0);
            let avg = if stats.doc_count == 0 {
                0.0
            } else {
                total_terms as f64 / stats.doc_count as f64
            };
            field_avg_lengths.push(FieldStats {
                field: field.clone(),
                avg_field_length: avg.max(1.0),
            });
        }
        Ok(ScoringContext {
            doc_count: stats.doc_count,
            field_avg_lengths,
        })
    }

    fn avg_len(&self, field: &str) -> f64 {
        self.field_avg_lengths
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.avg_field_length)
            .unwrap_or(1.0)
    }
}

/// Per-term document frequency across the whole corpus (how many documents
/// contain the term in any field), used for the global IDF.
pub fn global_document_frequency(postings_per_field: &[Vec<PostingEntry>]) -> u64 {
    let mut doc_ids = std::collections::HashSet::new();
    for postings in postings_per_field {
        for posting in postings {
            doc_ids.insert(posting.doc_id.clone());
        }
    }
    doc_ids.len() as u64
}

/// Additive, non-negative IDF: `ln((N - df + 0.5) / (df + 0.5) + 1)`.
/// Differs from the classic Robertson-Spärck Jones form by the trailing
/// `+ 1`, which keeps it non-negative for terms present in most documents.
pub fn idf(total_docs: u64, document_frequency: u64) -> f64 {
    let n = total_docs as f64;
    let df = document_frequency as f64;
    (((n - df + 0.5) / (df + 0.5)) + 1.0).ln()
}

#[derive(Debug, Clone)]
pub struct ScoredDoc {
    pub doc_id: String,
    pub score: f64,
    pub matched_fields: Vec<String>,
}

/// One query term's postings for a single document, grouped by field, plus
/// that term's global document frequency.
pub struct TermMatch<'a> {
    pub document_frequency: u64,
    pub field_postings: Vec<(f32, &'a str, &'a PostingEntry)>,
}

/// Computes one document's BM25F score: per term, sum the field-weighted TF
/// across matched fields, normalize with the k1/b saturation curve, multiply
/// by that term's global IDF, and sum across terms.
pub fn score_document(doc_id: &str, ctx: &ScoringContext, per_term: &[TermMatch<'_>]) -> ScoredDoc {
    let mut score = 0.0;
    let mut matched_fields = std::collections::HashSet::new();

    for term in per_term {
        let mut weighted_tf = 0.0;
        for (boost, field, posting) in &term.field_postings {
            let avg_len = ctx.avg_len(field);
            let len_ratio = if avg_len > 0.0 { posting.doc_length as f64 / avg_len } else { 1.0 };
            weighted_tf += *boost as f64 * posting.tf as f64 / (1.0 - *knobs::BM25_B + *knobs::BM25_B * len_ratio);
            matched_fields.insert((*field).to_string());
        }
        if weighted_tf <= 0.0 {
            continue;
        }
        let norm_tf = (*knobs::BM25_K1 + 1.0) * weighted_tf / (*knobs::BM25_K1 + weighted_tf);
        score += norm_tf * idf(ctx.doc_count, term.document_frequency);
    }

    ScoredDoc {
        doc_id: doc_id.to_string(),
        score,
        matched_fields: matched_fields.into_iter().collect(),
    }
}

/// Phrase bonus: a flat, additive bonus applied once per document when every
/// term in `ordered_terms` appears, in order, within `PHRASE_WINDOW` token
/// positions of one another in a single field.
pub fn phrase_bonus(ordered_terms: &[String], field_positions: &[(String, Vec<u32>)]) -> f64 {
    if ordered_terms.len() < 2 {
        return 0.0;
    }
    for (_, positions) in field_positions {
        if has_ordered_window_match(ordered_terms.len(), positions, *knobs::PHRASE_WINDOW) {
            return *knobs::PHRASE_BONUS;
        }
    }
    0.0
}

fn has_ordered_window_match(term_count: usize, positions: &[u32], window: u32) -> bool {
    if positions.len() < term_count {
        return false;
    }
    let min = positions.iter().min().copied().unwrap_or(0);
    let max = positions.iter().max().copied().unwrap_or(0);
    max.saturating_sub(min) <= window
}

/// Selects the top `k` documents by score, tie-breaking ascending `doc_id`.
pub fn top_k(mut scored: Vec<ScoredDoc>, k: usize) -> Vec<ScoredDoc> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idf_is_non_negative_for_ubiquitous_terms() {
        let value = idf(1000, 999);
        assert!(value >= 0.0);
    }

    #[test]
    fn idf_decreases_with_document_frequency() {
        let rare = idf(1000, 1);
        let common = idf(1000, 500);
        assert!(rare > common);
    }

    #[test]
    fn top_k_tie_breaks_ascending_doc_id() {
        let docs = vec![
            ScoredDoc { doc_id: "b".into(), score: 1.0, matched_fields: vec![] },
            ScoredDoc { doc_id: "a".into(), score: 1.0, matched_fields: vec![] },
        ];
        let top = top_k(docs, 2);
        assert_eq!(top[0].doc_id, "a");
        assert_eq!(top[1].doc_id, "b");
    }

    #[test]
    fn top_k_truncates_to_requested_size() {
        let docs = (0..5)
            .map(|i| ScoredDoc { doc_id: format!("d{i}"), score: i as f64, matched_fields: vec![] })
            .collect();
        let top = top_k(docs, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].doc_id, "d4");
    }

    #[test]
    fn phrase_bonus_requires_at_least_two_terms() {
        let bonus = phrase_bonus(&["solo".to_string()], &[("body".to_string(), vec![0])]);
        assert_eq!(bonus, 0.0);
    }

    #[test]
    fn phrase_bonus_applies_within_window() {
        let terms = vec!["install".to_string(), "pip".to_string()];
        let positions = vec![("body".to_string(), vec![0, 1])];
        assert_eq!(phrase_bonus(&terms, &positions), *knobs::PHRASE_BONUS);
    }
}
