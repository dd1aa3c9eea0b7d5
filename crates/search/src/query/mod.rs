//! Query engine: tokenize, expand synonyms, prune via bloom filter, score
//! with BM25F, and build snippets — all against one resident segment.

pub mod ranking;
pub mod snippet;
pub mod synonyms;

use std::collections::{HashMap, HashSet};

use crate::analyzer::{Analyzer, DefaultAnalyzer};
use crate::bloom;
use crate::error::Result;
use crate::sqlite_segment::{PostingEntry, SegmentReader};
use ranking::{ScoredDoc, ScoringContext, TermMatch};

#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    pub text: String,
    pub max_results: Option<usize>,
    pub fuzzy: bool,
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub doc_id: String,
    pub url: String,
    pub title: String,
    pub score: f64,
    pub snippet: String,
    pub matched_fields: Vec<String>,
}

/// Records which pipeline stage a query passed through and why, for
/// observability and debugging relevance issues.
#[derive(Debug, Clone)]
pub struct MatchTrace {
    pub stage: u8,
    pub stage_name: &'static str,
    pub query_variant: String,
    pub match_reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub results: Vec<QueryResult>,
    pub trace: Vec<MatchTrace>,
}

pub struct QueryEngine<'a> {
    reader: &'a SegmentReader,
}

impl<'a> QueryEngine<'a> {
    pub fn new(reader: &'a SegmentReader) -> Self {
        QueryEngine { reader }
    }

    pub fn search(&self, spec: &QuerySpec) -> Result<SearchOutcome> {
        let mut trace = Vec::new();
        let max_results = spec
            .max_results
            .unwrap_or(*crate::knobs::DEFAULT_MAX_RESULTS)
            .min(*crate::knobs::MAX_MAX_RESULTS);

        let schema = self.reader.schema()?;
        let analyzer = DefaultAnalyzer::default();
        let ordered_terms: Vec<String> = analyzer.tokenize(&spec.text).into_iter().map(|t| t.text).collect();
        trace.push(MatchTrace {
            stage: 1,
            stage_name: "tokenize",
            query_variant: spec.text.clone(),
            match_reason: format!("{} token(s)", ordered_terms.len()),
        });

        if ordered_terms.is_empty() {
            return Ok(SearchOutcome { results: Vec::new(), trace });
        }

        let expanded = synonyms::expand_query_terms(&ordered_terms);
        trace.push(MatchTrace {
            stage: 2,
            stage_name: "synonym_expansion",
            query_variant: expanded.iter().cloned().collect::<Vec<_>>().join(","),
            match_reason: format!("expanded {} term(s) to {}", ordered_terms.len(), expanded.len()),
        });

        let stats = self.reader.corpus_stats()?;
        let candidate_terms = self.prune_via_bloom(&expanded, stats.bloom)?;
        trace.push(MatchTrace {
            stage: 3,
            stage_name: "bloom_probe",
            query_variant: candidate_terms.iter().cloned().collect::<Vec<_>>().join(","),
            match_reason: format!("{} of {} terms survived bloom probe", candidate_terms.len(), expanded.len()),
        });

        if candidate_terms.is_empty() {
            return Ok(SearchOutcome { results: Vec::new(), trace });
        }

        let text_fields: Vec<(String, f32)> = schema
            .text_fields_with_positive_boost()
            .map(|f| (f.name.clone(), f.boost))
            .collect();
        let field_names: Vec<String> = text_fields.iter().map(|(n, _)| n.clone()).collect();
        let ctx = ScoringContext::build(self.reader, &field_names)?;

        let mut postings: HashMap<(String, String), Vec<PostingEntry>> = HashMap::new();
        for term in &candidate_terms {
            for (field, _) in &text_fields {
                let rows = self.reader.postings(field, term)?;
                if !rows.is_empty() {
                    postings.insert((term.clone(), field.clone()), rows);
                }
            }
        }

        let scored = self.score_candidates(&ctx, &text_fields, &candidate_terms, &postings, &ordered_terms)?;
        trace.push(MatchTrace {
            stage: 4,
            stage_name: "score",
            query_variant: spec.text.clone(),
            match_reason: format!("{} candidate document(s) scored", scored.len()),
        });

        let top = ranking::top_k(scored, max_results);
        let mut results = Vec::with_capacity(top.len());
        for doc in top {
            let Some(fields) = self.reader.document(&doc.doc_id)? else { continue };
            let body = fields.get("body").or_else(|| fields.get("excerpt")).cloned().unwrap_or_default();
            results.push(QueryResult {
                doc_id: doc.doc_id.clone(),
                url: fields.get("url").cloned().unwrap_or_default(),
                title: fields.get("title").cloned().unwrap_or_default(),
                score: doc.score,
                snippet: snippet::build_snippet(&body, &ordered_terms),
                matched_fields: doc.matched_fields,
            });
        }
        trace.push(MatchTrace {
            stage: 5,
            stage_name: "snippet",
            query_variant: spec.text.clone(),
            match_reason: format!("{} result(s) returned", results.len()),
        });

        Ok(SearchOutcome { results, trace })
    }

    fn prune_via_bloom(&self, terms: &HashSet<String>, params: bloom::BloomParams) -> Result<Vec<String>> {
        let all_terms: Vec<String> = terms.iter().cloned().collect();
        crate::metrics::BLOOM_TERMS_PROBED_TOTAL.inc_by(all_terms.len() as u64);
        let blocks_needed = bloom::required_blocks(&all_terms, params);
        let loaded = self.reader.bloom_blocks(&blocks_needed)?;
        let survivors: Vec<String> = all_terms.iter().filter(|t| bloom::probe(t, params, &loaded)).cloned().collect();
        crate::metrics::BLOOM_TERMS_SKIPPED_TOTAL.inc_by((all_terms.len() - survivors.len()) as u64);
        Ok(survivors)
    }

    fn score_candidates(
        &self,
        ctx: &ScoringContext,
        text_fields: &[(String, f32)],
        candidate_terms: &[String],
        postings: &HashMap<(String, String), Vec<PostingEntry>>,
        ordered_terms: &[String],
    ) -> Result<Vec<ScoredDoc>> {
        let mut doc_ids: HashSet<String> = HashSet::new();
        for rows in postings.values() {
            doc_ids.extend(rows.iter().map(|p| p.doc_id.clone()));
        }

        let boost_of = |field: &str| -> f32 {
            text_fields.iter().find(|(name, _)| name == field).map(|(_, b)| *b).unwrap_or(0.0)
        };

        let mut scored = Vec::with_capacity(doc_ids.len());
        for doc_id in &doc_ids {
            let mut per_term = Vec::with_capacity(candidate_terms.len());
            let mut field_positions: Vec<(String, Vec<u32>)> = Vec::new();

            for term in candidate_terms {
                let mut field_postings = Vec::new();
                let mut document_frequency_docs: HashSet<&str> = HashSet::new();
                for (field, _) in text_fields {
                    let Some(rows) = postings.get(&(term.clone(), field.clone())) else { continue };
                    for row in rows {
                        document_frequency_docs.insert(row.doc_id.as_str());
                        if &row.doc_id == doc_id {
                            field_postings.push((boost_of(field), field.as_str(), row));
                            field_positions.push((field.clone(), row.positions.clone()));
                        }
                    }
                }
                if field_postings.is_empty() {
                    continue;
                }
                per_term.push(TermMatch {
                    document_frequency: document_frequency_docs.len() as u64,
                    field_postings,
                });
            }

            if per_term.is_empty() {
                continue;
            }

            let mut doc = ranking::score_document(doc_id, ctx, &per_term);
            doc.score += ranking::phrase_bonus(ordered_terms, &field_positions);
            scored.push(doc);
        }
        Ok(scored)
    }
}
