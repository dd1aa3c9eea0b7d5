//! Segment Builder (Indexer): walks a tenant's docs root, extracts typed
//! document records, and emits a deterministic, fingerprinted segment.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::analyzer::{tokenize_list, AnalyzerRegistry, KeywordAnalyzer};
use crate::bloom::{BloomBuilder, BloomParams};
use crate::error::{Result, SearchError};
use crate::fingerprint::{self, CanonicalRecord};
use crate::knobs;
use crate::schema::{FieldType, Schema};
use crate::sqlite_segment::{create_segment, PostingRow, SegmentWriteParams, StoredDocument};
use crate::store::SegmentStore;

const RESERVED_DIRS: &[&str] = &["__docs_metadata", "__search_segments", "__scheduler_meta", ".git", ".hg", ".svn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Online,
    Filesystem,
    Git,
}

#[derive(Debug, Default, Clone)]
pub struct IndexBuilderOptions {
    pub allow_prefixes: Vec<String>,
    pub deny_prefixes: Vec<String>,
    pub changed_paths: Vec<String>,
    pub changed_only: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Default)]
pub struct IndexBuildResult {
    pub documents_indexed: usize,
    pub documents_skipped: usize,
    pub errors: Vec<String>,
    pub segment_ids: Vec<String>,
    pub segment_paths: Vec<PathBuf>,
}

/// A fully extracted document record, ready to be analyzed and indexed.
/// Field order here is the canonicalization order fed into the fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentRecord {
    url: String,
    title: String,
    body: String,
    excerpt: String,
    headings_h1: Vec<String>,
    headings_h2: Vec<String>,
    headings_h3_plus: Vec<String>,
    url_path: String,
    tags: Vec<String>,
    language: String,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct MetadataSidecar {
    url: Option<String>,
    title: Option<String>,
    metadata: Option<MetadataSidecarInner>,
}

#[derive(Debug, Default, Deserialize)]
struct MetadataSidecarInner {
    markdown_rel_path: Option<String>,
    last_fetched_at: Option<String>,
    indexed_at: Option<String>,
}

struct DiscoveredDoc {
    markdown_path: PathBuf,
    markdown_rel: String,
    metadata_path: Option<PathBuf>,
    metadata_rel: Option<String>,
    metadata: Option<MetadataSidecar>,
}

pub struct SegmentBuilder {
    docs_root: PathBuf,
    schema: Schema,
    source_type: SourceType,
    options: IndexBuilderOptions,
    analyzers: AnalyzerRegistry,
    cancel: Option<Arc<AtomicBool>>,
}

impl SegmentBuilder {
    pub fn new(docs_root: impl Into<PathBuf>, schema: Schema, source_type: SourceType) -> Self {
        SegmentBuilder {
            docs_root: docs_root.into(),
            schema,
            source_type,
            options: IndexBuilderOptions::default(),
            analyzers: AnalyzerRegistry::default(),
            cancel: None,
        }
    }

    pub fn with_options(mut self, options: IndexBuilderOptions) -> Self {
        self.options = options;
        self
    }

    /// Shared flag checked between documents so a background rebuild can be
    /// cancelled without tearing down an in-flight document read.
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(&self, store: &SegmentStore, previous_created_at: Option<DateTime<Utc>>) -> Result<IndexBuildResult> {
        let timer = crate::metrics::SEGMENT_BUILD_SECONDS.start_timer();
        let result = self.build_inner(store, previous_created_at);
        timer.stop_and_record();
        if let Ok(result) = &result {
            crate::metrics::SEGMENT_BUILD_DOCUMENTS_TOTAL.inc_by(result.documents_indexed as u64);
            crate::metrics::SEGMENT_BUILD_ERRORS_TOTAL.inc_by(result.errors.len() as u64);
        }
        result
    }

    fn build_inner(&self, store: &SegmentStore, previous_created_at: Option<DateTime<Utc>>) -> Result<IndexBuildResult> {
        let mut result = IndexBuildResult::default();
        let discovered = self.discover()?;

        let mut seen_doc_keys: HashMap<String, ()> = HashMap::new();
        let mut records: Vec<(String, DocumentRecord)> = Vec::new();

        for doc in discovered {
            if self.is_cancelled() {
                break;
            }
            if let Some(limit) = self.options.limit {
                if records.len() >= limit {
                    break;
                }
            }

            match self.extract(&doc, previous_created_at) {
                Ok(Some(record)) => {
                    let doc_key = fingerprint::document_key(&canonical_url(&record.url));
                    if seen_doc_keys.contains_key(&doc_key) {
                        result.errors.push(format!("duplicate document for url {}", record.url));
                        result.documents_skipped += 1;
                        continue;
                    }
                    seen_doc_keys.insert(doc_key.clone(), ());
                    records.push((doc_key, record));
                    result.documents_indexed += 1;
                },
                Ok(None) => {
                    result.documents_skipped += 1;
                },
                Err(e) => {
                    result.errors.push(e.to_string());
                    result.documents_skipped += 1;
                },
            }
        }

        if records.is_empty() {
            return Ok(result);
        }

        let segment_id = self.fingerprint(&records)?;
        if segment_id.is_empty() {
            return Ok(result);
        }

        let tmp_path = store.directory().join(format!("{segment_id}.sqlite3.building"));
        self.write_segment(&tmp_path, &records)?;

        let created_at = Utc::now();
        let published_path = store.save(&segment_id, created_at, &tmp_path)?;

        result.segment_ids.push(segment_id);
        result.segment_paths.push(published_path);
        Ok(result)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed))
    }

    fn fingerprint(&self, records: &[(String, DocumentRecord)]) -> Result<String> {
        let jsons: Vec<String> = records
            .iter()
            .map(|(_, r)| serde_json::to_string(r).map_err(|e| SearchError::storage(e.to_string())))
            .collect::<Result<Vec<_>>>()?;
        let canonical: Vec<CanonicalRecord<'_>> = records
            .iter()
            .zip(jsons.iter())
            .map(|((key, _), json)| CanonicalRecord {
                doc_key: key,
                canonical_json: json,
            })
            .collect();
        fingerprint::fingerprint(&self.schema, &canonical)
    }

    fn write_segment(&self, tmp_path: &Path, records: &[(String, DocumentRecord)]) -> Result<()> {
        let mut postings: HashMap<(String, String), HashMap<String, Vec<u32>>> = HashMap::new();
        let mut field_lengths: HashMap<String, HashMap<String, u32>> = HashMap::new();
        let mut field_totals: HashMap<String, u64> = HashMap::new();
        let mut stored_docs = Vec::with_capacity(records.len());
        let mut distinct_terms: std::collections::HashSet<String> = std::collections::HashSet::new();

        for (doc_key, record) in records {
            for field in self.schema.indexed_fields() {
                let tokens = self.tokenize_field(field, record);
                if tokens.is_empty() {
                    continue;
                }
                field_lengths
                    .entry(field.name.clone())
                    .or_default()
                    .insert(doc_key.clone(), tokens.len() as u32);
                *field_totals.entry(field.name.clone()).or_insert(0) += tokens.len() as u64;

                for token in &tokens {
                    distinct_terms.insert(token.text.clone());
                    postings
                        .entry((field.name.clone(), token.text.clone()))
                        .or_default()
                        .entry(doc_key.clone())
                        .or_default()
                        .push(token.position);
                }
            }

            stored_docs.push(project_stored_fields(doc_key, record));
        }

        let bloom_params = BloomParams::for_expected_items(
            distinct_terms.len().max(1) as u64,
            *knobs::BLOOM_FALSE_POSITIVE_RATE,
            *knobs::BLOOM_BLOCK_BITS,
        );
        let mut bloom = BloomBuilder::new(bloom_params);
        for term in &distinct_terms {
            bloom.insert(term);
        }

        let posting_rows: Vec<PostingRow<'_>> = postings
            .iter()
            .flat_map(|((field, term), by_doc)| {
                by_doc.iter().map(move |(doc_id, positions)| PostingRow {
                    field: field.as_str(),
                    term: term.as_str(),
                    doc_id: doc_id.as_str(),
                    doc_length: field_lengths
                        .get(field)
                        .and_then(|m| m.get(doc_id))
                        .copied()
                        .unwrap_or(positions.len() as u32),
                    positions,
                })
            })
            .collect();

        let write_params = SegmentWriteParams {
            schema: &self.schema,
            bloom_params,
            doc_count: records.len() as u64,
            field_total_terms: &field_totals,
        };

        create_segment(tmp_path, &write_params, &stored_docs, &posting_rows, &bloom.into_blocks())
    }

    fn tokenize_field(&self, field: &crate::schema::Field, record: &DocumentRecord) -> Vec<crate::analyzer::Token> {
        match field.field_type {
            FieldType::Text => {
                let text = match field.name.as_str() {
                    "title" => &record.title,
                    "body" => &record.body,
                    "excerpt" => &record.excerpt,
                    "headings_h1" => return self.tokenize_list_field(&record.headings_h1),
                    "headings_h2" => return self.tokenize_list_field(&record.headings_h2),
                    "headings_h3_plus" => return self.tokenize_list_field(&record.headings_h3_plus),
                    _ => return Vec::new(),
                };
                let profile = field.analyzer_profile.as_deref().unwrap_or("default");
                self.analyzers.get(profile).tokenize(text)
            },
            FieldType::Keyword => {
                let values: Vec<String> = match field.name.as_str() {
                    "url" => vec![record.url.clone()],
                    "url_path" => vec![record.url_path.clone()],
                    "tags" => record.tags.clone(),
                    "language" => vec![record.language.clone()],
                    _ => Vec::new(),
                };
                tokenize_list(&KeywordAnalyzer, &values)
            },
            FieldType::Numeric => {
                if field.name == "timestamp" {
                    vec![crate::analyzer::Token {
                        text: record.timestamp.to_string(),
                        position: 0,
                        start_char: 0,
                        end_char: 0,
                    }]
                } else {
                    Vec::new()
                }
            },
        }
    }

    fn tokenize_list_field(&self, values: &[String]) -> Vec<crate::analyzer::Token> {
        let analyzer = self.analyzers.get("default");
        let mut tokens = Vec::new();
        let mut position = 0u32;
        for value in values {
            for mut token in analyzer.tokenize(value) {
                token.position = position;
                position += 1;
                tokens.push(token);
            }
        }
        tokens
    }

    fn discover(&self) -> Result<Vec<DiscoveredDoc>> {
        match self.source_type {
            SourceType::Online => self.discover_online(),
            SourceType::Filesystem | SourceType::Git => self.discover_filesystem(),
        }
    }

    fn discover_online(&self) -> Result<Vec<DiscoveredDoc>> {
        let metadata_root = self.docs_root.join("__docs_metadata");
        let mut discovered = Vec::new();

        if metadata_root.is_dir() {
            for entry in WalkDir::new(&metadata_root).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if !path.to_string_lossy().ends_with(".meta.json") {
                    continue;
                }
                let metadata_rel = path
                    .strip_prefix(&self.docs_root)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .to_string();

                let metadata = match fs::read_to_string(path) {
                    Ok(contents) => serde_json::from_str::<MetadataSidecar>(&contents).ok(),
                    Err(_) => None,
                };

                let markdown_path = metadata
                    .as_ref()
                    .and_then(|m| m.metadata.as_ref())
                    .and_then(|inner| inner.markdown_rel_path.as_ref())
                    .map(|rel| self.docs_root.join(rel))
                    .unwrap_or_else(|| mirror_markdown_path(&metadata_root, path, &self.docs_root));

                let markdown_rel = markdown_path
                    .strip_prefix(&self.docs_root)
                    .unwrap_or(&markdown_path)
                    .to_string_lossy()
                    .to_string();

                discovered.push(DiscoveredDoc {
                    markdown_path,
                    markdown_rel,
                    metadata_path: Some(path.to_path_buf()),
                    metadata_rel: Some(metadata_rel),
                    metadata,
                });
            }
        }

        Ok(discovered)
    }

    fn discover_filesystem(&self) -> Result<Vec<DiscoveredDoc>> {
        let mut discovered = Vec::new();
        for entry in WalkDir::new(&self.docs_root).into_iter().filter_entry(|e| !is_reserved(e.path())) {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let markdown_rel = path
                .strip_prefix(&self.docs_root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();
            discovered.push(DiscoveredDoc {
                markdown_path: path.to_path_buf(),
                markdown_rel,
                metadata_path: None,
                metadata_rel: None,
                metadata: None,
            });
        }
        Ok(discovered)
    }

    fn extract(&self, doc: &DiscoveredDoc, previous_created_at: Option<DateTime<Utc>>) -> Result<Option<DocumentRecord>> {
        if !self.options.changed_paths.is_empty() {
            let matches_markdown = self.options.changed_paths.contains(&doc.markdown_rel);
            let matches_metadata = doc
                .metadata_rel
                .as_ref()
                .map(|rel| self.options.changed_paths.contains(rel))
                .unwrap_or(false);
            if !matches_markdown && !matches_metadata {
                return Ok(None);
            }
        }

        if !doc.markdown_path.exists() {
            if doc.metadata_path.is_some() {
                return Err(SearchError::document_load(format!(
                    "missing markdown for metadata {}",
                    doc.markdown_path.display()
                )));
            }
            return Ok(None);
        }

        if self.options.changed_only {
            if let Some(previous) = previous_created_at {
                let md_mtime = mtime(&doc.markdown_path);
                let meta_mtime = doc.metadata_path.as_deref().map(mtime).flatten();
                let newest = md_mtime.into_iter().chain(meta_mtime).max();
                if let Some(newest) = newest {
                    if newest <= previous {
                        return Ok(None);
                    }
                }
            }
        }

        let raw = fs::read_to_string(&doc.markdown_path)
            .map_err(|e| SearchError::document_load(format!("unreadable file {}: {e}", doc.markdown_path.display())))?;
        let (front_matter, body_after_fm) = crate::frontmatter::split_front_matter(&raw);

        let url = self.resolve_url(doc, front_matter.as_ref())?;

        if self.source_type == SourceType::Online {
            if !passes_prefix_filters(&url, &self.options.allow_prefixes, &self.options.deny_prefixes) {
                return Ok(None);
            }
        }

        let (h1, h2, h3) = extract_headings(body_after_fm);
        let title = front_matter
            .as_ref()
            .and_then(|fm| fm.title.clone())
            .or_else(|| doc.metadata.as_ref().and_then(|m| m.title.clone()))
            .or_else(|| h1.first().cloned())
            .unwrap_or_else(|| title_case_from_filename(&doc.markdown_path));

        let excerpt = extract_excerpt(body_after_fm);
        let url_path = url_path_of(&url);
        let tags = front_matter.as_ref().map(|fm| fm.tags.clone()).unwrap_or_default();
        let language = front_matter
            .as_ref()
            .and_then(|fm| fm.language.clone())
            .map(|l| l.to_lowercase().chars().take(5).collect())
            .unwrap_or_else(|| detect_language(&url));

        let timestamp = resolve_timestamp(doc, front_matter.as_ref());

        let body = body_after_fm.to_string();

        Ok(Some(DocumentRecord {
            url,
            title,
            body,
            excerpt,
            headings_h1: h1,
            headings_h2: h2,
            headings_h3_plus: h3,
            url_path,
            tags,
            language,
            timestamp,
        }))
    }

    fn resolve_url(&self, doc: &DiscoveredDoc, front_matter: Option<&crate::frontmatter::FrontMatter>) -> Result<String> {
        if let Some(fm_url) = front_matter.and_then(|fm| fm.url.clone()) {
            return Ok(fm_url);
        }
        if let Some(meta_url) = doc.metadata.as_ref().and_then(|m| m.url.clone()) {
            return Ok(meta_url);
        }
        if doc.metadata_path.is_some() {
            return Err(SearchError::SchemaMismatch(format!(
                "metadata sidecar missing url for {}",
                doc.markdown_path.display()
            )));
        }
        Ok(format!("file://{}", doc.markdown_rel))
    }
}

fn is_reserved(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| RESERVED_DIRS.contains(&n))
        .unwrap_or(false)
}

fn mirror_markdown_path(metadata_root: &Path, meta_path: &Path, docs_root: &Path) -> PathBuf {
    let rel = meta_path.strip_prefix(metadata_root).unwrap_or(meta_path);
    let rel_str = rel.to_string_lossy();
    let md_rel = rel_str.strip_suffix(".meta.json").unwrap_or(&rel_str);
    docs_root.join(format!("{md_rel}.md"))
}

fn passes_prefix_filters(url: &str, allow: &[String], deny: &[String]) -> bool {
    if !allow.is_empty() && !allow.iter().any(|p| url.starts_with(p.as_str())) {
        return false;
    }
    if deny.iter().any(|p| url.starts_with(p.as_str())) {
        return false;
    }
    true
}

fn mtime(path: &Path) -> Option<DateTime<Utc>> {
    let metadata = fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

fn canonical_url(url: &str) -> String {
    url.trim_end_matches('/').to_lowercase()
}

fn url_path_of(url: &str) -> String {
    match url.find("://") {
        Some(idx) => {
            let after_scheme = &url[idx + 3..];
            after_scheme.find('/').map(|i| after_scheme[i..].to_string()).unwrap_or_default()
        },
        None => url.to_string(),
    }
}

fn title_case_from_filename(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("untitled");
    stem.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits headings by level, stripping trailing anchor markers like
/// `[¶](#foo)` that documentation generators tend to append.
fn extract_headings(body: &str) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut h1 = Vec::new();
    let mut h2 = Vec::new();
    let mut h3 = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("# ") {
            h1.push(strip_anchor(rest));
        } else if let Some(rest) = trimmed.strip_prefix("## ") {
            h2.push(strip_anchor(rest));
        } else if let Some(rest) = trimmed.strip_prefix("###") {
            h3.push(strip_anchor(rest.trim_start_matches('#').trim()));
        }
    }
    (h1, h2, h3)
}

fn strip_anchor(heading: &str) -> String {
    match heading.find("[¶]") {
        Some(idx) => heading[..idx].trim_end().to_string(),
        None => heading.trim().to_string(),
    }
}

/// First non-empty, non-heading, non-code-fence paragraph, normalized and
/// truncated to 320 chars.
fn extract_excerpt(body: &str) -> String {
    let mut in_code_fence = false;
    let mut paragraph = String::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_code_fence = !in_code_fence;
            continue;
        }
        if in_code_fence {
            continue;
        }
        if trimmed.is_empty() {
            if !paragraph.is_empty() {
                break;
            }
            continue;
        }
        if trimmed.starts_with('#') {
            continue;
        }
        if !paragraph.is_empty() {
            paragraph.push(' ');
        }
        paragraph.push_str(trimmed);
    }
    truncate_chars(&paragraph, 320)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

const LANGUAGE_URL_PATTERNS: &[(&str, &str)] = &[
    ("/ja/", "ja"),
    ("ja.", "ja"),
    ("/zh/", "zh"),
    ("zh.", "zh"),
    ("/ko/", "ko"),
    ("ko.", "ko"),
    ("/fr/", "fr"),
    ("fr.", "fr"),
    ("/de/", "de"),
    ("de.", "de"),
    ("/es/", "es"),
    ("es.", "es"),
    ("/pt/", "pt"),
    ("pt.", "pt"),
    ("/ru/", "ru"),
    ("ru.", "ru"),
];

fn detect_language(url: &str) -> String {
    let lower = url.to_lowercase();
    for (pattern, lang) in LANGUAGE_URL_PATTERNS {
        if lower.contains(pattern) {
            return (*lang).to_string();
        }
    }
    "en".to_string()
}

fn resolve_timestamp(doc: &DiscoveredDoc, front_matter: Option<&crate::frontmatter::FrontMatter>) -> i64 {
    if let Some(ts) = front_matter.and_then(|fm| fm.last_fetched_at.as_deref()).and_then(parse_iso8601) {
        return ts;
    }
    if let Some(meta) = &doc.metadata {
        if let Some(inner) = &meta.metadata {
            if let Some(ts) = inner.last_fetched_at.as_deref().and_then(parse_iso8601) {
                return ts;
            }
            if let Some(ts) = inner.indexed_at.as_deref().and_then(parse_iso8601) {
                return ts;
            }
        }
    }
    mtime(&doc.markdown_path).map(|dt| dt.timestamp()).unwrap_or(0)
}

fn parse_iso8601(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp()).or_else(|| {
        chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive).timestamp())
    })
}

fn project_stored_fields(doc_key: &str, record: &DocumentRecord) -> StoredDocument {
    let mut fields = HashMap::new();
    let candidates: &[(&'static str, String)] = &[
        ("url", record.url.clone()),
        ("title", record.title.clone()),
        ("body", record.body.clone()),
        ("excerpt", record.excerpt.clone()),
        ("language", record.language.clone()),
        ("url_path", record.url_path.clone()),
        ("headings_h1", record.headings_h1.join(" | ")),
        ("headings_h2", record.headings_h2.join(" | ")),
        ("headings_h3_plus", record.headings_h3_plus.join(" | ")),
        ("tags", record.tags.join(",")),
    ];
    for (name, value) in candidates {
        if value.is_empty() {
            continue;
        }
        let is_default_allowlisted = knobs::STORED_FIELD_ALLOWLIST.contains(name);
        let is_supplemental = matches!(*name, "url_path" | "headings_h1" | "headings_h2" | "headings_h3_plus" | "tags");
        if !is_default_allowlisted && !is_supplemental {
            continue;
        }
        let projected = match knobs::stored_field_char_limit(name) {
            Some(limit) => truncate_chars(value, limit),
            None => value.clone(),
        };
        fields.insert(*name, projected);
    }
    StoredDocument {
        doc_id: doc_key.to_string(),
        fields,
        timestamp: Some(record.timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn builds_a_segment_from_filesystem_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let docs_root = dir.path().join("docs");
        write_file(
            &docs_root.join("install.md"),
            "---\nurl: https://ex.com/install\n---\n# Installation\n\nInstall with pip install pkg\n",
        );

        let store = SegmentStore::open(dir.path()).unwrap();
        let builder = SegmentBuilder::new(&docs_root, Schema::documentation(), SourceType::Filesystem);
        let result = builder.build(&store, None).unwrap();

        assert_eq!(result.documents_indexed, 1);
        assert_eq!(result.segment_ids.len(), 1);
        assert!(store.latest_segment_id().unwrap().is_some());
    }

    #[test]
    fn empty_corpus_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let docs_root = dir.path().join("docs");
        fs::create_dir_all(&docs_root).unwrap();

        let store = SegmentStore::open(dir.path()).unwrap();
        let builder = SegmentBuilder::new(&docs_root, Schema::documentation(), SourceType::Filesystem);
        let result = builder.build(&store, None).unwrap();

        assert_eq!(result.documents_indexed, 0);
        assert!(result.segment_ids.is_empty());
        assert!(store.latest_segment_id().unwrap().is_none());
    }

    #[test]
    fn rebuild_over_identical_corpus_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let docs_root = dir.path().join("docs");
        write_file(&docs_root.join("a.md"), "# Title\n\nSome body text.\n");

        let store = SegmentStore::open(dir.path()).unwrap();
        let builder = SegmentBuilder::new(&docs_root, Schema::documentation(), SourceType::Filesystem);
        let first = builder.build(&store, None).unwrap();
        let second = builder.build(&store, None).unwrap();

        assert_eq!(first.segment_ids, second.segment_ids);
        assert_eq!(store.list_segments().unwrap().len(), 1);
    }

    #[test]
    fn front_matter_absence_falls_back_to_heading_title() {
        let dir = tempfile::tempdir().unwrap();
        let docs_root = dir.path().join("docs");
        write_file(&docs_root.join("no-front-matter.md"), "# My Heading\n\nBody text here.\n");

        let store = SegmentStore::open(dir.path()).unwrap();
        let builder = SegmentBuilder::new(&docs_root, Schema::documentation(), SourceType::Filesystem);
        let result = builder.build(&store, None).unwrap();
        assert_eq!(result.documents_indexed, 1);

        let segment_id = store.latest_segment_id().unwrap().unwrap();
        let reader = store.load(&segment_id).unwrap().unwrap();
        let doc_key = fingerprint::document_key(&canonical_url("file://no-front-matter.md"));
        let doc = reader.document(&doc_key).unwrap().unwrap();
        assert_eq!(doc.get("title").unwrap(), "My Heading");
    }
}
