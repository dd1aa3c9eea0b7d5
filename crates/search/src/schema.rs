//! Typed field schema shared by the indexer and the query engine.
//!
//! Schema JSON contributes to a segment's fingerprint, so field ordering and
//! key names here must stay stable: [`Schema::to_canonical_json`] is part of
//! the content-addressing contract in [`crate::fingerprint`].

use serde::{Deserialize, Serialize};

use crate::error::{SearchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Keyword,
    Numeric,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub stored: bool,
    pub indexed: bool,
    pub boost: f32,
    /// Only meaningful for `FieldType::Text`; names a profile registered in
    /// [`crate::analyzer::AnalyzerRegistry`].
    pub analyzer_profile: Option<String>,
}

impl Field {
    pub fn text(name: impl Into<String>, boost: f32, analyzer_profile: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            field_type: FieldType::Text,
            stored: true,
            indexed: true,
            boost,
            analyzer_profile: Some(analyzer_profile.into()),
        }
    }

    pub fn keyword(name: impl Into<String>, boost: f32) -> Self {
        Field {
            name: name.into(),
            field_type: FieldType::Keyword,
            stored: true,
            indexed: true,
            boost,
            analyzer_profile: None,
        }
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            field_type: FieldType::Numeric,
            stored: true,
            indexed: true,
            boost: 0.0,
            analyzer_profile: None,
        }
    }
}

/// Ordered field list plus the name of the field that uniquely identifies a
/// document within a segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
    pub unique_field: String,
}

impl Schema {
    /// The schema used by the documentation search index: `title` and `body`
    /// text fields (title boosted above body, matching spec scenario 4),
    /// heading fields for secondary recall, and keyword fields for facets.
    pub fn documentation() -> Self {
        Schema {
            fields: vec![
                Field::text("title", 3.0, "default"),
                Field::text("body", 1.0, "default"),
                Field::text("excerpt", 1.5, "default"),
                Field::text("headings_h1", 2.5, "default"),
                Field::text("headings_h2", 2.0, "default"),
                Field::text("headings_h3_plus", 1.5, "default"),
                Field::keyword("url", 0.0),
                Field::keyword("url_path", 0.0),
                Field::keyword("tags", 1.0),
                Field::keyword("language", 0.0),
                Field::numeric("timestamp"),
            ],
            unique_field: "url".to_string(),
        }
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn get_boost(&self, field_name: &str) -> f32 {
        self.get_field(field_name).map(|f| f.boost).unwrap_or(0.0)
    }

    pub fn indexed_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.indexed)
    }

    pub fn text_fields_with_positive_boost(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(|f| f.indexed && f.field_type == FieldType::Text && f.boost > 0.0)
    }

    /// Canonical JSON: `serde_json` with `preserve_order` keeps struct field
    /// order stable across processes, which is what fingerprinting needs.
    pub fn to_canonical_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| SearchError::storage(format!("failed to serialize schema: {e}")))
    }

    pub fn from_canonical_json(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| SearchError::index_version(format!("unparseable schema: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documentation_schema_boosts_title_over_body() {
        let schema = Schema::documentation();
        assert!(schema.get_boost("title") > schema.get_boost("body"));
    }

    #[test]
    fn canonical_json_round_trips() {
        let schema = Schema::documentation();
        let json = schema.to_canonical_json().unwrap();
        let back = Schema::from_canonical_json(&json).unwrap();
        assert_eq!(back.fields.len(), schema.fields.len());
        assert_eq!(back.unique_field, schema.unique_field);
    }

    #[test]
    fn canonical_json_is_deterministic() {
        let schema = Schema::documentation();
        let a = schema.to_canonical_json().unwrap();
        let b = schema.to_canonical_json().unwrap();
        assert_eq!(a, b);
    }
}
