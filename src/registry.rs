//! The annotation registry: one JSON object mapping PDF file name to the
//! human-filled [`AnnotationRecord`].
//!
//! The registry is the hand-off point between the two stages. The scaffolder
//! writes blank records, a person fills in `type` and the two markers, and
//! the analysis batch reads it back. Because people edit the file by hand:
//!
//! - records keep any extra keys they were given, verbatim;
//! - `null` is accepted wherever a string is expected;
//! - writes go through a temp file and a rename, so an interrupted run never
//!   leaves a half-written registry behind.

use crate::error::{AnalyzerError, PaperError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// The two paper types that select a prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperType {
    Theoretical,
    Empirical,
}

impl PaperType {
    pub const ALL: [PaperType; 2] = [PaperType::Theoretical, PaperType::Empirical];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaperType::Theoretical => "theoretical",
            PaperType::Empirical => "empirical",
        }
    }

    /// Capitalised form used in output headers.
    pub fn label(&self) -> &'static str {
        match self {
            PaperType::Theoretical => "Theoretical",
            PaperType::Empirical => "Empirical",
        }
    }
}

impl fmt::Display for PaperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaperType {
    type Err = String;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "theoretical" => Ok(PaperType::Theoretical),
            "empirical" => Ok(PaperType::Empirical),
            "" => Err("paper type not specified".to_string()),
            other => Err(format!(
                "invalid paper type '{other}', expected 'theoretical' or 'empirical'"
            )),
        }
    }
}

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnnotationRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,

    /// Raw `type` value as typed by the annotator; see [`Self::parsed_type`].
    #[serde(rename = "type", default, deserialize_with = "null_as_empty")]
    pub paper_type: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub start_of_intro: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub end_of_intro: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub notes: String,

    /// Keys the tool does not know about, preserved on rewrite.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// An annotated record that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyRecord<'a> {
    pub paper_type: PaperType,
    pub start_marker: &'a str,
    pub end_marker: &'a str,
}

impl AnnotationRecord {
    /// A fresh record with every annotation field blank.
    pub fn blank(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Parse `type`.
    pub fn parsed_type(&self) -> Result<PaperType, PaperError> {
        self.paper_type
            .parse()
            .map_err(|detail| PaperError::InvalidAnnotation { detail })
    }

    /// Check the record is ready for extraction: a valid type and both
    /// markers non-blank.
    pub fn ready(&self) -> Result<ReadyRecord<'_>, PaperError> {
        let paper_type = self.parsed_type()?;
        let blank = |field: &str| PaperError::InvalidAnnotation {
            detail: format!("{field} not filled"),
        };
        if self.start_of_intro.trim().is_empty() {
            return Err(blank("start_of_intro"));
        }
        if self.end_of_intro.trim().is_empty() {
            return Err(blank("end_of_intro"));
        }
        Ok(ReadyRecord {
            paper_type,
            start_marker: &self.start_of_intro,
            end_marker: &self.end_of_intro,
        })
    }
}

/// One registry entry as held in memory.
#[derive(Debug, Clone, PartialEq)]
enum Entry {
    /// Present in the file when it was read. Kept as JSON so a malformed
    /// record only affects its own paper.
    Stored(Value),
    /// Created since the file was read; written on the next save.
    Added(AnnotationRecord),
}

/// File name → record, iterated in sorted key order.
///
/// Saving never re-serialises records that were already in the file: new
/// records are spliced in before the closing brace of the text as it was
/// read, so hand-made formatting, key order and escapes survive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Registry {
    entries: BTreeMap<String, Entry>,
    /// File text as read, or `None` for a registry that was never saved.
    source: Option<String>,
}

impl Registry {
    /// Parse registry text. Only the top level must be a JSON object; each
    /// record is checked when it is used.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: BTreeMap<String, Value> = serde_json::from_str(raw)?;
        Ok(Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k, Entry::Stored(v)))
                .collect(),
            source: Some(raw.to_string()),
        })
    }

    /// Read a registry that must exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AnalyzerError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AnalyzerError::RegistryNotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|e| AnalyzerError::io(path, e))?;
        let registry = Self::from_json(&raw).map_err(|e| AnalyzerError::MalformedRegistry {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        debug!(
            "Loaded {} annotation record(s) from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Read the registry at `path`, or start an empty one if it is absent.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, AnalyzerError> {
        match Self::load(path) {
            Err(AnalyzerError::RegistryNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// The registry text with every added record appended.
    pub fn to_json(&self) -> Result<String, AnalyzerError> {
        let base = self.source.as_deref().unwrap_or("{}\n");
        let close = base.rfind('}').ok_or_else(|| {
            AnalyzerError::Internal("registry text has no closing brace".into())
        })?;
        let added: Vec<(&String, &AnnotationRecord)> = self
            .entries
            .iter()
            .filter_map(|(k, e)| match e {
                Entry::Added(r) => Some((k, r)),
                Entry::Stored(_) => None,
            })
            .collect();
        if added.is_empty() && self.source.is_some() {
            return Ok(base.to_string());
        }

        let ser = |e: serde_json::Error| AnalyzerError::Internal(format!("registry serialisation: {e}"));
        let mut out = base[..close].trim_end().to_string();
        let mut need_comma = self
            .entries
            .values()
            .any(|e| matches!(e, Entry::Stored(_)));
        for (key, record) in added {
            if need_comma {
                out.push(',');
            }
            need_comma = true;
            out.push_str("\n  ");
            out.push_str(&serde_json::to_string(key).map_err(ser)?);
            out.push_str(": ");
            out.push_str(&serde_json::to_string_pretty(record).map_err(ser)?.replace('\n', "\n  "));
        }
        out.push('\n');
        out.push_str(&base[close..]);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }

    /// Write through a temp file in the same directory, then treat the
    /// written text as the new source.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), AnalyzerError> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| AnalyzerError::io(dir, e))?;

        let json = self.to_json()?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| AnalyzerError::io(dir, e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| AnalyzerError::io(tmp.path(), e))?;
        tmp.persist(path)
            .map_err(|e| AnalyzerError::io(path, e.error))?;
        debug!("Wrote {} record(s) to {}", self.len(), path.display());

        *self = Self::from_json(&json)
            .map_err(|e| AnalyzerError::Internal(format!("registry re-read: {e}")))?;
        Ok(())
    }

    /// Insert `record` under `key` unless the key exists. Returns whether it
    /// was inserted.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, record: AnnotationRecord) -> bool {
        match self.entries.entry(key.into()) {
            std::collections::btree_map::Entry::Vacant(v) => {
                v.insert(Entry::Added(record));
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// The record under `key`, or `InvalidAnnotation` when its JSON does not
    /// fit the record layout.
    pub fn get(&self, key: &str) -> Option<Result<AnnotationRecord, PaperError>> {
        self.entries.get(key).map(Entry::record)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Entries in sorted key order, each checked on its own.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Result<AnnotationRecord, PaperError>)> + '_ {
        self.entries.iter().map(|(k, e)| (k.as_str(), e.record()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Entry {
    fn record(&self) -> Result<AnnotationRecord, PaperError> {
        match self {
            Entry::Stored(value) => {
                AnnotationRecord::deserialize(value).map_err(|e| PaperError::InvalidAnnotation {
                    detail: format!("malformed record: {e}"),
                })
            }
            Entry::Added(record) => Ok(record.clone()),
        }
    }
}
