//! Controlled vocabulary of medical synonyms.
//!
//! The vocabulary maps every lower-cased member of an equivalence group to the whole
//! group. It is built offline from a MeSH descriptor dump and loaded once at startup.

use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::Path,
};

use indexmap::IndexMap;
use quick_xml::{events::Event, Reader};
use tracing::{info, instrument};

use crate::error::{Error, Result};

/// Upper bound on members kept per equivalence group.
pub const MAX_SYNONYMS_PER_GROUP: usize = 20;

/// Read-only synonym table keyed by lower-cased term.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    groups: IndexMap<String, Vec<String>>,
}

impl Vocabulary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from `(term, group)` pairs; keys are lower-cased and groups deduplicated.
    pub fn from_groups<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut groups = IndexMap::new();
        for (key, members) in entries {
            let key = key.as_ref().trim().to_lowercase();
            let members = dedupe(members.into_iter().map(Into::into));
            if key.is_empty() || members.is_empty() {
                continue;
            }
            groups.insert(key, members);
        }
        Self { groups }
    }

    /// Load the persisted JSON artefact (`{"term": ["Synonym", ...]}`).
    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| Error::io(path, err))?;
        let raw: IndexMap<String, Vec<String>> = serde_json::from_reader(BufReader::new(file))?;
        let vocabulary = Self::from_groups(raw);
        info!(mappings = vocabulary.len(), path = %path.display(), "loaded synonym vocabulary");
        Ok(vocabulary)
    }

    /// Exact lookup of a term, case-insensitively.
    pub fn lookup(&self, term: &str) -> Option<&[String]> {
        self.groups
            .get(term.trim().to_lowercase().as_str())
            .map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn group(&self, key: &str) -> Option<&[String]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
        }
        let mut file = File::create(path).map_err(|err| Error::io(path, err))?;
        serde_json::to_writer(&mut file, &self.groups)?;
        file.flush().map_err(|err| Error::io(path, err))?;
        Ok(())
    }
}

/// Order-preserving de-duplication of non-blank members.
pub fn dedupe<I: IntoIterator<Item = String>>(values: I) -> Vec<String> {
    let mut seen = IndexMap::<String, ()>::new();
    for value in values {
        let value = value.trim().to_string();
        if !value.is_empty() {
            seen.entry(value).or_insert(());
        }
    }
    seen.into_keys().collect()
}

/// Stream a MeSH descriptor XML document into a vocabulary.
///
/// Every non-permuted `Term/String` of a `DescriptorRecord` joins that record's group;
/// each member then maps to the full (capped) group.
pub fn build_from_mesh<R: BufRead>(source: R) -> Result<Vocabulary> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut buf = Vec::new();
    let mut record_terms: Vec<String> = Vec::new();
    let mut in_record = false;
    let mut in_term = false;
    let mut term_permuted = false;
    let mut in_term_string = false;
    let mut descriptors = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(element) => match element.name().as_ref() {
                b"DescriptorRecord" => {
                    in_record = true;
                    record_terms.clear();
                }
                b"Term" if in_record => {
                    in_term = true;
                    term_permuted = element
                        .try_get_attribute("IsPermutedTermYN")
                        .map_err(quick_xml::Error::from)?
                        .map(|attr| *attr.value == *b"Y")
                        .unwrap_or(false);
                }
                b"String" if in_term => in_term_string = true,
                _ => {}
            },
            Event::Text(text) if in_term_string && !term_permuted => {
                let value = text.unescape()?.into_owned();
                record_terms.push(value);
            }
            Event::End(element) => match element.name().as_ref() {
                b"String" => in_term_string = false,
                b"Term" => {
                    in_term = false;
                    term_permuted = false;
                }
                b"DescriptorRecord" => {
                    in_record = false;
                    descriptors += 1;
                    let mut members = dedupe(record_terms.drain(..));
                    members.truncate(MAX_SYNONYMS_PER_GROUP);
                    for member in &members {
                        groups.insert(member.to_lowercase(), members.clone());
                    }
                    if descriptors % 10_000 == 0 {
                        info!(descriptors, "processed MeSH descriptors");
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    info!(descriptors, mappings = groups.len(), "parsed MeSH descriptors");
    Ok(Vocabulary { groups })
}
