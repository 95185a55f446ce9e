use serde::{Deserialize, Serialize};

/// One clause or constraint extracted from a contract.
///
/// Terms carry no id: identity is their position in the owning [`TermSet`].
/// Several terms may share a `section` when one clause holds more than one
/// constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub section: String,
    pub name: String,
    pub description: String,
}

/// The complete ordered collection of terms extracted from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSet {
    pub terms: Vec<Term>,
}

impl TermSet {
    pub fn new(terms: Vec<Term>) -> Self {
        Self { terms }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// A cached extraction: the source paragraphs plus the terms found in them.
///
/// The JSON shape (`{"paragraphs": [...], "terms": [...]}`) is the download
/// format served to users, so `terms` is a bare array rather than a `TermSet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionEntry {
    pub paragraphs: Vec<String>,
    pub terms: Vec<Term>,
}

impl ExtractionEntry {
    pub fn new(paragraphs: Vec<String>, terms: TermSet) -> Self {
        Self {
            paragraphs,
            terms: terms.terms,
        }
    }

    pub fn term_set(&self) -> TermSet {
        TermSet::new(self.terms.clone())
    }
}
