//! Compiled query pattern tables.
//!
//! Every regex the query pipeline needs lives in [`QueryPatterns`]. The
//! tables are compiled once and passed around by reference; nothing on the
//! query path compiles a pattern.

use regex::Regex;
use std::sync::{Arc, OnceLock};

use crate::error::Result;

/// Entity-discovery phrasings ("which methods appear in ...").
const ENTITY_PATTERNS: &[&str] = &[
    r"(?i)\b(?:which|what)\s+(?:key\s+|main\s+|common\s+)?(?:concepts?|methods?|methodologies|techniques?|algorithms?|models?|datasets?|entities|topics|approaches)\s+(?:appear|occur|show\s+up|are\s+(?:used|mentioned|discussed|introduced|proposed))",
    r"(?i)\b(?:list|find|show|extract)\s+(?:all\s+|the\s+)?(?:concepts|methods|entities|techniques)\s+(?:in|from|mentioned)\b",
];

/// Relationship, collaboration, and citation phrasings.
const RELATIONSHIP_PATTERNS: &[&str] = &[
    r"(?i)\b(?:relat(?:ed|ion|ions|ionship|ionships)|connect(?:ed|ion|ions)|link(?:ed|s)?\s+(?:to|between|with))\b",
    r"(?i)\b(?:collaborat\w*|co-?author\w*|worked\s+with)\b",
    r"(?i)\b(?:cit(?:e|es|ed|ing|ation|ations)|references?\s+to|influenc(?:e|ed|es|ing))\b",
];

/// Author-name, venue, and publication-date phrasings.
const METADATA_PATTERNS: &[&str] = &[
    r"\b(?:[Bb]y|[Ww]ritten\s+by|[Aa]uthored\s+by)\s+[A-Z][a-zA-Z'\-]+",
    r"(?i)\bpublished\s+(?:in|during|after|before|since)\s+\S",
    r"(?i)\b(?:from|since|after|before)\s+(?:19|20)\d{2}\b",
    r"(?i)\b(?:authors?|authored|journal|venue|proceedings)\b",
];

/// Compiled pattern tables shared by the classifier, expander, decomposer,
/// metadata adapter, and refiner.
#[derive(Debug)]
pub struct QueryPatterns {
    pub(crate) entity: Vec<Regex>,
    pub(crate) relationship: Vec<Regex>,
    pub(crate) metadata: Vec<Regex>,
    pub(crate) explicit_and: Regex,
    pub(crate) explicit_or: Regex,
    pub(crate) natural_conjunction: Regex,
    pub(crate) preposition: Regex,
    pub(crate) capitalized_phrase: Regex,
    pub(crate) boolean_operator: Regex,
    pub(crate) author: Regex,
    pub(crate) year: Regex,
    pub(crate) venue: Regex,
    pub(crate) concept_phrase: Regex,
    pub(crate) hyphenated_term: Regex,
    pub(crate) qualifier: Regex,
}

static SHARED: OnceLock<Arc<QueryPatterns>> = OnceLock::new();

impl QueryPatterns {
    /// Compile every table.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Pattern`](crate::SearchError::Pattern) if a
    /// pattern fails to compile.
    pub fn compile() -> Result<Self> {
        Ok(Self {
            entity: compile_all(ENTITY_PATTERNS)?,
            relationship: compile_all(RELATIONSHIP_PATTERNS)?,
            metadata: compile_all(METADATA_PATTERNS)?,
            explicit_and: Regex::new(r"\s+AND\s+")?,
            explicit_or: Regex::new(r"\s+OR\s+")?,
            natural_conjunction: Regex::new(r"\s+(?:and|with|plus)\s+")?,
            preposition: Regex::new(
                r"^(.+?)\s+(?:in|about|for|on|regarding|within|using)\s+(.+)$",
            )?,
            capitalized_phrase: Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b")?,
            boolean_operator: Regex::new(r"\b(?:AND|OR|NOT)\b")?,
            author: Regex::new(
                r"\b(?:[Bb]y|[Ww]ritten\s+by|[Aa]uthored\s+by)\s+([A-Z][a-zA-Z'\-]+(?:\s+[A-Z][a-zA-Z'\-]+)*)",
            )?,
            year: Regex::new(r"\b((?:19|20)\d{2})\b")?,
            venue: Regex::new(
                r"\b[Pp]ublished\s+in\s+(?:the\s+)?([A-Z][\w&\-]*(?:\s+[A-Z][\w&\-]*)*)",
            )?,
            concept_phrase: Regex::new(r"\b[A-Z][a-zA-Z0-9]+(?:\s+[A-Z][a-zA-Z0-9]+)*\b")?,
            hyphenated_term: Regex::new(r"\b[A-Za-z][A-Za-z0-9]*(?:-[A-Za-z0-9]+)+\b")?,
            qualifier: Regex::new(
                r"(?i)\b(?:specific|specifically|exact|exactly|particular|precise|precisely|detailed)\b",
            )?,
        })
    }

    /// Process-wide tables, compiled on first successful access.
    pub fn shared() -> Result<Arc<Self>> {
        if let Some(patterns) = SHARED.get() {
            return Ok(Arc::clone(patterns));
        }
        let compiled = Arc::new(Self::compile()?);
        Ok(Arc::clone(SHARED.get_or_init(|| compiled)))
    }

    /// Whether the query contains `AND`/`OR`/`NOT` operators or quotes.
    pub fn has_boolean_syntax(&self, query: &str) -> bool {
        query.contains('"') || self.boolean_operator.is_match(query)
    }
}

fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(Into::into))
        .collect()
}

/// Whether any regex in `table` matches `text`.
pub(crate) fn any_match(table: &[Regex], text: &str) -> bool {
    table.iter().any(|re| re.is_match(text))
}
