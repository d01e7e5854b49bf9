//! Vague-query expansion with domain terms.
//!
//! Short queries that name a known research concept get up to
//! `max_terms_per_concept` related terms appended. Original tokens are
//! never removed or reordered.

use crate::config::ExpansionConfig;
use crate::patterns::QueryPatterns;
use crate::types::{Confidence, QualityMetrics, QueryExpansion};

/// Domain concept → related terms, most useful first.
const DOMAIN_TERMS: &[(&str, &[&str])] = &[
    ("ml", &["machine learning", "statistical learning"]),
    ("machine learning", &["deep learning", "statistical learning"]),
    ("deep learning", &["neural networks", "representation learning"]),
    ("nlp", &["natural language processing", "language models"]),
    ("llm", &["large language models", "language models"]),
    ("llms", &["large language models", "language models"]),
    ("cv", &["computer vision", "image recognition"]),
    ("computer vision", &["image recognition", "visual recognition"]),
    ("rl", &["reinforcement learning", "policy optimization"]),
    ("reinforcement learning", &["policy optimization", "reward modeling"]),
    ("gnn", &["graph neural networks", "message passing"]),
    ("transformer", &["attention mechanism", "self-attention"]),
    ("transformers", &["attention mechanism", "self-attention"]),
    ("attention", &["self-attention", "transformer"]),
    ("healthcare", &["clinical", "medical"]),
    ("diffusion", &["denoising", "score-based models"]),
    ("gan", &["generative adversarial networks", "generative models"]),
    ("embeddings", &["vector representations", "representation learning"]),
    ("retrieval", &["information retrieval", "search"]),
    ("summarization", &["text summarization", "abstractive summarization"]),
    ("robustness", &["adversarial examples", "distribution shift"]),
    ("fairness", &["algorithmic bias", "algorithmic fairness"]),
];

fn normalize_token(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
        .to_lowercase()
}

/// Lowercased tokens with surrounding punctuation stripped.
fn normalized_tokens(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(normalize_token)
        .filter(|w| !w.is_empty())
        .collect()
}

/// Position of the first token window equal to `concept`, if any.
fn concept_position(tokens: &[String], concept: &str) -> Option<usize> {
    let words: Vec<&str> = concept.split(' ').collect();
    if words.len() > tokens.len() {
        return None;
    }
    tokens
        .windows(words.len())
        .position(|window| window.iter().zip(&words).all(|(t, w)| t == w))
}

/// Word span `(start, len)` of `concept` among the whitespace-separated
/// words of `query`.
pub(crate) fn concept_span(query: &str, concept: &str) -> Option<(usize, usize)> {
    let tokens: Vec<String> = query.split_whitespace().map(normalize_token).collect();
    concept_position(&tokens, concept).map(|start| (start, concept.split(' ').count()))
}

/// Concepts from the domain table found in `query`, in query order.
pub fn matched_concepts(query: &str) -> Vec<&'static str> {
    let tokens = normalized_tokens(query);
    let mut found: Vec<(usize, &'static str)> = DOMAIN_TERMS
        .iter()
        .filter_map(|(concept, _)| concept_position(&tokens, concept).map(|pos| (pos, *concept)))
        .collect();
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, concept)| concept).collect()
}

/// Related terms for a concept from the domain table.
pub(crate) fn related_terms(concept: &str) -> &'static [&'static str] {
    DOMAIN_TERMS
        .iter()
        .find(|(c, _)| *c == concept)
        .map(|(_, terms)| *terms)
        .unwrap_or(&[])
}

/// Whether a prior result set was poor enough to justify expansion.
fn prior_was_poor(prior: Option<&QualityMetrics>, config: &ExpansionConfig) -> bool {
    prior.is_some_and(|q| {
        q.confidence == Confidence::Low || q.coverage < config.low_coverage_threshold
    })
}

fn unexpanded(query: &str) -> QueryExpansion {
    QueryExpansion {
        expanded_query: query.to_string(),
        added_terms: Vec::new(),
        was_expanded: false,
    }
}

/// Expand a short, vague query with related domain terms.
///
/// Expansion is attempted only when the query has at most
/// `config.max_words` words, carries no boolean operators or quotes, and
/// either names a known concept or follows a poor prior result set.
///
/// `prior` is the quality of an earlier result set for the same query.
/// [`Orchestrator::search`](crate::Orchestrator::search) expands before
/// any backend has run and passes `None`; callers that retry a query after
/// a poor result set pass its metrics.
pub fn expand(
    query: &str,
    prior: Option<&QualityMetrics>,
    patterns: &QueryPatterns,
    config: &ExpansionConfig,
) -> QueryExpansion {
    let word_count = query.split_whitespace().count();
    if word_count == 0 || word_count > config.max_words || patterns.has_boolean_syntax(query) {
        return unexpanded(query);
    }

    let concepts = matched_concepts(query);
    if concepts.is_empty() && !prior_was_poor(prior, config) {
        return unexpanded(query);
    }

    let lowered = query.to_lowercase();
    let mut added: Vec<String> = Vec::new();
    for concept in concepts {
        let fresh = related_terms(concept)
            .iter()
            .filter(|term| !lowered.contains(**term) && !added.iter().any(|a| a.as_str() == **term))
            .take(config.max_terms_per_concept)
            .map(|term| term.to_string())
            .collect::<Vec<_>>();
        added.extend(fresh);
    }

    if added.is_empty() {
        return unexpanded(query);
    }

    tracing::trace!(query, added = ?added, "query expanded");
    QueryExpansion {
        expanded_query: format!("{} {}", query.trim_end(), added.join(" ")),
        added_terms: added,
        was_expanded: true,
    }
}
