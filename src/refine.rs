//! Iterative query refinement.
//!
//! Runs a query, mines the top results for key concepts, and retries with
//! up to a few reformulated queries when the first result set is thin.
//! Newly found items are merged in; an item keeps the first copy seen.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::RefinerConfig;
use crate::error::Result;
use crate::orchestrator::quality::assess;
use crate::patterns::QueryPatterns;
use crate::query::expand::{concept_span, matched_concepts, related_terms};
use crate::types::{Confidence, QualityMetrics, SearchResult};

/// Words never treated as concepts on their own.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "in",
    "into", "is", "it", "its", "of", "on", "or", "our", "that", "the", "their", "these", "this",
    "those", "to", "was", "we", "were", "which", "while", "with", "using", "via", "new", "based",
    "paper", "study", "results", "approach", "method", "methods", "show", "propose", "present",
];

/// Method and domain keywords looked for in top results.
const METHODOLOGY_KEYWORDS: &[&str] = &[
    "transformer",
    "convolutional",
    "recurrent",
    "graph neural network",
    "reinforcement learning",
    "contrastive learning",
    "self-supervised",
    "diffusion",
    "variational",
    "bayesian",
    "fine-tuning",
    "meta-analysis",
    "randomized controlled trial",
    "benchmark",
    "survey",
];

/// Anything that can answer a query with a ranked result list.
#[async_trait]
pub trait Searcher: Send + Sync {
    /// Return at most `limit` results for `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error when no result could be produced at all.
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;
}

/// Quality of one executed reformulation.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub query: String,
    pub quality: QualityMetrics,
    /// Items this iteration added to the accumulated set.
    pub new_results: usize,
}

/// Output of [`IterativeRefiner::refine`].
#[derive(Debug, Clone)]
pub struct RefinementOutcome {
    /// Query as submitted.
    pub query: String,
    /// Query actually used after qualifier stripping, if it was broadened.
    pub broadened_query: Option<String>,
    /// Accumulated results, sorted by native score, at most `limit`.
    pub results: Vec<SearchResult>,
    pub initial_quality: QualityMetrics,
    pub concepts: Vec<String>,
    pub reformulations: Vec<String>,
    /// Reformulations executed.
    pub iterations: usize,
    pub iteration_quality: Vec<IterationRecord>,
}

/// Concept-driven query refinement loop.
#[derive(Debug, Clone)]
pub struct IterativeRefiner {
    config: RefinerConfig,
    patterns: Arc<QueryPatterns>,
}

impl IterativeRefiner {
    pub fn new(config: RefinerConfig, patterns: Arc<QueryPatterns>) -> Self {
        Self { config, patterns }
    }

    /// Refine `query` against `searcher`.
    ///
    /// # Errors
    ///
    /// Propagates the error of the initial search. Failed reformulations
    /// are logged and skipped.
    pub async fn refine<S>(&self, searcher: &S, query: &str, limit: usize) -> Result<RefinementOutcome>
    where
        S: Searcher + ?Sized,
    {
        let mut current_query = query.trim().to_string();
        let mut broadened_query = None;
        let mut initial = searcher.retrieve(&current_query, limit).await?;

        if initial.is_empty() {
            let stripped = self.strip_qualifiers(&current_query);
            if !stripped.is_empty() && stripped != current_query {
                tracing::debug!(broadened = %stripped, "no results, retrying without qualifiers");
                initial = searcher.retrieve(&stripped, limit).await?;
                current_query = stripped.clone();
                broadened_query = Some(stripped);
            }
        }

        let initial_quality = assess(&initial);
        let mut outcome = RefinementOutcome {
            query: query.to_string(),
            broadened_query,
            results: Vec::new(),
            initial_quality: initial_quality.clone(),
            concepts: Vec::new(),
            reformulations: Vec::new(),
            iterations: 0,
            iteration_quality: Vec::new(),
        };
        if initial.is_empty() {
            return Ok(outcome);
        }

        let mut seen: HashSet<String> = initial.iter().map(|r| r.item_key.clone()).collect();
        let mut accumulated = initial;
        outcome.concepts = self.extract_concepts(&accumulated);

        if self.needs_refinement(&initial_quality, limit) {
            outcome.reformulations =
                self.reformulate(&current_query, &outcome.concepts, &accumulated);

            for reformulation in outcome
                .reformulations
                .iter()
                .take(self.config.max_iterations)
            {
                outcome.iterations += 1;
                let results = match searcher.retrieve(reformulation, limit).await {
                    Ok(results) => results,
                    Err(err) => {
                        tracing::warn!(query = %reformulation, error = %err, "reformulated search failed");
                        Vec::new()
                    }
                };
                let quality = assess(&results);

                let before = accumulated.len();
                for result in results {
                    if seen.insert(result.item_key.clone()) {
                        accumulated.push(result);
                    }
                }
                let new_results = accumulated.len() - before;
                tracing::debug!(iteration = outcome.iterations, new_results, "refinement iteration");

                let good_enough = quality.confidence == Confidence::High
                    && quality.coverage >= self.config.stop_coverage;
                outcome.iteration_quality.push(IterationRecord {
                    query: reformulation.clone(),
                    quality,
                    new_results,
                });
                if good_enough {
                    break;
                }
            }
        }

        sort_by_native_score(&mut accumulated);
        accumulated.truncate(limit);
        for (position, result) in accumulated.iter_mut().enumerate() {
            result.rank = position + 1;
        }
        outcome.results = accumulated;
        Ok(outcome)
    }

    fn needs_refinement(&self, quality: &QualityMetrics, limit: usize) -> bool {
        quality.confidence != Confidence::High
            || quality.coverage < self.config.min_coverage
            || quality.result_count < limit
    }

    /// Remove qualifier words such as "specific" or "exactly".
    pub fn strip_qualifiers(&self, query: &str) -> String {
        let stripped = self.patterns.qualifier.replace_all(query, " ");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Frequent capitalized phrases, hyphenated terms, and tags from the top
    /// results, most frequent first, ties alphabetical.
    pub fn extract_concepts(&self, results: &[SearchResult]) -> Vec<String> {
        let mut counts: HashMap<String, (String, usize)> = HashMap::new();
        let mut bump = |candidate: &str| {
            let Some(candidate) = clean_candidate(candidate) else {
                return;
            };
            counts
                .entry(candidate.to_lowercase())
                .or_insert_with(|| (candidate, 0))
                .1 += 1;
        };

        for result in results.iter().take(self.config.concept_source_results) {
            for text in [result.title(), result.abstract_text()].into_iter().flatten() {
                for m in self.patterns.concept_phrase.find_iter(text) {
                    bump(m.as_str());
                }
                for m in self.patterns.hyphenated_term.find_iter(text) {
                    bump(m.as_str());
                }
            }
            for tag in result.tags() {
                bump(tag);
            }
        }

        let mut concepts: Vec<(String, usize)> = counts
            .into_values()
            .filter(|(_, count)| *count >= self.config.min_concept_frequency)
            .collect();
        concepts.sort_by(|(a, a_count), (b, b_count)| {
            b_count
                .cmp(a_count)
                .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        });
        concepts
            .into_iter()
            .take(self.config.max_concepts)
            .map(|(concept, _)| concept)
            .collect()
    }

    /// Up to `max_reformulations` distinct reformulations of `query`.
    pub fn reformulate(
        &self,
        query: &str,
        concepts: &[String],
        results: &[SearchResult],
    ) -> Vec<String> {
        let lowered = query.to_lowercase();
        let mut candidates: Vec<String> = Vec::new();

        let fresh: Vec<&str> = concepts
            .iter()
            .map(String::as_str)
            .filter(|c| !lowered.contains(&c.to_lowercase()))
            .take(2)
            .collect();
        if !fresh.is_empty() {
            candidates.push(format!("{query} {}", fresh.join(" ")));
        }

        if let Some(substituted) = substitute_synonym(query) {
            candidates.push(substituted);
        }

        let top_text = results
            .iter()
            .take(self.config.concept_source_results)
            .map(result_text)
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if let Some(keyword) = METHODOLOGY_KEYWORDS
            .iter()
            .find(|k| top_text.contains(**k) && !lowered.contains(**k))
        {
            candidates.push(format!("{query} {keyword}"));
        }

        let mut seen: HashSet<String> = HashSet::from([lowered.trim().to_string()]);
        candidates
            .into_iter()
            .filter(|c| seen.insert(c.to_lowercase().trim().to_string()))
            .take(self.config.max_reformulations)
            .collect()
    }
}

/// Trim a candidate concept and drop leading/trailing stopwords. `None`
/// when nothing meaningful remains.
fn clean_candidate(candidate: &str) -> Option<String> {
    let words: Vec<&str> = candidate.split_whitespace().collect();
    let is_stop = |w: &&str| STOPWORDS.contains(&w.to_lowercase().as_str());
    let start = words.iter().position(|w| !is_stop(w))?;
    let end = words.iter().rposition(|w| !is_stop(w))?;
    let cleaned = words[start..=end].join(" ");
    (cleaned.chars().count() >= 3).then_some(cleaned)
}

/// Replace the first domain concept in `query` with its first related term.
fn substitute_synonym(query: &str) -> Option<String> {
    let concept = matched_concepts(query).into_iter().next()?;
    let replacement = related_terms(concept).first()?;
    let (start, len) = concept_span(query, concept)?;
    let words: Vec<&str> = query.split_whitespace().collect();
    let mut rebuilt: Vec<&str> = Vec::with_capacity(words.len());
    rebuilt.extend_from_slice(&words[..start]);
    rebuilt.push(replacement);
    rebuilt.extend_from_slice(&words[start + len..]);
    Some(rebuilt.join(" "))
}

fn result_text(result: &SearchResult) -> String {
    let mut text = String::new();
    for part in [result.title(), result.abstract_text()].into_iter().flatten() {
        text.push_str(part);
        text.push(' ');
    }
    text.push_str(&result.tags().join(" "));
    text
}

/// Descending native score, unscored results last, ties by key.
fn sort_by_native_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.item_key.cmp(&b.item_key)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.item_key.cmp(&b.item_key),
    });
}
