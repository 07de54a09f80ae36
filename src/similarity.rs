//! Text similarity over work-item descriptions.
//!
//! TF-IDF vector space with stopword removal, compared by cosine angle.
//! Stateless: every call fits over exactly the documents it is given, so
//! scores depend only on the inputs.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::Result;

/// Scoring seam between the conflict resolver / hint engine and the
/// underlying text model. A failing implementation is tolerated by
/// callers (treated as similarity 0.0), never fatal.
pub trait SemanticIndex: Send + Sync {
    /// Similarity between two texts, in [0, 1]. Symmetric; degenerate
    /// inputs (empty, stopwords only) score 0.0 rather than failing.
    fn similarity(&self, a: &str, b: &str) -> Result<f64>;

    /// Similarity of `query` against each corpus document, fit over the
    /// corpus plus the query. Returns one score per document.
    fn rank(&self, query: &str, corpus: &[String]) -> Result<Vec<f64>>;
}

/// English stopwords stripped before vectorization.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "an", "and", "any", "are", "as", "at", "be", "because", "been",
    "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have", "how",
    "if", "in", "into", "is", "it", "its", "just", "more", "most", "no", "not", "of", "on", "only",
    "or", "other", "our", "should", "so", "some", "such", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "to", "up", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "will", "with", "would", "you", "your",
];

/// TF-IDF + cosine similarity index.
#[derive(Debug, Clone, Default)]
pub struct TfIdfIndex;

impl TfIdfIndex {
    pub fn new() -> Self {
        Self
    }

    fn tokenize(text: &str) -> Vec<String> {
        let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty() && !stopwords.contains(t))
            .map(|t| t.to_string())
            .collect()
    }

    /// Smoothed inverse document frequencies over a token-doc corpus:
    /// `ln((1 + n) / (1 + df)) + 1`, so a term in every document still
    /// contributes weight 1 rather than vanishing.
    fn idf(docs: &[Vec<String>]) -> HashMap<String, f64> {
        let n = docs.len() as f64;
        let mut df: HashMap<String, usize> = HashMap::new();
        for doc in docs {
            let unique: HashSet<&String> = doc.iter().collect();
            for token in unique {
                *df.entry(token.clone()).or_default() += 1;
            }
        }
        df.into_iter()
            .map(|(token, count)| {
                let idf = ((1.0 + n) / (1.0 + count as f64)).ln() + 1.0;
                (token, idf)
            })
            .collect()
    }

    /// Term weights in key order, so dot products sum in a fixed order
    /// and identical inputs always produce identical scores.
    fn vectorize(tokens: &[String], idf: &HashMap<String, f64>) -> BTreeMap<String, f64> {
        let mut tf: BTreeMap<String, f64> = BTreeMap::new();
        for token in tokens {
            *tf.entry(token.clone()).or_default() += 1.0;
        }
        tf.into_iter()
            .map(|(token, count)| {
                let weight = count * idf.get(&token).copied().unwrap_or(1.0);
                (token, weight)
            })
            .collect()
    }

    fn cosine(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> f64 {
        let dot: f64 = a
            .iter()
            .filter_map(|(k, va)| b.get(k).map(|vb| va * vb))
            .sum();
        let norm_a: f64 = a.values().map(|v| v * v).sum::<f64>().sqrt();
        let norm_b: f64 = b.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

impl SemanticIndex for TfIdfIndex {
    fn similarity(&self, a: &str, b: &str) -> Result<f64> {
        let tokens_a = Self::tokenize(a);
        let tokens_b = Self::tokenize(b);
        if tokens_a.is_empty() || tokens_b.is_empty() {
            return Ok(0.0);
        }
        let idf = Self::idf(&[tokens_a.clone(), tokens_b.clone()]);
        let va = Self::vectorize(&tokens_a, &idf);
        let vb = Self::vectorize(&tokens_b, &idf);
        Ok(Self::cosine(&va, &vb))
    }

    fn rank(&self, query: &str, corpus: &[String]) -> Result<Vec<f64>> {
        if corpus.is_empty() {
            return Ok(Vec::new());
        }
        let query_tokens = Self::tokenize(query);
        let corpus_tokens: Vec<Vec<String>> =
            corpus.iter().map(|d| Self::tokenize(d)).collect();

        if query_tokens.is_empty() {
            return Ok(vec![0.0; corpus.len()]);
        }

        let mut all_docs = corpus_tokens.clone();
        all_docs.push(query_tokens.clone());
        let idf = Self::idf(&all_docs);

        let query_vec = Self::vectorize(&query_tokens, &idf);
        Ok(corpus_tokens
            .iter()
            .map(|tokens| {
                if tokens.is_empty() {
                    0.0
                } else {
                    Self::cosine(&query_vec, &Self::vectorize(tokens, &idf))
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim(a: &str, b: &str) -> f64 {
        TfIdfIndex::new().similarity(a, b).unwrap()
    }

    #[test]
    fn identical_texts_score_one() {
        let s = sim("fix login session bug", "fix login session bug");
        assert!((s - 1.0).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn disjoint_texts_score_zero() {
        assert_eq!(sim("refactor database schema", "update marketing banner"), 0.0);
    }

    #[test]
    fn similarity_is_symmetric() {
        let pairs = [
            ("fix login bug", "fix login bug quickly"),
            ("add caching layer", "add metrics layer"),
            ("", "anything"),
        ];
        for (a, b) in pairs {
            assert_eq!(sim(a, b), sim(b, a), "asymmetric for {a:?} / {b:?}");
        }
    }

    #[test]
    fn self_similarity_dominates() {
        let x = "implement retry backoff for uploads";
        for y in ["implement retry", "totally unrelated words here", ""] {
            assert!(sim(x, x) >= sim(x, y));
        }
    }

    #[test]
    fn empty_and_stopword_only_inputs_score_zero() {
        assert_eq!(sim("", ""), 0.0);
        assert_eq!(sim("the and of", "the and of"), 0.0);
        assert_eq!(sim("", "fix bug"), 0.0);
    }

    #[test]
    fn single_token_inputs_are_tolerated() {
        assert!((sim("login", "login") - 1.0).abs() < 1e-9);
        assert_eq!(sim("login", "billing"), 0.0);
    }

    #[test]
    fn overlapping_texts_score_between_zero_and_one() {
        let s = sim("fix login bug", "fix login bug in session handling");
        assert!(s > 0.0 && s < 1.0, "got {s}");
    }

    #[test]
    fn rank_scores_one_per_document() {
        let index = TfIdfIndex::new();
        let corpus = vec![
            "fix login redirect bug".to_string(),
            "design onboarding survey".to_string(),
            "".to_string(),
        ];
        let scores = index.rank("fix login bug", &corpus).unwrap();
        assert_eq!(scores.len(), 3);
        assert!(scores[0] > scores[1]);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn rank_on_empty_corpus_is_empty() {
        let index = TfIdfIndex::new();
        assert!(index.rank("anything", &[]).unwrap().is_empty());
    }
}
