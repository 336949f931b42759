//! Token bags to feature vectors.
//!
//! A [`FeatureVectorizer`] is fitted once over the whole catalogue. Its
//! vocabulary and weighting never change afterwards; every item is mapped into
//! the same coordinate space so row `i` of the output lines up with item `i`.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::models::{Item, Weighting};

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can",
    "cannot", "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail", "do",
    "done", "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five",
    "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here",
    "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his",
    "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into",
    "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd",
    "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more", "moreover",
    "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely", "neither",
    "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or",
    "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part",
    "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed",
    "seeming", "seems", "serious", "several", "she", "should", "show", "side", "since",
    "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than", "that", "the",
    "their", "them", "themselves", "then", "thence", "there", "thereafter", "thereby",
    "therefore", "therein", "thereupon", "these", "they", "thick", "thin", "third", "this",
    "those", "though", "three", "through", "throughout", "thru", "thus", "to", "together", "too",
    "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up", "upon",
    "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when", "whence",
    "whenever", "where", "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever",
    "whether", "which", "while", "whither", "who", "whoever", "whole", "whom", "whose", "why",
    "will", "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static STOP_WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    STOP_WORDS.get_or_init(|| ENGLISH_STOP_WORDS.iter().copied().collect())
}

/// Lowercased terms of two or more word characters, stop words removed
pub fn tokenize(text: &str) -> Vec<String> {
    let stop = stop_words();
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2 && !stop.contains(t))
        .map(str::to_string)
        .collect()
}

fn item_terms(item: &Item) -> Vec<String> {
    tokenize(&item.tokens.join(" "))
}

/// A fixed-dimension vector stored as sorted (column, weight) pairs
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    dim: usize,
    entries: Vec<(usize, f64)>,
}

impl FeatureVector {
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_zero(&self) -> bool {
        self.entries.iter().all(|(_, w)| *w == 0.0)
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
    }

    /// Sparse dot product; both sides are sorted by column
    pub fn dot(&self, other: &FeatureVector) -> f64 {
        let (mut a, mut b) = (0, 0);
        let mut sum = 0.0;
        while a < self.entries.len() && b < other.entries.len() {
            let (ca, wa) = self.entries[a];
            let (cb, wb) = other.entries[b];
            match ca.cmp(&cb) {
                std::cmp::Ordering::Less => a += 1,
                std::cmp::Ordering::Greater => b += 1,
                std::cmp::Ordering::Equal => {
                    sum += wa * wb;
                    a += 1;
                    b += 1;
                }
            }
        }
        sum
    }

    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.dim];
        for &(col, w) in &self.entries {
            dense[col] = w;
        }
        dense
    }
}

/// Vocabulary plus weighting, fitted once per artifact set
#[derive(Debug, Clone)]
pub struct FeatureVectorizer {
    terms: Vec<String>,
    index: HashMap<String, usize>,
    weighting: Weighting,
    /// Per-column idf; only populated for TF-IDF weighting
    idf: Vec<f64>,
}

impl FeatureVectorizer {
    /// Fits the vocabulary over the whole corpus.
    ///
    /// Keeps the `max_features` terms with the highest corpus frequency (ties
    /// broken lexicographically). Columns are ordered lexicographically.
    pub fn fit(items: &[Item], weighting: Weighting, max_features: Option<usize>) -> Self {
        let docs: Vec<Vec<String>> = items.iter().map(item_terms).collect();

        let mut frequency: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            for term in doc {
                *frequency.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(&str, usize)> = frequency.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        if let Some(max) = max_features {
            ranked.truncate(max);
        }

        let mut terms: Vec<String> = ranked.into_iter().map(|(t, _)| t.to_string()).collect();
        terms.sort();

        let index: HashMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        let idf = match weighting {
            Weighting::Count => Vec::new(),
            Weighting::Tfidf => {
                let mut df = vec![0usize; terms.len()];
                for doc in &docs {
                    let seen: HashSet<usize> =
                        doc.iter().filter_map(|t| index.get(t).copied()).collect();
                    for col in seen {
                        df[col] += 1;
                    }
                }
                let n = docs.len() as f64;
                df.into_iter()
                    .map(|d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
                    .collect()
            }
        };

        tracing::debug!(
            vocabulary_size = terms.len(),
            documents = docs.len(),
            weighting = ?weighting,
            "Fitted vocabulary"
        );

        Self {
            terms,
            index,
            weighting,
            idf,
        }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.terms
    }

    pub fn dim(&self) -> usize {
        self.terms.len()
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    /// Maps one item into vocabulary space. Out-of-vocabulary terms are ignored.
    pub fn transform(&self, item: &Item) -> FeatureVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in item_terms(item) {
            if let Some(&col) = self.index.get(&term) {
                *counts.entry(col).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> = counts.into_iter().collect();
        entries.sort_by_key(|(col, _)| *col);

        if self.weighting == Weighting::Tfidf {
            for (col, w) in entries.iter_mut() {
                *w *= self.idf[*col];
            }
            let norm = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                for (_, w) in entries.iter_mut() {
                    *w /= norm;
                }
            }
        }

        FeatureVector {
            dim: self.dim(),
            entries,
        }
    }

    /// Row `i` of the result belongs to `items[i]`
    pub fn transform_all(&self, items: &[Item]) -> Vec<FeatureVector> {
        items.iter().map(|item| self.transform(item)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(tokens: &[&str]) -> Item {
        Item {
            key: tokens.join(" "),
            id: None,
            title: tokens.join(" "),
            canonical_title: tokens.join(" "),
            year: None,
            genres: Vec::new(),
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_tokenize_lowercases_and_drops_stop_words() {
        assert_eq!(
            tokenize("The Lord of the Rings Sci-Fi"),
            vec!["lord", "rings", "sci", "fi"]
        );
    }

    #[test]
    fn test_tokenize_drops_single_characters() {
        assert_eq!(tokenize("Children's X Toy"), vec!["children", "toy"]);
    }

    #[test]
    fn test_vocabulary_is_lexicographic() {
        let items = vec![item(&["zebra", "apple"]), item(&["mango", "apple"])];
        let v = FeatureVectorizer::fit(&items, Weighting::Count, None);
        assert_eq!(v.vocabulary(), &["apple", "mango", "zebra"]);
    }

    #[test]
    fn test_vocabulary_cap_keeps_most_frequent() {
        let items = vec![
            item(&["heat", "crime", "action"]),
            item(&["crime", "action"]),
            item(&["crime"]),
        ];
        let v = FeatureVectorizer::fit(&items, Weighting::Count, Some(2));
        assert_eq!(v.vocabulary(), &["action", "crime"]);
    }

    #[test]
    fn test_count_weighting() {
        let items = vec![item(&["toy", "story", "toy"])];
        let v = FeatureVectorizer::fit(&items, Weighting::Count, None);
        let vector = v.transform(&items[0]);
        assert_eq!(vector.to_dense(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_tfidf_rows_are_unit_length() {
        let items = vec![
            item(&["toy", "story", "animation"]),
            item(&["heat", "action", "crime"]),
        ];
        let v = FeatureVectorizer::fit(&items, Weighting::Tfidf, None);
        for vector in v.transform_all(&items) {
            assert!((vector.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_tfidf_downweights_common_terms() {
        let items = vec![
            item(&["comedy", "toy"]),
            item(&["comedy", "heat"]),
            item(&["comedy", "jumanji"]),
        ];
        let v = FeatureVectorizer::fit(&items, Weighting::Tfidf, None);
        let dense = v.transform(&items[0]).to_dense();
        let comedy = v.vocabulary().iter().position(|t| t == "comedy").unwrap();
        let toy = v.vocabulary().iter().position(|t| t == "toy").unwrap();
        assert!(dense[comedy] < dense[toy]);
    }

    #[test]
    fn test_empty_token_bag_is_zero_vector() {
        let items = vec![item(&["toy"]), item(&[])];
        let v = FeatureVectorizer::fit(&items, Weighting::Tfidf, None);
        let vector = v.transform(&items[1]);
        assert!(vector.is_zero());
        assert_eq!(vector.dim(), 1);
        assert_eq!(vector.norm(), 0.0);
    }

    #[test]
    fn test_sparse_dot_matches_dense() {
        let items = vec![item(&["a1", "b2", "c3"]), item(&["b2", "c3", "c3"])];
        let v = FeatureVectorizer::fit(&items, Weighting::Count, None);
        let x = v.transform(&items[0]);
        let y = v.transform(&items[1]);
        let dense: f64 = x
            .to_dense()
            .iter()
            .zip(y.to_dense())
            .map(|(a, b)| a * b)
            .sum();
        assert_eq!(x.dot(&y), dense);
        assert_eq!(x.dot(&y), 3.0);
    }
}
