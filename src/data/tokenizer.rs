// ============================================================
// Layer 4 — Word Tokenizer
// ============================================================
// Turns raw text into fixed-length sequences of vocabulary ids.
//
// Steps (applied in order):
//   1. Lowercase the text (optional, on by default)
//   2. Replace every excluded character with a space
//   3. Split on the space character only (tabs, \r and NBSP
//      stay inside tokens unless excluded); empty pieces
//      are dropped
//   4. Build the vocabulary over train ++ test ++ validation
//   5. Map each token to its id; unknown tokens are DROPPED,
//      there is no [UNK] id
//   6. Left-pad every sequence with 0 to the longest length
//
// Id 0 is reserved for padding and never names a real token,
// so ids run 1..=vocabulary.len().
//
// Reference: Rust Book §8 (Strings), §13 (Iterators)

use std::{collections::HashSet, fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{PipelineError, PipelineResult};

/// Punctuation and symbols stripped before splitting.
pub const DEFAULT_EXCLUDED_CHARS: &str =
    "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n“”’'∞θ÷α•à−β∅³π‘₹´°£€×™√²—";

/// Id used for padding positions.
pub const PAD_ID: u32 = 0;

/// How vocabulary ids are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexOrder {
    /// Id follows the order in which tokens are first seen
    #[default]
    Insertion,
    /// Most frequent token gets id 1; ties keep first-seen order
    Frequency,
}

impl FromStr for IndexOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insertion" => Ok(IndexOrder::Insertion),
            "frequency" => Ok(IndexOrder::Frequency),
            other => Err(format!("unknown index order '{other}' (expected insertion or frequency)")),
        }
    }
}

impl fmt::Display for IndexOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexOrder::Insertion => f.write_str("insertion"),
            IndexOrder::Frequency => f.write_str("frequency"),
        }
    }
}

// ─── Vocabulary ───────────────────────────────────────────────────────────────
/// Token → id mapping. Iteration order is id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    index: IndexMap<String, u32>,
}

impl Vocabulary {
    /// Build from tokens already in id order; the first gets id 1.
    pub fn from_ordered<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = IndexMap::new();
        for token in tokens {
            let next = index.len() as u32 + 1;
            index.entry(token.into()).or_insert(next);
        }
        Self { index }
    }

    pub fn get(&self, token: &str) -> Option<u32> {
        self.index.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// (token, id) pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.index.iter().map(|(t, &i)| (t.as_str(), i))
    }
}

// ─── Padding ──────────────────────────────────────────────────────────────────
/// Left-pad with [`PAD_ID`] to `max_len`; longer input keeps its last
/// `max_len` ids.
pub fn pad_sequence(seq: &[u32], max_len: usize) -> Vec<u32> {
    if seq.len() >= max_len {
        return seq[seq.len() - max_len..].to_vec();
    }
    let mut out = vec![PAD_ID; max_len - seq.len()];
    out.extend_from_slice(seq);
    out
}

pub fn pad_sequences(seqs: &[Vec<u32>], max_len: usize) -> Vec<Vec<u32>> {
    seqs.iter().map(|s| pad_sequence(s, max_len)).collect()
}

// ─── Encoded output ───────────────────────────────────────────────────────────
/// The three padded partitions plus the vocabulary they were encoded with.
#[derive(Debug, Clone)]
pub struct EncodedPartitions {
    pub train:      Vec<Vec<u32>>,
    pub test:       Vec<Vec<u32>>,
    pub val:        Vec<Vec<u32>>,
    pub vocabulary: Vocabulary,
    pub max_len:    usize,
}

// ─── TextTokenizer ────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TextTokenizer {
    excluded:  HashSet<char>,
    lowercase: bool,
    order:     IndexOrder,
}

impl TextTokenizer {
    pub fn new(excluded_chars: &str, lowercase: bool, order: IndexOrder) -> Self {
        Self {
            excluded: excluded_chars.chars().collect(),
            lowercase,
            order,
        }
    }

    /// Normalise and split one text into tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let text = if self.lowercase { text.to_lowercase() } else { text.to_string() };
        let cleaned: String = text
            .chars()
            .map(|c| if self.excluded.contains(&c) { ' ' } else { c })
            .collect();
        cleaned
            .split(' ')
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Build a vocabulary from every token of every text.
    pub fn fit<'a, I>(&self, texts: I) -> Vocabulary
    where
        I: IntoIterator<Item = &'a str>,
    {
        // Counts in first-seen order
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for text in texts {
            for token in self.tokenize(text) {
                *counts.entry(token).or_insert(0) += 1;
            }
        }

        match self.order {
            IndexOrder::Insertion => Vocabulary::from_ordered(counts.into_keys()),
            IndexOrder::Frequency => {
                let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
                // Stable sort keeps first-seen order among equal counts
                ranked.sort_by(|a, b| b.1.cmp(&a.1));
                Vocabulary::from_ordered(ranked.into_iter().map(|(t, _)| t))
            }
        }
    }

    /// Map one text to ids, dropping tokens the vocabulary does not know.
    pub fn encode(&self, vocabulary: &Vocabulary, text: &str) -> Vec<u32> {
        self.tokenize(text)
            .iter()
            .filter_map(|t| vocabulary.get(t))
            .collect()
    }

    /// Fit on all three partitions, encode each, and pad to the shared
    /// maximum length.
    pub fn fit_transform<S: AsRef<str>>(
        &self,
        train: &[S],
        test:  &[S],
        val:   &[S],
    ) -> PipelineResult<EncodedPartitions> {
        let all = train.iter().chain(test).chain(val).map(|s| s.as_ref());
        let vocabulary = self.fit(all);

        let encode_all = |texts: &[S]| -> Vec<Vec<u32>> {
            texts.iter().map(|t| self.encode(&vocabulary, t.as_ref())).collect()
        };
        let train_ids = encode_all(train);
        let test_ids  = encode_all(test);
        let val_ids   = encode_all(val);

        let max_len = train_ids
            .iter()
            .chain(&test_ids)
            .chain(&val_ids)
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        if vocabulary.is_empty() || max_len == 0 {
            return Err(PipelineError::EmptyVocabulary);
        }

        tracing::info!(
            "Vocabulary: {} tokens ({} order), max sequence length {}",
            vocabulary.len(),
            self.order,
            max_len
        );

        Ok(EncodedPartitions {
            train: pad_sequences(&train_ids, max_len),
            test:  pad_sequences(&test_ids,  max_len),
            val:   pad_sequences(&val_ids,   max_len),
            vocabulary,
            max_len,
        })
    }
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_CHARS, true, IndexOrder::Insertion)
    }
}
