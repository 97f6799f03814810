//! String similarity ratios used by the fuzzy resolution layer.
//!
//! The default scorer is the gestalt pattern-matching ratio: twice the number of
//! characters found in recursively located longest common blocks, divided by the
//! combined length of both strings. `strsim` metrics are available as alternatives.

use std::{collections::HashMap, str::FromStr};

use serde::Deserialize;
use strsim::{jaro_winkler, normalized_levenshtein};

/// Similarity function applied between a query term and vocabulary keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FuzzyScorer {
    #[default]
    Gestalt,
    Levenshtein,
    JaroWinkler,
}

impl FromStr for FuzzyScorer {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gestalt" | "ratcliff" => Ok(Self::Gestalt),
            "levenshtein" => Ok(Self::Levenshtein),
            "jaro-winkler" | "jaro_winkler" => Ok(Self::JaroWinkler),
            other => Err(format!("unknown fuzzy scorer {other}")),
        }
    }
}

impl FuzzyScorer {
    pub fn score(&self, a: &str, b: &str) -> f64 {
        match self {
            Self::Gestalt => sequence_ratio(a, b),
            Self::Levenshtein => normalized_levenshtein(a, b),
            Self::JaroWinkler => jaro_winkler(a, b),
        }
    }

    /// Cheap upper bound on `score`, or `None` when the scorer has no usable bound.
    pub fn upper_bound(&self, a: &[char], b: &[char]) -> Option<f64> {
        match self {
            Self::Gestalt => Some(length_bound(a.len(), b.len()).min(multiset_bound(a, b))),
            _ => None,
        }
    }
}

/// Gestalt ratio of two strings in `[0, 1]`.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_of(&a, &b)
}

pub(crate) fn ratio_of(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(a, b) as f64 / total as f64
}

/// Ratio bound from lengths alone: the shorter string can match at most fully.
pub fn length_bound(len_a: usize, len_b: usize) -> f64 {
    let total = len_a + len_b;
    if total == 0 {
        return 1.0;
    }
    2.0 * len_a.min(len_b) as f64 / total as f64
}

/// Ratio bound from character multiset intersection, ignoring order.
pub fn multiset_bound(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let mut available: HashMap<char, usize> = HashMap::new();
    for ch in b {
        *available.entry(*ch).or_insert(0) += 1;
    }
    let mut matches = 0usize;
    for ch in a {
        if let Some(count) = available.get_mut(ch) {
            if *count > 0 {
                *count -= 1;
                matches += 1;
            }
        }
    }
    2.0 * matches as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
        let (i, j, size) = longest_block(a, b, a_lo, a_hi, b_lo, b_hi);
        if size == 0 {
            continue;
        }
        total += size;
        if a_lo < i && b_lo < j {
            pending.push((a_lo, i, b_lo, j));
        }
        if i + size < a_hi && j + size < b_hi {
            pending.push((i + size, a_hi, j + size, b_hi));
        }
    }
    total
}

/// Longest common block within the given windows; the earliest block wins ties.
fn longest_block(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let width = b_hi - b_lo;
    let mut previous = vec![0usize; width + 1];
    let mut current = vec![0usize; width + 1];
    let (mut best_i, mut best_j, mut best_size) = (a_lo, b_lo, 0);
    for i in a_lo..a_hi {
        for j in b_lo..b_hi {
            let slot = j - b_lo + 1;
            if a[i] == b[j] {
                let run = previous[slot - 1] + 1;
                current[slot] = run;
                if run > best_size {
                    best_i = i + 1 - run;
                    best_j = j + 1 - run;
                    best_size = run;
                }
            } else {
                current[slot] = 0;
            }
        }
        std::mem::swap(&mut previous, &mut current);
    }
    (best_i, best_j, best_size)
}
