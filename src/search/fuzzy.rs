//! Similarity scorers and hybrid score aggregation
//!
//! Every scorer works on Unicode scalar values and returns a ratio in
//! `[0, 1]`; two empty strings are identical and score `1.0`.

use super::query::{Aggregation, FuzzyAlgorithm};

impl FuzzyAlgorithm {
    pub fn score(self, a: &str, b: &str) -> f64 {
        match self {
            Self::SequenceRatio => sequence_ratio(a, b),
            Self::EditDistanceRatio => edit_distance_ratio(a, b),
            Self::RapidFuzzRatio => rapid_fuzz_ratio(a, b),
        }
    }
}

impl Aggregation {
    /// Combine per-algorithm scores. `None` for an empty slice.
    pub fn aggregate(self, scores: &[f64]) -> Option<f64> {
        if scores.is_empty() {
            return None;
        }
        let value = match self {
            Self::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
            Self::Median => {
                let mut sorted = scores.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            Self::Max => scores.iter().copied().fold(f64::MIN, f64::max),
            Self::Min => scores.iter().copied().fold(f64::MAX, f64::min),
        };
        Some(value)
    }
}

/// `2 * M / (len(a) + len(b))` where `M` is the total size of the
/// recursively found longest common blocks.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(&a, &b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }
    2.0 * matched as f64 / total as f64
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`; ties go to the
/// block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    // run lengths ending at (i - 1, j - 1), offset by one column
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];
    let (mut best_i, mut best_j, mut best) = (alo, blo, 0);

    for i in alo..ahi {
        for j in blo..bhi {
            let run = if a[i] == b[j] { prev[j - blo] + 1 } else { 0 };
            cur[j - blo + 1] = run;
            if run > best {
                best_i = i + 1 - run;
                best_j = j + 1 - run;
                best = run;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    (best_i, best_j, best)
}

/// `1 - levenshtein(a, b) / max(len(a), len(b))`
pub fn edit_distance_ratio(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(a, b);
    (1.0 - distance as f64 / longest as f64).max(0.0)
}

/// Indel similarity, `2 * LCS / (len(a) + len(b))`, the ratio computed by
/// common fuzzy string matching libraries.
pub fn rapid_fuzz_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * longest_common_subsequence(&a, &b) as f64 / total as f64
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}
