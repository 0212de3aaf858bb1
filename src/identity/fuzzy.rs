// src/identity/fuzzy.rs
//
// Weighted string similarity on a 0..=100 scale. Scores are built from the
// Indel distance (insertions and deletions only) in the usual
// ratio / partial / token-sort / token-set combination.

use std::collections::BTreeSet;

const UNBASE_SCALE: f64 = 0.95;

/// Lower-case, turn every non-alphanumeric into a space, trim.
pub fn normalize(s: &str) -> String {
    let mapped: String = s
        .chars()
        .flat_map(|c| {
            let keep = c.is_alphanumeric();
            c.to_lowercase().map(move |l| if keep { l } else { ' ' })
        })
        .collect();
    mapped.trim().to_string()
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn chars_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    100.0 * (2 * lcs_len(a, b)) as f64 / total as f64
}

pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    chars_ratio(&a, &b)
}

/// Best alignment of the shorter string against any same-length window of
/// the longer one (plus the ragged windows at either end).
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }

    let m = short.len();
    let mut best: f64 = 0.0;
    for start in 0..=(long.len() - m) {
        best = best.max(chars_ratio(&short, &long[start..start + m]));
        if best >= 100.0 {
            return 100.0;
        }
    }
    for i in 1..m.min(long.len()) {
        best = best.max(chars_ratio(&short, &long[..i]));
        best = best.max(chars_ratio(&short, &long[long.len() - i..]));
    }
    best
}

fn join<'a>(tokens: impl IntoIterator<Item = &'a str>) -> String {
    tokens.into_iter().collect::<Vec<_>>().join(" ")
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    join(tokens)
}

pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let sect: Vec<&str> = ta.intersection(&tb).copied().collect();
    let ab: Vec<&str> = ta.difference(&tb).copied().collect();
    let ba: Vec<&str> = tb.difference(&ta).copied().collect();
    if !sect.is_empty() && (ab.is_empty() || ba.is_empty()) {
        return 100.0;
    }

    let sect = join(sect);
    let ab = join(ab);
    let ba = join(ba);
    let mut best = ratio(&ab, &ba);
    if !sect.is_empty() {
        best = best
            .max(ratio(&sect, &format!("{sect} {ab}")))
            .max(ratio(&sect, &format!("{sect} {ba}")));
    }
    best
}

fn partial_token_ratio(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    if ta.intersection(&tb).next().is_some() {
        return 100.0;
    }
    partial_ratio(&join(ta), &join(tb))
}

/// Weighted ratio of two raw strings; 0 when either normalizes to nothing.
pub fn weighted_ratio(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (la, lb) = (a.chars().count() as f64, b.chars().count() as f64);
    let len_ratio = la.max(lb) / la.min(lb);

    let mut best = ratio(&a, &b);
    if len_ratio < 1.5 {
        let token = token_sort_ratio(&a, &b).max(token_set_ratio(&a, &b));
        return best.max(token * UNBASE_SCALE);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    best = best.max(partial_ratio(&a, &b) * partial_scale);
    best.max(partial_token_ratio(&a, &b) * UNBASE_SCALE * partial_scale)
}
