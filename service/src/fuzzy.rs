//! Token-set string similarity on a 0..=100 scale.

use std::collections::BTreeSet;

fn tokens(s: &str) -> BTreeSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Normalized Levenshtein similarity scaled to 0..=100.
pub fn ratio(a: &str, b: &str) -> u32 {
    if a.is_empty() && b.is_empty() {
        return 0;
    }
    (strsim::normalized_levenshtein(a, b) * 100.0).round() as u32
}

fn join(head: &str, tail: &[&str]) -> String {
    let mut out = head.to_string();
    for t in tail {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(t);
    }
    out
}

/// Compares the shared tokens of `a` and `b` against each side's full token
/// set. Word order, case, punctuation and repeated words do not matter, and
/// a query whose words all appear in the target scores 100.
pub fn token_set_ratio(a: &str, b: &str) -> u32 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0;
    }

    let common: Vec<&str> = ta.intersection(&tb).map(String::as_str).collect();
    let only_a: Vec<&str> = ta.difference(&tb).map(String::as_str).collect();
    let only_b: Vec<&str> = tb.difference(&ta).map(String::as_str).collect();

    let sect = common.join(" ");
    let full_a = join(&sect, &only_a);
    let full_b = join(&sect, &only_b);

    ratio(&sect, &full_a)
        .max(ratio(&sect, &full_b))
        .max(ratio(&full_a, &full_b))
}
