//! Character-level edit distance for the fuzzy glossary tier.

/// Levenshtein distance over Unicode scalar values.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // two rolling rows instead of the full matrix
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - distance / max_len`, in `[0, 1]`. Two empty strings are identical.
pub fn similarity(s1: &str, s2: &str) -> f32 {
    let max_len = s1.chars().count().max(s2.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(s1, s2) as f32 / max_len as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_counts_chars_not_bytes() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("般若", "般若"), 0);
        assert_eq!(levenshtein_distance("般若", "般舟"), 1);
        assert_eq!(levenshtein_distance("", "空性"), 2);
    }

    #[test]
    fn similarity_is_normalized() {
        assert_eq!(similarity("", ""), 1.0);
        assert!((similarity("緣起", "緣生") - 0.5).abs() < 1e-6);
        assert_eq!(similarity("空", "有"), 0.0);
    }
}
