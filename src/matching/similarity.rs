/// Similarity of two names in `[0, 1]`, ignoring ASCII case
///
/// This is `1 - d / (|a| + |b|)` where `d` is the edit distance between the names when only
/// insertions and deletions are allowed (so a substitution costs 2). Identical names score 1
/// and names with no characters in common score 0.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().map(|c| c.to_ascii_lowercase()).collect();
    let b: Vec<char> = b.chars().map(|c| c.to_ascii_lowercase()).collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    1.0 - edit_distance(&a, &b) as f64 / total as f64
}

/// Insert/delete edit distance, with substitutions costing 2
fn edit_distance(a: &[char], b: &[char]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + if ca == cb { 0 } else { 2 };
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn distances() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(edit_distance(&chars("calc"), &chars("calculate")), 5);
        assert_eq!(edit_distance(&chars("kalkulate"), &chars("calculate")), 2);
        assert_eq!(edit_distance(&chars(""), &chars("bar")), 3);
        assert_eq!(edit_distance(&chars("foo"), &chars("bar")), 6);
    }

    #[test]
    fn similarities() {
        assert_eq!(name_similarity("Calculator", "calculator"), 1.0);
        assert_eq!(name_similarity("", ""), 1.0);
        assert_eq!(name_similarity("foo", "bar"), 0.0);
        assert!((name_similarity("calc", "calculate") - 8.0 / 13.0).abs() < 1e-9);
        assert!((name_similarity("kalkulate", "calculate") - 16.0 / 18.0).abs() < 1e-9);
    }
}
