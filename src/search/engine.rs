//! Edit-distance ranking / 编辑距离排序
//!
//! Distance decides order only, never bucket membership.

use super::schema::ScoredWord;

/// 计算 Levenshtein 编辑距离（按字符）
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    let len1 = s1_chars.len();
    let len2 = s2_chars.len();

    if len1 == 0 { return len2; }
    if len2 == 0 { return len1; }

    let mut matrix = vec![vec![0usize; len2 + 1]; len1 + 1];

    for (i, row) in matrix.iter_mut().enumerate() { row[0] = i; }
    for j in 0..=len2 { matrix[0][j] = j; }

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len1][len2]
}

/// Score every candidate against `query` and sort ascending by distance.
/// The sort is stable: equal distances keep discovery order.
pub fn rank_by_distance<I>(query: &str, candidates: I) -> Vec<ScoredWord>
where
    I: IntoIterator<Item = String>,
{
    let mut scored: Vec<ScoredWord> = candidates
        .into_iter()
        .map(|word| {
            let distance = levenshtein_distance(query, &word.to_lowercase());
            ScoredWord { word, distance }
        })
        .collect();
    scored.sort_by_key(|s| s.distance);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("abc", "abd"), 1);
        assert_eq!(levenshtein_distance("abc", "abcd"), 1);
        assert_eq!(levenshtein_distance("shat", "chatte"), 3);
        assert_eq!(levenshtein_distance("été", "ete"), 2);
    }

    #[test]
    fn test_rank_is_stable() {
        let ranked = rank_by_distance(
            "chat",
            ["chatte", "shat", "chat", "what"].map(String::from),
        );
        let words: Vec<&str> = ranked.iter().map(|s| s.word.as_str()).collect();
        // shat 与 what 距离相同，保持发现顺序
        assert_eq!(words, vec!["chat", "shat", "what", "chatte"]);
        assert_eq!(ranked[0].distance, 0);
    }

    #[test]
    fn test_rank_compares_lowercased_candidates() {
        let ranked = rank_by_distance("paris", vec!["Paris".to_string()]);
        assert_eq!(ranked[0].distance, 0);
        assert_eq!(ranked[0].word, "Paris");
    }
}
