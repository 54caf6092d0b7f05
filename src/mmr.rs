//! Maximal marginal relevance over a fetched candidate set.
//!
//! Pure reranking kernel: the store fetches `fetch_k` candidates with their
//! embeddings, this module picks `k` of them trading relevance against
//! redundancy.

/// Cosine similarity between two vectors. Zero when either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Select up to `k` candidate indices by maximal marginal relevance.
///
/// Iteratively picks the candidate maximising
/// `lambda * sim(query, c) - (1 - lambda) * max_selected_sim(c)`.
/// Ties go to the smaller original index. Returns `min(k, n)` entries;
/// a round that cannot produce a candidate (NaN-poisoned scores) yields `-1`.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[Vec<f32>],
    lambda: f32,
    k: usize,
) -> Vec<i64> {
    let n = candidates.len();
    let rounds = k.min(n);
    let query_sims: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query, c))
        .collect();

    let mut picked: Vec<i64> = Vec::with_capacity(rounds);
    let mut used = vec![false; n];

    for _ in 0..rounds {
        let mut best: Option<usize> = None;
        let mut best_score = f32::NEG_INFINITY;

        for i in 0..n {
            if used[i] {
                continue;
            }
            let redundancy = picked
                .iter()
                .filter(|&&j| j >= 0)
                .map(|&j| cosine_similarity(&candidates[i], &candidates[j as usize]))
                .fold(0.0_f32, f32::max);
            let score = lambda * query_sims[i] - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best = Some(i);
            }
        }

        match best {
            Some(i) => {
                used[i] = true;
                picked.push(i as i64);
            }
            None => picked.push(-1),
        }
    }

    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, 0.5, 0.2];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn zero_norm_yields_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn returns_min_of_k_and_candidate_count() {
        let query = vec![1.0, 0.0];
        let candidates = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let picked = maximal_marginal_relevance(&query, &candidates, 0.7, 5);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn indices_are_distinct_and_in_range() {
        let query = vec![1.0, 1.0, 0.0];
        let candidates = vec![
            vec![1.0, 1.0, 0.0],
            vec![1.0, 0.9, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.5, 0.5, 0.5],
        ];
        let picked = maximal_marginal_relevance(&query, &candidates, 0.7, 3);
        assert_eq!(picked.len(), 3);
        let mut seen = std::collections::HashSet::new();
        for &i in &picked {
            assert!((0..4).contains(&i));
            assert!(seen.insert(i));
        }
    }

    #[test]
    fn first_pick_is_most_relevant() {
        let query = vec![1.0, 0.0];
        let candidates = vec![vec![0.0, 1.0], vec![1.0, 0.1], vec![0.5, 0.5]];
        let picked = maximal_marginal_relevance(&query, &candidates, 0.7, 3);
        assert_eq!(picked[0], 1);
    }

    #[test]
    fn lambda_zero_prefers_diversity_after_first() {
        let query = vec![1.0, 0.0];
        // Candidates 0 and 1 are near-duplicates; 2 points elsewhere.
        let candidates = vec![vec![1.0, 0.0], vec![1.0, 0.01], vec![0.0, 1.0]];
        let picked = maximal_marginal_relevance(&query, &candidates, 0.0, 2);
        assert_eq!(picked[0], 0);
        assert_eq!(picked[1], 2);
    }

    #[test]
    fn ties_break_to_smaller_index() {
        let query = vec![1.0, 0.0];
        let candidates = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let picked = maximal_marginal_relevance(&query, &candidates, 1.0, 1);
        assert_eq!(picked, vec![0]);
    }

    #[test]
    fn nan_scores_pad_with_minus_one() {
        let query = vec![f32::NAN, f32::NAN];
        let candidates = vec![vec![1.0, 0.0]];
        let picked = maximal_marginal_relevance(&query, &candidates, 0.7, 1);
        assert_eq!(picked, vec![-1]);
    }
}
