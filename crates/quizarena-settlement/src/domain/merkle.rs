//! Merkle commitment over a ranking.
//!
//! Leaves are `sha256("<participant>:<correct>:<latency>")` in hex. A parent
//! is the SHA-256 of its children's hex strings concatenated left to right.
//! An odd-length layer pairs its last node with itself. The root of an empty
//! ranking is the empty string.

use quizarena_core::repository::RankingRow;
use sha2::{Digest, Sha256};

fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

fn parent(left: &str, right: &str) -> String {
    sha256_hex(&format!("{left}{right}"))
}

/// Leaf hash of a single ranking row.
#[must_use]
pub fn leaf_hash(row: &RankingRow) -> String {
    sha256_hex(&format!(
        "{}:{}:{}",
        row.participant_id, row.correct_count, row.average_latency_ms
    ))
}

fn next_layer(layer: &[String]) -> Vec<String> {
    layer
        .chunks(2)
        .map(|pair| {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            parent(left, right)
        })
        .collect()
}

/// Root hash committing to the ordered ranking.
#[must_use]
pub fn merkle_root_from_ranking(ranking: &[RankingRow]) -> String {
    let mut layer: Vec<String> = ranking.iter().map(leaf_hash).collect();
    if layer.is_empty() {
        return String::new();
    }
    while layer.len() > 1 {
        layer = next_layer(&layer);
    }
    layer.swap_remove(0)
}

/// Sibling hashes, bottom-up, proving that `ranking[index]` is under the root.
///
/// Returns an empty proof when `index` is out of range or the ranking has a
/// single row.
#[must_use]
pub fn merkle_proof(ranking: &[RankingRow], index: usize) -> Vec<String> {
    if index >= ranking.len() {
        return Vec::new();
    }
    let mut layer: Vec<String> = ranking.iter().map(leaf_hash).collect();
    let mut position = index;
    let mut proof = Vec::new();
    while layer.len() > 1 {
        let sibling = position ^ 1;
        let hash = layer.get(sibling).unwrap_or(&layer[position]);
        proof.push(hash.clone());
        layer = next_layer(&layer);
        position /= 2;
    }
    proof
}

/// Checks that `row` sits at `index` under `root` given its `proof`.
#[must_use]
pub fn verify_merkle_proof(row: &RankingRow, proof: &[String], index: usize, root: &str) -> bool {
    let mut hash = leaf_hash(row);
    let mut position = index;
    for sibling in proof {
        hash = if position % 2 == 0 {
            parent(&hash, sibling)
        } else {
            parent(sibling, &hash)
        };
        position /= 2;
    }
    hash == root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(participant_id: &str, correct_count: u32, latency: u64, position: u32) -> RankingRow {
        RankingRow {
            participant_id: participant_id.to_owned(),
            correct_count,
            average_latency_ms: latency,
            position,
        }
    }

    fn sample() -> Vec<RankingRow> {
        vec![
            row("alice", 5, 100, 1),
            row("carol", 4, 120, 2),
            row("bob", 4, 150, 3),
        ]
    }

    #[test]
    fn test_merkle_root_of_empty_ranking_is_empty_string() {
        assert_eq!(merkle_root_from_ranking(&[]), "");
    }

    #[test]
    fn test_merkle_root_of_single_row_is_its_leaf() {
        let rows = vec![row("alice", 5, 100, 1)];

        assert_eq!(merkle_root_from_ranking(&rows), leaf_hash(&rows[0]));
    }

    #[test]
    fn test_leaf_hash_matches_known_digest() {
        // sha256("alice:5:100")
        let expected = sha256_hex("alice:5:100");

        assert_eq!(leaf_hash(&row("alice", 5, 100, 1)), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn test_merkle_root_duplicates_last_node_of_odd_layer() {
        let rows = sample();
        let leaves: Vec<String> = rows.iter().map(leaf_hash).collect();
        let left = parent(&leaves[0], &leaves[1]);
        let right = parent(&leaves[2], &leaves[2]);

        assert_eq!(merkle_root_from_ranking(&rows), parent(&left, &right));
    }

    #[test]
    fn test_merkle_root_is_deterministic() {
        assert_eq!(
            merkle_root_from_ranking(&sample()),
            merkle_root_from_ranking(&sample())
        );
    }

    #[test]
    fn test_merkle_root_changes_when_any_leaf_changes() {
        let original = merkle_root_from_ranking(&sample());
        for i in 0..3 {
            let mut tampered = sample();
            tampered[i].average_latency_ms += 1;

            assert_ne!(merkle_root_from_ranking(&tampered), original);
        }
    }

    #[test]
    fn test_merkle_proof_verifies_every_row() {
        let rows: Vec<RankingRow> = (1..=7)
            .map(|i| row(&format!("p{i}"), 10 - i, u64::from(i) * 10, i))
            .collect();
        let root = merkle_root_from_ranking(&rows);

        for (index, r) in rows.iter().enumerate() {
            let proof = merkle_proof(&rows, index);

            assert!(verify_merkle_proof(r, &proof, index, &root), "row {index}");
        }
    }

    #[test]
    fn test_merkle_proof_rejects_tampered_row() {
        let rows = sample();
        let root = merkle_root_from_ranking(&rows);
        let proof = merkle_proof(&rows, 1);
        let mut tampered = rows[1].clone();
        tampered.correct_count = 5;

        assert!(!verify_merkle_proof(&tampered, &proof, 1, &root));
    }

    #[test]
    fn test_merkle_proof_out_of_range_is_empty() {
        assert!(merkle_proof(&sample(), 3).is_empty());
    }
}
