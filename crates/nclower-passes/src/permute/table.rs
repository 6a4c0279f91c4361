//! Backend permutation codes.
//!
//! The backend `Permute` layer names each supported axis order with a small
//! integer. Ranks 1 through 4 support every permutation; rank 5 supports the
//! identity and the ten single pairwise swaps only. The table order is part of
//! the backend's format and must not be re-derived.

use std::sync::OnceLock;

/// Highest rank the backend can permute.
pub const MAX_RANK: usize = 5;

const RANK2: [[usize; 2]; 2] = [[0, 1], [1, 0]];

const RANK3: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

const RANK4: [[usize; 4]; 24] = [
    [0, 1, 2, 3],
    [0, 1, 3, 2],
    [0, 2, 1, 3],
    [0, 2, 3, 1],
    [0, 3, 1, 2],
    [0, 3, 2, 1],
    [1, 0, 2, 3],
    [1, 0, 3, 2],
    [1, 2, 0, 3],
    [1, 2, 3, 0],
    [1, 3, 0, 2],
    [1, 3, 2, 0],
    [2, 0, 1, 3],
    [2, 0, 3, 1],
    [2, 1, 0, 3],
    [2, 1, 3, 0],
    [2, 3, 0, 1],
    [2, 3, 1, 0],
    [3, 0, 1, 2],
    [3, 0, 2, 1],
    [3, 1, 0, 2],
    [3, 1, 2, 0],
    [3, 2, 0, 1],
    [3, 2, 1, 0],
];

/// Rank-5 table: identity, then each swap `(i, j)` with `i < j` in
/// lexicographic order.
fn rank5() -> &'static [[usize; 5]] {
    static TABLE: OnceLock<Vec<[usize; 5]>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let identity = [0, 1, 2, 3, 4];
        let mut table = vec![identity];
        for i in 0..5 {
            for j in i + 1..5 {
                let mut perm = identity;
                perm.swap(i, j);
                table.push(perm);
            }
        }
        table
    })
}

fn position<const N: usize>(table: &[[usize; N]], perm: &[usize]) -> Option<i64> {
    table
        .iter()
        .position(|entry| entry.as_slice() == perm)
        .map(|index| index as i64)
}

/// Backend code for `perm`, or `None` if the backend cannot express it.
///
/// The rank is `perm.len()`.
pub fn permute_code(perm: &[usize]) -> Option<i64> {
    match perm.len() {
        1 => (perm == [0]).then_some(0),
        2 => position(&RANK2, perm),
        3 => position(&RANK3, perm),
        4 => position(&RANK4, perm),
        5 => position(rank5(), perm),
        _ => None,
    }
}
