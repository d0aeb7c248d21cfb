//! Winner selection. Pure functions over a caller-supplied RNG, so a seeded
//! `StdRng` reproduces a draw exactly.

use rand::{Rng, seq::SliceRandom};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pick {
  pub user_id: i64,
  pub place: i32,
}

/// Unbiased (Fisher-Yates) permutation of `users`.
pub fn shuffled<R: Rng + ?Sized>(users: &[i64], rng: &mut R) -> Vec<i64> {
  let mut order = users.to_vec();
  order.shuffle(rng);
  order
}

/// Weighted sampling without replacement over `pool` of `(user, weight)`.
///
/// Each round draws uniformly from `[1, remaining weight]` and takes the
/// first not yet selected entry whose running total reaches the draw, so the
/// pool order decides ties. Stops early once only zero weights remain.
/// Totals are kept in `u128` and cannot overflow for any pool of `u64`s.
pub fn weighted<R: Rng + ?Sized>(
  pool: &[(i64, u64)],
  count: usize,
  rng: &mut R,
) -> Vec<i64> {
  let mut taken = vec![false; pool.len()];
  let mut winners = Vec::with_capacity(count.min(pool.len()));

  for _ in 0..count {
    let total: u128 = pool
      .iter()
      .zip(&taken)
      .filter(|(_, taken)| !**taken)
      .map(|((_, weight), _)| u128::from(*weight))
      .sum();
    if total == 0 {
      break;
    }

    let draw = rng.random_range(1..=total);
    let Some(index) = pick_index(pool, &taken, draw) else { break };

    taken[index] = true;
    winners.push(pool[index].0);
  }

  winners
}

/// Index of the first untaken entry whose cumulative weight is `>= draw`.
pub fn pick_index(
  pool: &[(i64, u64)],
  taken: &[bool],
  draw: u128,
) -> Option<usize> {
  let mut acc = 0u128;
  for (index, (_, weight)) in pool.iter().enumerate() {
    if taken[index] || *weight == 0 {
      continue;
    }
    acc += u128::from(*weight);
    if acc >= draw {
      return Some(index);
    }
  }
  None
}

/// Numbers `users` as places starting at `first`.
pub fn places(users: &[i64], first: i32) -> Vec<Pick> {
  users
    .iter()
    .zip(first..)
    .map(|(&user_id, place)| Pick { user_id, place })
    .collect()
}
