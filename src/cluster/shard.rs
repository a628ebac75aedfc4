//! Synthetic shard generation
//!
//! Each worker generates its own slice of the point set; nothing is sent over
//! the wire. Coordinates are uniform in `[0, 1)` and drawn from a
//! xoshiro256++ PRNG seeded with `base_seed + rank`, so a rerun with the same
//! worker count reproduces every shard exactly.
//!
//! # Example
//!
//! ```
//! use dkmeans::cluster::{generate_shard, ShardSpec};
//!
//! let spec = ShardSpec { total_points: 1000, dim: 4, base_seed: 12345 };
//! let shard = generate_shard(&spec, 1, 3).unwrap();
//! assert_eq!(shard.len(), 333); // 1000 / 3, remainder dropped
//! assert!(shard.values().iter().all(|&v| (0.0..1.0).contains(&v)));
//! ```

use super::{try_with_capacity, Shard};
use crate::error::ClusterError;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Default base seed for shard generation
pub const DEFAULT_BASE_SEED: u64 = 12345;

/// Parameters shared by every worker's shard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    /// Points across all workers (before truncation)
    pub total_points: usize,
    /// Coordinates per point
    pub dim: usize,
    /// Seed that each worker offsets by its rank
    pub base_seed: u64,
}

impl ShardSpec {
    /// Points each of `world_size` workers receives
    ///
    /// Floor division: the remainder is dropped, not redistributed.
    pub fn points_per_worker(&self, world_size: usize) -> usize {
        if world_size == 0 {
            return 0;
        }
        self.total_points / world_size
    }

    /// Seed for worker `rank`
    pub fn seed_for(&self, rank: usize) -> u64 {
        self.base_seed.wrapping_add(rank as u64)
    }
}

/// Generate worker `rank`'s shard
pub fn generate_shard(spec: &ShardSpec, rank: usize, world_size: usize) -> Result<Shard, ClusterError> {
    let points = spec.points_per_worker(world_size);
    let len = points * spec.dim;

    let mut values = try_with_capacity(len, "shard")?;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(spec.seed_for(rank));
    values.extend((0..len).map(|_| rng.gen::<f64>()));

    Shard::from_values(spec.dim, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ShardSpec {
        ShardSpec {
            total_points: 100,
            dim: 3,
            base_seed: DEFAULT_BASE_SEED,
        }
    }

    #[test]
    fn test_shard_size_and_range() {
        let shard = generate_shard(&spec(), 0, 4).unwrap();
        assert_eq!(shard.len(), 25);
        assert_eq!(shard.dim(), 3);
        assert!(shard.values().iter().all(|&v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn test_shard_truncates_uneven_division() {
        let shard = generate_shard(&spec(), 2, 3).unwrap();
        assert_eq!(shard.len(), 33);
        assert_eq!(spec().points_per_worker(3) * 3, 99);
    }

    #[test]
    fn test_shard_reproducible() {
        let a = generate_shard(&spec(), 1, 4).unwrap();
        let b = generate_shard(&spec(), 1, 4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shards_differ_per_rank() {
        let a = generate_shard(&spec(), 0, 4).unwrap();
        let b = generate_shard(&spec(), 1, 4).unwrap();
        assert_ne!(a.values(), b.values());
    }

    #[test]
    fn test_seed_offsets_by_rank() {
        assert_eq!(spec().seed_for(0), 12345);
        assert_eq!(spec().seed_for(3), 12348);
    }

    #[test]
    fn test_more_workers_than_points() {
        let spec = ShardSpec {
            total_points: 3,
            dim: 2,
            base_seed: 1,
        };
        let shard = generate_shard(&spec, 0, 4).unwrap();
        assert!(shard.is_empty());
    }
}
