//! Test case ordering
//!
//! `defined` keeps parser order. `random` and `random:<seed>` apply a seeded
//! Fisher-Yates shuffle. The seed string is hashed with SHA-256 into a
//! ChaCha8 seed, so a given (input, seed) pair yields the same permutation on
//! every platform.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized order type '{0}'. Should be `defined`, `random` or `random:<seed>`")]
pub struct OrderError(pub String);

/// Declared ordering policy
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OrderPolicy {
    #[default]
    Defined,
    Random { seed: Option<String> },
}

impl FromStr for OrderPolicy {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Only the first segment after the kind is the seed; later ones are ignored
        let mut parts = s.split(':');
        let kind = parts.next().unwrap_or_default();
        let seed = parts.next();
        match (kind, seed) {
            ("defined", None) => Ok(OrderPolicy::Defined),
            ("random", None) | ("random", Some("")) => Ok(OrderPolicy::Random { seed: None }),
            ("random", Some(seed)) => Ok(OrderPolicy::Random {
                seed: Some(seed.to_string()),
            }),
            _ => Err(OrderError(s.to_string())),
        }
    }
}

impl fmt::Display for OrderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderPolicy::Defined => f.write_str("defined"),
            OrderPolicy::Random { seed: None } => f.write_str("random"),
            OrderPolicy::Random { seed: Some(seed) } => write!(f, "random:{seed}"),
        }
    }
}

impl OrderPolicy {
    /// Reorder `items` in place. Returns the seed used, if any; a generated
    /// seed is also logged so the run can be reproduced.
    pub fn apply<T>(&self, items: &mut [T]) -> Option<String> {
        match self {
            OrderPolicy::Defined => None,
            OrderPolicy::Random { seed } => {
                let seed = match seed {
                    Some(seed) => seed.clone(),
                    None => {
                        let generated = rand::random_range(0..1_000_000u32).to_string();
                        warn!("Random order using seed: {generated}");
                        generated
                    }
                };
                shuffle_seeded(items, &seed);
                Some(seed)
            }
        }
    }
}

fn shuffle_seeded<T>(items: &mut [T], seed: &str) {
    let digest: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
    let mut rng = ChaCha8Rng::from_seed(digest);
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> Vec<u32> {
        (0..50).collect()
    }

    #[test]
    fn test_parse_policies() {
        assert_eq!("defined".parse::<OrderPolicy>(), Ok(OrderPolicy::Defined));
        assert_eq!(
            "random".parse::<OrderPolicy>(),
            Ok(OrderPolicy::Random { seed: None })
        );
        assert_eq!(
            "random:42".parse::<OrderPolicy>(),
            Ok(OrderPolicy::Random {
                seed: Some("42".to_string())
            })
        );
        assert_eq!("random:42".parse::<OrderPolicy>().unwrap().to_string(), "random:42");
    }

    #[test]
    fn test_seed_stops_at_next_colon() {
        assert_eq!(
            "random:a:b".parse::<OrderPolicy>(),
            Ok(OrderPolicy::Random {
                seed: Some("a".to_string())
            })
        );
    }

    #[test]
    fn test_unrecognized_policies_fail() {
        for policy in ["", "reverse", "defined:1", "Random", "shuffle:3"] {
            assert_eq!(
                policy.parse::<OrderPolicy>(),
                Err(OrderError(policy.to_string())),
                "policy {policy:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_defined_is_identity() {
        let mut items = input();
        assert_eq!(OrderPolicy::Defined.apply(&mut items), None);
        assert_eq!(items, input());
    }

    #[test]
    fn test_seeded_random_is_deterministic_permutation() {
        let policy: OrderPolicy = "random:abc".parse().unwrap();

        let mut first = input();
        let mut second = input();
        assert_eq!(policy.apply(&mut first), Some("abc".to_string()));
        policy.apply(&mut second);
        assert_eq!(first, second);
        assert_ne!(first, input());

        let mut sorted = first.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, input());
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut a = input();
        let mut b = input();
        OrderPolicy::Random {
            seed: Some("1".to_string()),
        }
        .apply(&mut a);
        OrderPolicy::Random {
            seed: Some("2".to_string()),
        }
        .apply(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_seed_reproduces_order() {
        let mut items = input();
        let seed = OrderPolicy::Random { seed: None }.apply(&mut items).unwrap();

        let mut replay = input();
        OrderPolicy::Random { seed: Some(seed) }.apply(&mut replay);
        assert_eq!(items, replay);
    }

    #[test]
    fn test_small_inputs() {
        let mut empty: Vec<u32> = Vec::new();
        OrderPolicy::Random { seed: Some("x".into()) }.apply(&mut empty);
        assert!(empty.is_empty());

        let mut one = vec![7];
        OrderPolicy::Random { seed: Some("x".into()) }.apply(&mut one);
        assert_eq!(one, vec![7]);
    }
}
