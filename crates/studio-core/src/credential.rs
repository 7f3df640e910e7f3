//! One-time passwords handed to a newly converted client.
//!
//! Format: `Word-Word-x7k2qa`. Capitalised words from a fixed list joined by
//! `-`, then a random alphanumeric suffix that always contains a digit.

use rand::distributions::{Alphanumeric, DistString};
use rand::seq::SliceRandom;
use rand::Rng;

const WORDS: &[&str] = &[
    "Acorn", "Amber", "Aspen", "Badger", "Basil", "Beacon", "Birch", "Bramble", "Breeze",
    "Cedar", "Clover", "Comet", "Copper", "Coral", "Daisy", "Ember", "Falcon", "Fern",
    "Finch", "Fjord", "Forest", "Garnet", "Ginger", "Harbor", "Hazel", "Heron", "Indigo",
    "Juniper", "Kestrel", "Lantern", "Laurel", "Maple", "Meadow", "Misty", "Nutmeg", "Oak",
    "Otter", "Pebble", "Pepper", "Pine", "Quartz", "Raven", "River", "Robin", "Saffron",
    "Sage", "Skylark", "Sparrow", "Spruce", "Summit", "Thistle", "Timber", "Tulip", "Velvet",
    "Willow", "Wren", "Yarrow", "Zephyr",
];

/// Shortest suffix accepted; shorter values are clamped up.
pub const MIN_SUFFIX_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialPolicy {
    pub prefix_words: usize,
    pub suffix_len: usize,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            prefix_words: 2,
            suffix_len: 6,
        }
    }
}

pub fn generate(policy: CredentialPolicy) -> String {
    generate_with(&mut rand::thread_rng(), policy)
}

pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, policy: CredentialPolicy) -> String {
    let suffix_len = policy.suffix_len.max(MIN_SUFFIX_LEN);
    let mut parts: Vec<String> = WORDS
        .choose_multiple(rng, policy.prefix_words.max(1))
        .map(|w| w.to_string())
        .collect();

    let mut suffix: Vec<char> = Alphanumeric
        .sample_string(rng, suffix_len)
        .to_lowercase()
        .chars()
        .collect();
    if !suffix.iter().any(|c| c.is_ascii_digit()) {
        let pos = rng.gen_range(0..suffix.len());
        suffix[pos] = char::from(b'0' + rng.gen_range(0..10u8));
    }
    parts.push(suffix.into_iter().collect());
    parts.join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn default_shape() {
        let cred = generate(CredentialPolicy::default());
        let parts: Vec<&str> = cred.split('-').collect();
        assert_eq!(parts.len(), 3, "{cred}");
        assert!(WORDS.contains(&parts[0]));
        assert!(WORDS.contains(&parts[1]));
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn suffix_always_has_digit() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let cred = generate_with(&mut rng, CredentialPolicy::default());
            let suffix = cred.rsplit('-').next().unwrap();
            assert!(suffix.chars().any(|c| c.is_ascii_digit()), "{cred}");
        }
    }

    #[test]
    fn short_suffix_is_clamped() {
        let cred = generate(CredentialPolicy {
            prefix_words: 1,
            suffix_len: 1,
        });
        let suffix = cred.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), MIN_SUFFIX_LEN);
    }

    #[test]
    fn credentials_differ() {
        let a = generate(CredentialPolicy::default());
        let b = generate(CredentialPolicy::default());
        assert_ne!(a, b);
    }
}
