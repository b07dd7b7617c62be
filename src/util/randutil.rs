use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::Ipv4Addr;

const ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

// Inclusive code point ranges that are dense in letters.
const LETTER_RANGES: &[(u32, u32)] = &[
    (0x0041, 0x005A), // Latin upper
    (0x0061, 0x007A), // Latin lower
    (0x00C0, 0x00FF), // Latin-1 supplement
    (0x0391, 0x03C9), // Greek
    (0x0410, 0x044F), // Cyrillic
    (0x3041, 0x3096), // Hiragana
    (0x4E00, 0x9FFF), // CJK unified
];

/// Random source for message generation. Seedable for reproducible output.
#[derive(Debug, Clone)]
pub struct Rand {
    rng: StdRng,
}

impl Rand {
    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// Uniform in `[min, max)`; `min` when the range is empty.
    pub fn int_range(&mut self, min: usize, max: usize) -> usize {
        if max <= min { return min; }
        self.rng.gen_range(min..max)
    }

    pub fn below(&mut self, n: usize) -> usize {
        self.int_range(0, n)
    }

    /// `n` ASCII letters.
    pub fn alpha(&mut self, n: usize) -> String {
        (0..n)
            .map(|_| ALPHA[self.rng.gen_range(0..ALPHA.len())] as char)
            .collect()
    }

    /// `n` letters drawn from several scripts.
    pub fn unicode_letters(&mut self, n: usize) -> String {
        let mut out = String::with_capacity(n * 3);
        while out.chars().count() < n {
            let (lo, hi) = LETTER_RANGES[self.rng.gen_range(0..LETTER_RANGES.len())];
            if let Some(c) = char::from_u32(self.rng.gen_range(lo..=hi)) {
                if c.is_alphabetic() {
                    out.push(c);
                }
            }
        }
        out
    }

    /// Pick one element. `None` for an empty slice.
    pub fn select<'a, T>(&mut self, choices: &'a [T]) -> Option<&'a T> {
        if choices.is_empty() { return None; }
        Some(&choices[self.rng.gen_range(0..choices.len())])
    }

    pub fn ipv4(&mut self) -> Ipv4Addr {
        Ipv4Addr::from(self.rng.gen::<u32>())
    }
}
