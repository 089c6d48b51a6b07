//! RNG module - seeded 7-bag piece generation
//!
//! Each bag contains one of each piece (I, O, T, S, Z, J, L), shuffled with a
//! small LCG so that a seed fully determines the piece sequence.

use arrayvec::ArrayVec;

use crate::types::PieceKind;

/// Simple LCG (Linear Congruential Generator) RNG
/// Uses constants from Numerical Recipes
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u32,
}

impl SimpleRng {
    /// Create a new RNG with the given seed
    pub fn new(seed: u32) -> Self {
        // Avoid 0 seed which would produce all zeros
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u32
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.state
    }

    /// Generate random value in range [0, max)
    pub fn next_range(&mut self, max: u32) -> u32 {
        self.next_u32() % max
    }

    /// Shuffle a slice using Fisher-Yates
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_range((i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }
}

/// 7-bag piece generator
#[derive(Debug, Clone)]
pub struct SevenBag {
    bag: [PieceKind; 7],
    bag_index: usize,
    rng: SimpleRng,
    seed: u32,
}

impl SevenBag {
    pub fn new(seed: u32) -> Self {
        let mut bag = Self {
            bag: PieceKind::ALL,
            bag_index: 0,
            rng: SimpleRng::new(seed),
            seed,
        };
        bag.refill();
        bag
    }

    fn refill(&mut self) {
        self.bag = PieceKind::ALL;
        self.rng.shuffle(&mut self.bag);
        self.bag_index = 0;
    }

    /// Draw the next piece, starting a fresh bag when the current one is spent
    pub fn draw(&mut self) -> PieceKind {
        if self.bag_index >= self.bag.len() {
            self.refill();
        }
        let piece = self.bag[self.bag_index];
        self.bag_index += 1;
        piece
    }

    /// Pieces still undrawn in the current bag, in draw order.
    ///
    /// Empty right after a bag is exhausted; the next draw starts a new bag.
    pub fn bag_state(&self) -> ArrayVec<PieceKind, 7> {
        self.bag[self.bag_index.min(self.bag.len())..]
            .iter()
            .copied()
            .collect()
    }

    /// Seed this generator was created with
    pub fn seed(&self) -> u32 {
        self.seed
    }
}

impl Default for SevenBag {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_deterministic() {
        let mut rng1 = SimpleRng::new(12345);
        let mut rng2 = SimpleRng::new(12345);
        for _ in 0..100 {
            assert_eq!(rng1.next_u32(), rng2.next_u32());
        }
    }

    #[test]
    fn test_bag_draws_all_seven() {
        let mut bag = SevenBag::new(1);
        let mut drawn: Vec<PieceKind> = (0..7).map(|_| bag.draw()).collect();
        drawn.sort();
        let mut all = PieceKind::ALL.to_vec();
        all.sort();
        assert_eq!(drawn, all);
    }

    #[test]
    fn test_bag_state_shrinks_with_draws() {
        let mut bag = SevenBag::new(7);
        assert_eq!(bag.bag_state().len(), 7);
        let first = bag.draw();
        let state = bag.bag_state();
        assert_eq!(state.len(), 6);
        assert!(!state.contains(&first));

        for _ in 0..6 {
            bag.draw();
        }
        assert!(bag.bag_state().is_empty());
        bag.draw();
        assert_eq!(bag.bag_state().len(), 6);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SevenBag::new(99);
        let mut b = SevenBag::new(99);
        for _ in 0..30 {
            assert_eq!(a.draw(), b.draw());
        }
        assert_eq!(a.seed(), 99);
    }
}
