#![forbid(unsafe_code)]

use rand::Rng;
use rand::rngs::ThreadRng;

/// Source of the random choices made while picking a channel and a short.
pub trait Randomness {
    /// Returns an index in `0..len`. Callers never pass `len == 0`.
    fn pick_index(&mut self, len: usize) -> usize;

    fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T>
    where
        Self: Sized,
    {
        if items.is_empty() {
            return None;
        }
        items.get(self.pick_index(items.len()))
    }
}

/// Uniform choices from the thread-local generator.
#[derive(Debug, Default)]
pub struct ThreadRandomness {
    rng: ThreadRng,
}

impl ThreadRandomness {
    pub fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }
}

impl Randomness for ThreadRandomness {
    fn pick_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(usize);

    impl Randomness for Fixed {
        fn pick_index(&mut self, len: usize) -> usize {
            self.0.min(len - 1)
        }
    }

    #[test]
    fn choose_on_empty_slice_is_none() {
        let items: [u8; 0] = [];
        assert!(Fixed(0).choose(&items).is_none());
        assert!(ThreadRandomness::new().choose(&items).is_none());
    }

    #[test]
    fn choose_uses_picked_index() {
        assert_eq!(Fixed(2).choose(&["a", "b", "c"]), Some(&"c"));
    }

    #[test]
    fn thread_randomness_stays_in_bounds() {
        let mut rng = ThreadRandomness::new();
        for len in 1..50 {
            assert!(rng.pick_index(len) < len);
        }
    }
}
