use gcd::Gcd;
use rand::Rng;
use std::net::Ipv4Addr;

/// Yields every address of a contiguous block exactly once, in a shuffled
/// order, without materialising the block.
///
/// The permutation walks indices `0..N` with the additive congruential step
/// `x_{i+1} = (x_i + step) % N`. `step` is coprime with `N`, so the walk is a
/// full-length cycle. `x_0` is drawn uniformly from `0..N`.
///
/// For more information: <https://en.wikipedia.org/wiki/Linear_congruential_generator>
pub struct DispatchOrder {
    active: bool,
    base: u32,
    total: u64,
    first_pick: u64,
    pick: u64,
    step: u64,
}

impl DispatchOrder {
    /// `total` addresses starting at `base`. `total` must be at least 1.
    pub fn new_random(base: u32, total: u64) -> Self {
        let step = pick_random_coprime(total);
        let first = rand::rng().random_range(0..total);

        Self {
            active: total > 0,
            base,
            total,
            first_pick: first,
            pick: first,
            step,
        }
    }
}

impl Iterator for DispatchOrder {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.active {
            return None;
        }

        let cur = self.pick;
        let next = (cur + self.step) % self.total;
        if next == self.first_pick {
            self.active = false;
        }
        self.pick = next;

        // cur < total <= 2^32, so the offset fits
        let offset = u32::try_from(cur).ok()?;
        Some(Ipv4Addr::from(self.base.wrapping_add(offset)))
    }
}

/// Two random integers are coprime roughly 61% of the time, so a few draws
/// are enough. After 10 misses fall back to `end - 1`, which is always
/// coprime with `end` but shuffles poorly.
///
/// Candidates are drawn away from the boundaries, where the walk would look
/// almost serial.
fn pick_random_coprime(end: u64) -> u64 {
    if end <= 2 {
        return 1;
    }

    let range_boundary = end / 4;
    let lower_range = range_boundary.max(1);
    let upper_range = end - range_boundary;
    let mut rng = rand::rng();

    for _ in 0..10 {
        let candidate = rng.random_range(lower_range..upper_range);
        if end.gcd(candidate) == 1 {
            return candidate;
        }
    }

    end - 1
}
