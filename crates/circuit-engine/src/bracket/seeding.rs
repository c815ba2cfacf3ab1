//! Seed-to-slot placement
//!
//! Standard bracket seeding: expand [seed 1] by repeatedly pairing every
//! entry with its complement in the doubled bracket, so the top seed can
//! only meet the second seed in the final, seeds 1 and 4 in the semifinal,
//! and so on. Slots beyond the entry count become byes, which land on the
//! top seeds by construction.

/// Smallest power of two that fits `n` participants.
pub fn bracket_size(n: u32) -> u32 {
    n.max(2).next_power_of_two()
}

/// For a bracket of `size` slots (a power of two), return the 0-based seed
/// index occupying each slot. Adjacent slot pairs form the first round.
pub fn slot_order(size: u32) -> Vec<u32> {
    debug_assert!(size.is_power_of_two());
    let mut order = vec![0u32];
    let mut current = 1u32;
    while current < size {
        current *= 2;
        let mut next = Vec::with_capacity(current as usize);
        for &seed in &order {
            next.push(seed);
            next.push(current - 1 - seed);
        }
        order = next;
    }
    order
}
