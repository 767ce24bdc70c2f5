const LCG_MULTIPLIER: u64 = 9301;
const LCG_INCREMENT: u64 = 49297;
const LCG_MODULUS: u64 = 233280;

/// Deterministic presentation-order shuffle.
///
/// The seed is folded to a 32-bit hash and drives a small linear congruential
/// generator through a Fisher-Yates pass, so a given (items, seed) pair always
/// produces the same permutation. Resumed attempts depend on this to show the
/// order from the first load. Not a source of unpredictability; never use it
/// where randomness is a security property.
pub(crate) fn shuffle_with_seed<T>(mut items: Vec<T>, seed: &str) -> Vec<T> {
    let mut state = seed_state(seed);

    for i in (1..items.len()).rev() {
        state = (state * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
        // state < modulus, so the quotient stays within [0, i].
        let j = (state * (i as u64 + 1) / LCG_MODULUS) as usize;
        items.swap(i, j);
    }

    items
}

/// Seed for ordering one attempt's questions. Reassignments mix the enrollment
/// id into the seed so a retake never repeats the order the student already saw.
pub(crate) fn attempt_seed(attempt_id: &str, enrollment_id: &str, is_reassignment: bool) -> String {
    if is_reassignment {
        format!("{attempt_id}{enrollment_id}")
    } else {
        attempt_id.to_string()
    }
}

/// Classic 32-bit string hash over UTF-16 code units, folded to its absolute
/// value so the generator state starts inside [0, 2^31].
fn seed_state(seed: &str) -> u64 {
    let mut hash: i32 = 0;
    for unit in seed.encode_utf16() {
        hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(i32::from(unit));
    }
    u64::from(hash.unsigned_abs())
}
