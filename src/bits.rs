/// Return whether bit number `bit` is set in `x`.
pub fn test_bit(bit: u64, x: u64) -> bool {
    x & (1 << bit) != 0
}

/// Return `x` with bit number `bit` set to `v`.
pub fn bit(bit: u64, x: u64, v: bool) -> u64 {
    if v {
        x | (1 << bit)
    } else {
        x & !(1 << bit)
    }
}

/// Return the set bit numbers of a multi-word bitmap, lowest first.
pub fn bitmap_members(words: &[u32]) -> Vec<u32> {
    let mut members = Vec::new();
    for (i, word) in words.iter().enumerate() {
        for b in 0..32 {
            if test_bit(b, *word as u64) {
                members.push(i as u32 * 32 + b as u32);
            }
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear() {
        let x = bit(3, 0, true);
        assert_eq!(x, 8);
        assert!(test_bit(3, x));
        assert_eq!(bit(3, x, false), 0);
    }

    #[test]
    fn test_bitmap_members_spans_words() {
        assert_eq!(bitmap_members(&[0x12, 0x1]), vec![1, 4, 32]);
        assert!(bitmap_members(&[]).is_empty());
    }
}
