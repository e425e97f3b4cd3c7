use crate::FastMap;
use crate::U256_1;
use crate::error::MathError;
use crate::math::bit_math::{least_significant_bit, most_significant_bit};
use alloy_primitives::U256;

/// Splits a compressed tick into its bitmap word index and bit position.
#[inline(always)]
pub fn position(tick: i32) -> (i16, u8) {
    ((tick >> 8) as i16, (tick & 0xff) as u8)
}

/// Returns the bitmap word stored at `word`, or zero if absent.
#[inline(always)]
pub fn get_word(bitmap: &FastMap<i16, U256>, word: i16) -> U256 {
    bitmap.get(&word).copied().unwrap_or(U256::ZERO)
}

/// Toggles the initialized flag of `tick` in the bitmap.
///
/// `tick` must be a multiple of `tick_spacing`, otherwise
/// `MathError::OutOfBounds` is returned. Words that become empty are
/// removed so the map only holds words with initialized ticks.
pub fn flip_tick(
    tick_bitmap: &mut FastMap<i16, U256>,
    tick: i32,
    tick_spacing: i32,
) -> Result<(), MathError> {
    if tick % tick_spacing != 0 {
        return Err(MathError::OutOfBounds);
    }

    let (word_pos, bit_pos) = position(tick / tick_spacing);
    let word = get_word(tick_bitmap, word_pos) ^ (U256_1 << bit_pos as usize);
    if word.is_zero() {
        tick_bitmap.remove(&word_pos);
    } else {
        tick_bitmap.insert(word_pos, word);
    }
    Ok(())
}

/// Returns whether `tick` is flagged as initialized.
pub fn is_initialized(tick_bitmap: &FastMap<i16, U256>, tick: i32, tick_spacing: i32) -> bool {
    if tick % tick_spacing != 0 {
        return false;
    }
    let (word_pos, bit_pos) = position(tick / tick_spacing);
    get_word(tick_bitmap, word_pos).bit(bit_pos as usize)
}

/// Searches the 256-bit word containing `tick` for the next initialized
/// tick at or below `tick` (`lte`) or strictly above it.
///
/// Returns the candidate tick and whether it is actually initialized. When
/// nothing is found the candidate is the word boundary, so the caller can
/// step one word at a time.
pub fn next_initialized_tick_within_one_word(
    bitmap: &FastMap<i16, U256>,
    tick: i32,
    tick_spacing: i32,
    lte: bool,
) -> Result<(i32, bool), MathError> {
    let mut compressed: i32 = tick / tick_spacing;

    // round towards negative infinity
    if tick < 0 && tick % tick_spacing != 0 {
        compressed -= 1;
    }

    if lte {
        let (word_pos, bit_pos) = position(compressed);

        // all the 1s at or to the right of the current bit_pos
        let mask: U256 = (U256_1 << bit_pos as usize) - U256_1 + (U256_1 << bit_pos as usize);
        let masked: U256 = get_word(bitmap, word_pos) & mask;

        let initialized = !masked.is_zero();

        let next: i32 = if initialized {
            (compressed - (bit_pos - most_significant_bit(masked)?) as i32) * tick_spacing
        } else {
            (compressed - bit_pos as i32) * tick_spacing
        };
        Ok((next, initialized))
    } else {
        let (word_pos, bit_pos) = position(compressed + 1);

        // all the 1s at or to the left of bit_pos
        let mask: U256 = !((U256_1 << bit_pos as usize) - U256_1);
        let masked: U256 = get_word(bitmap, word_pos) & mask;

        let initialized = !masked.is_zero();

        let next: i32 = if initialized {
            (compressed + 1 + (least_significant_bit(masked)? - bit_pos) as i32) * tick_spacing
        } else {
            (compressed + 1 + (u8::MAX - bit_pos) as i32) * tick_spacing
        };
        Ok((next, initialized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_test_ticks() -> FastMap<i16, U256> {
        let mut bitmap = FastMap::default();
        for t in [-200, -55, -4, 70, 78, 84, 139, 240, 535] {
            flip_tick(&mut bitmap, t, 1).unwrap();
        }
        bitmap
    }

    #[test]
    fn test_position() {
        assert_eq!(position(0), (0, 0));
        assert_eq!(position(255), (0, 255));
        assert_eq!(position(300), (1, 44));
        assert_eq!(position(-1), (-1, 255));
        assert_eq!(position(-256), (-1, 0));
        assert_eq!(position(-257), (-2, 255));
    }

    // ------ flip_tick ------

    #[test]
    fn test_flip_tick_round_trip_removes_empty_word() {
        let mut bm = FastMap::default();
        flip_tick(&mut bm, 78, 1).unwrap();
        assert!(is_initialized(&bm, 78, 1));
        flip_tick(&mut bm, 78, 1).unwrap();
        assert!(!is_initialized(&bm, 78, 1));
        assert!(bm.is_empty());
    }

    #[test]
    fn test_flip_tick_rejects_unspaced_tick() {
        let mut bm = FastMap::default();
        assert!(matches!(
            flip_tick(&mut bm, 61, 60),
            Err(MathError::OutOfBounds)
        ));
        flip_tick(&mut bm, -120, 60).unwrap();
        assert!(is_initialized(&bm, -120, 60));
        assert!(!is_initialized(&bm, -60, 60));
    }

    // ------ search right (lte = false) ------

    #[test]
    fn test_right_skips_current_tick() {
        let bm = init_test_ticks();
        assert_eq!(
            next_initialized_tick_within_one_word(&bm, 78, 1, false).unwrap(),
            (84, true)
        );
    }

    #[test]
    fn test_right_between_ticks() {
        let bm = init_test_ticks();
        assert_eq!(
            next_initialized_tick_within_one_word(&bm, 77, 1, false).unwrap(),
            (78, true)
        );
        assert_eq!(
            next_initialized_tick_within_one_word(&bm, -56, 1, false).unwrap(),
            (-55, true)
        );
    }

    #[test]
    fn test_right_stops_at_word_boundary() {
        let bm = init_test_ticks();
        assert_eq!(
            next_initialized_tick_within_one_word(&bm, 255, 1, false).unwrap(),
            (511, false)
        );
    }

    // ------ search left (lte = true) ------

    #[test]
    fn test_left_includes_current_tick() {
        let bm = init_test_ticks();
        assert_eq!(
            next_initialized_tick_within_one_word(&bm, 78, 1, true).unwrap(),
            (78, true)
        );
        assert_eq!(
            next_initialized_tick_within_one_word(&bm, 79, 1, true).unwrap(),
            (78, true)
        );
    }

    #[test]
    fn test_left_stops_at_word_boundary() {
        let bm = init_test_ticks();
        assert_eq!(
            next_initialized_tick_within_one_word(&bm, 258, 1, true).unwrap(),
            (256, false)
        );
        assert_eq!(
            next_initialized_tick_within_one_word(&bm, -257, 1, true).unwrap(),
            (-512, false)
        );
    }

    #[test]
    fn test_left_negative_with_spacing() {
        let mut bm = FastMap::default();
        flip_tick(&mut bm, -120, 60).unwrap();
        // -61 compresses to -2, which is the -120 bit
        assert_eq!(
            next_initialized_tick_within_one_word(&bm, -61, 60, true).unwrap(),
            (-120, true)
        );
    }
}
