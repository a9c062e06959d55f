use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::SheetError;
use crate::notation::{HitAction, KeyLayout, MusicNotation};

const MS_PER_MINUTE: i64 = 60_000;

/// Find the transposition that puts every pitch of `notation` on a key of `layout`.
///
/// Offsets are tried from the smallest non-negative one upwards, then from `-1`
/// downwards, so the result is the feasible offset closest to "no change" with
/// upward shifts preferred.
pub fn find_suitable_offset(notation: &MusicNotation, layout: &KeyLayout) -> Result<i32, SheetError> {
    let producer: HashSet<i32> = layout.pitches().collect();
    let (min_producer, max_producer) = match (producer.iter().min(), producer.iter().max()) {
        (Some(&min), Some(&max)) => (min, max),
        _ => return Err(SheetError::MissingKey),
    };

    let consumer: HashSet<i32> = notation.absolute_tones().collect();
    let (min_consumer, max_consumer) = match (consumer.iter().min(), consumer.iter().max()) {
        (Some(&min), Some(&max)) => (min, max),
        _ => return Ok(0),
    };

    // Aligning the lowest (highest) pitches bounds the search
    let min_offset = min_producer - min_consumer;
    let max_offset = max_producer - max_consumer;

    let fits = |offset: i32| consumer.iter().all(|pitch| producer.contains(&(pitch + offset)));

    let found = (min_offset.max(0)..=max_offset)
        .find(|&offset| fits(offset))
        .or_else(|| {
            (min_offset..=max_offset.min(-1))
                .rev()
                .find(|&offset| fits(offset))
        });

    match found {
        Some(offset) => {
            debug!("transposing '{}' by {} semitones", notation.name, offset);
            Ok(offset)
        }
        None => Err(SheetError::MissingKey),
    }
}

/// Resolve every beat of `notation` to key presses on `layout`.
///
/// Delays are truncated to whole milliseconds: `floor(a * 60000 / (bpm * b))`.
pub fn create_hit_actions(notation: &MusicNotation, layout: &KeyLayout) -> Result<Vec<HitAction>, SheetError> {
    if notation.bpm == 0 {
        return Err(SheetError::Range("\"bpm\" must be greater than 0".to_string()));
    }
    let offset = find_suitable_offset(notation, layout)?;

    let keys_by_pitch: HashMap<i32, usize> = layout
        .pitches()
        .enumerate()
        .map(|(index, pitch)| (pitch, index))
        .collect();

    notation
        .beats
        .iter()
        .map(|beat| {
            let locations = beat
                .tones
                .iter()
                .map(|tone| {
                    keys_by_pitch
                        .get(&(tone + notation.key_note + offset))
                        .copied()
                        .ok_or(SheetError::MissingKey)
                })
                .collect::<Result<Vec<_>, _>>()?;

            let rate = beat.rate;
            // i128 holds both products for any i64 rate and u32 bpm
            let delay = (rate.numerator() as i128 * MS_PER_MINUTE as i128)
                .div_euclid(notation.bpm as i128 * rate.denominator() as i128);
            if delay < 0 {
                return Err(SheetError::Range(format!("Negative beat duration: {}", rate)));
            }
            let post_delay = u64::try_from(delay)
                .map_err(|_| SheetError::Range(format!("Beat duration is too long: {}", rate)))?;

            Ok(HitAction { locations, post_delay })
        })
        .collect()
}
