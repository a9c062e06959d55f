//! Pitch algebra.
//!
//! Two pitch spaces are in play. A *basic* note is a diatonic index: seven per
//! octave, `0` being the tonic. A *12-TET* note counts semitones. Sheets that only
//! know white keys (letter and event formats) store basic indices, the data model
//! stores 12-TET values relative to the key note.
//!
//! ```
//! use sheets::pitch::{basic_note_to_12tet, tet12_to_basic_note};
//!
//! assert_eq!(basic_note_to_12tet(2), 4);    // third degree -> major third
//! assert_eq!(basic_note_to_12tet(-1), -1);  // leading tone one octave down
//! assert_eq!(tet12_to_basic_note(14).unwrap(), 8);
//! assert!(tet12_to_basic_note(1).is_err()); // accidental
//! ```

use crate::error::SheetError;

/// Semitones (black keys) of an octave starting at 0.
pub const SEMITONES: [i32; 5] = [1, 3, 6, 8, 10];

/// Naturals (white keys) of an octave starting at 0, indexed by basic note.
pub const NATURALS: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Split a 12-TET value into `(octave, pitch class)` with the pitch class in `0..12`.
pub fn split_octave(tet12: i32) -> (i32, i32) {
    (tet12.div_euclid(12), tet12.rem_euclid(12))
}

pub fn is_semitone(tet12: i32) -> bool {
    SEMITONES.contains(&tet12.rem_euclid(12))
}

pub fn is_natural(tet12: i32) -> bool {
    NATURALS.contains(&tet12.rem_euclid(12))
}

/// Map a basic note index to 12-TET. Defined for every integer.
pub fn basic_note_to_12tet(basic: i32) -> i32 {
    let octave = basic.div_euclid(7);
    let degree = basic.rem_euclid(7) as usize;
    NATURALS[degree] + octave * 12
}

/// Map a 12-TET value back to a basic note index.
///
/// Fails with [`SheetError::Range`] for accidentals, which have no basic index.
pub fn tet12_to_basic_note(tet12: i32) -> Result<i32, SheetError> {
    let (octave, class) = split_octave(tet12);
    let degree = NATURALS
        .iter()
        .position(|&natural| natural == class)
        .ok_or_else(|| SheetError::Range(format!("The note cannot be natural: {}", tet12)))?;
    Ok(degree as i32 + octave * 7)
}
