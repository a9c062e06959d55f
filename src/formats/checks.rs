//! Validators shared by several formats.

use crate::error::SheetError;

/// Tempo must be a positive integer that fits the data model.
pub fn check_bpm(bpm: i64) -> Result<u32, SheetError> {
    if bpm <= 0 {
        return Err(SheetError::Range("\"bpm\" must be greater than 0".to_string()));
    }
    u32::try_from(bpm).map_err(|_| SheetError::Range(format!("\"bpm\" is too large: {}", bpm)))
}

/// Pitch level is the key note's pitch class.
pub fn check_pitch_level(pitch_level: i64) -> Result<i32, SheetError> {
    if !(0..=11).contains(&pitch_level) {
        return Err(SheetError::Range("\"pitchLevel\" is out of range [0, 11]".to_string()));
    }
    Ok(pitch_level as i32)
}

/// Parse a whole token as an integer, naming `field` in the error.
pub fn integer_field(token: Option<&str>, field: &str) -> Result<i64, SheetError> {
    token
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| SheetError::Type(format!("\"{}\" must be an integer", field)))
}

/// Strip the extension from a file name. With `marker` (e.g. `.yp.`) everything from the
/// last occurrence of the marker is removed instead, when present.
pub fn file_stem<'a>(filename: &'a str, marker: Option<&str>) -> &'a str {
    let end = marker
        .and_then(|marker| filename.rfind(marker))
        .or_else(|| filename.rfind('.'))
        .filter(|&end| end > 0);
    match end {
        Some(end) => &filename[..end],
        None => filename,
    }
}
