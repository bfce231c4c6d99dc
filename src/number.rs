use crate::error::PictorError;

/// Result of one lexer run: the numbers collected plus the index of the
/// terminating command letter or `)`, so the caller can resume there.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberScan {
    pub values: Vec<f32>,
    pub resume: usize,
}

fn is_terminator(b: u8) -> bool {
    matches!(
        b,
        b'M' | b'm'
            | b'Z'
            | b'z'
            | b'L'
            | b'l'
            | b'H'
            | b'h'
            | b'V'
            | b'v'
            | b'C'
            | b'c'
            | b'S'
            | b's'
            | b'Q'
            | b'q'
            | b'T'
            | b't'
            | b'A'
            | b'a'
            | b')'
    )
}

fn flush(token: &str, values: &mut Vec<f32>) -> Result<(), PictorError> {
    if token.trim().is_empty() {
        return Ok(());
    }
    let value = token
        .trim()
        .parse::<f32>()
        .map_err(|_| PictorError::MalformedNumber(token.to_string()))?;
    values.push(value);
    Ok(())
}

/// Lexes SVG's compact number lists: values separated by whitespace, a
/// comma, or nothing at all when the next value is self-delimiting (a
/// leading `-`). Stops before the next path command letter or `)`.
pub fn scan_numbers(s: &str, from: usize) -> Result<NumberScan, PictorError> {
    let bytes = s.as_bytes();
    let mut values = Vec::new();
    let mut start = from;
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        if is_terminator(b) {
            flush(&s[start..i], &mut values)?;
            return Ok(NumberScan { values, resume: i });
        }
        match b {
            b' ' | b'\t' | b'\n' | b'\r' | b',' => {
                flush(&s[start..i], &mut values)?;
                start = i + 1;
            }
            b'-' => {
                // A minus both ends the current number and starts the
                // next one, with no delimiter in between ("1-2" is 1, -2).
                if !s[start..i].trim().is_empty() {
                    flush(&s[start..i], &mut values)?;
                    start = i;
                }
            }
            _ => {}
        }
        i += 1;
    }

    flush(&s[start..], &mut values)?;
    Ok(NumberScan {
        values,
        resume: bytes.len(),
    })
}

/// Convenience wrapper for attributes that are pure number lists
/// (viewBox, polygon points).
pub fn parse_number_list(s: &str) -> Result<Vec<f32>, PictorError> {
    Ok(scan_numbers(s, 0)?.values)
}
