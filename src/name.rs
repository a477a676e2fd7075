use core::cmp::Ordering;

use crate::{LongName, ShortName};

/// Rebuild a display string from the fixed 8+3 raw name field.
///
/// Pad spaces are skipped and the dot is inserted only when the record
/// carries an extension, so `"PART1   GCO"` becomes `"PART1.GCO"` and
/// `"SUB        "` stays `"SUB"`.
pub fn decode_short_name(raw: &[u8; 11]) -> ShortName {
    let mut out = ShortName::new();
    for (i, &byte) in raw.iter().enumerate() {
        if byte == b' ' {
            continue;
        }
        if i == 8 {
            // Capacity covers 8 + '.' + 3, pushes cannot fail.
            let _ = out.push('.');
        }
        let _ = out.push(byte as char);
    }
    out
}

/// Append `text`, clamping with a trailing ellipsis when it cannot fit.
/// Truncation is degraded display, never an error.
pub fn append_clamped(out: &mut LongName, text: &str) {
    for c in text.chars() {
        if out.push(c).is_ok() {
            continue;
        }
        while out.pop().is_some() {
            if out.push('…').is_ok() {
                return;
            }
        }
        return;
    }
}

/// Clamp an arbitrary path segment into a short-name buffer, for error
/// reporting on segments that never resolved to a record.
pub(crate) fn clip_short(name: &str) -> ShortName {
    let mut out = ShortName::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// The name shown to the operator: the long name when the record has one,
/// the decoded 8.3 name otherwise.
pub fn display_name<'a>(short: &'a str, long: &'a str) -> &'a str {
    if long.is_empty() {
        short
    } else {
        long
    }
}

/// Case-insensitive lexicographic order over ASCII, byte-wise beyond that.
pub fn name_cmp(a: &str, b: &str) -> Ordering {
    let mut rhs = b.bytes();
    for x in a.bytes() {
        match rhs.next() {
            None => return Ordering::Greater,
            Some(y) => match x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase()) {
                Ordering::Equal => {}
                other => return other,
            },
        }
    }
    if rhs.next().is_some() {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}
