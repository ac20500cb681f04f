// ── Extended-syntax decoder ───────────────────────────────────────────────────
//
// Turns the "Extended" search mode's escape tokens into literal bytes.
// Decoding is lenient: malformed numeric escapes come out as the literal
// backslash and letter, unknown escapes pass through untouched, and a
// trailing backslash is kept.  The output is never longer than the input.

/// `(base, digit count)` for the fixed-width numeric escapes.
fn numeric_spec(letter: u8) -> Option<(u32, usize)> {
    match letter {
        b'b' => Some((2, 8)),
        b'o' => Some((8, 3)),
        b'd' => Some((10, 3)),
        b'x' => Some((16, 2)),
        b'u' => Some((16, 4)),
        _ => None,
    }
}

/// Parse exactly `digits` in `base`; hex digits are case-insensitive.
fn read_base(digits: &[u8], base: u32) -> Option<u32> {
    digits.iter().try_fold(0u32, |acc, &d| {
        let v = char::from(d).to_digit(base)?;
        Some(acc * base + v)
    })
}

/// Decode every escape token in `input`.
///
/// | token | result |
/// |---|---|
/// | `\n` `\r` `\t` `\0` `\\` | the control byte / backslash |
/// | `\bBBBBBBBB` | one byte from 8 binary digits |
/// | `\oOOO` `\dDDD` | one byte (low 8 bits) from 3 octal / decimal digits |
/// | `\xHH` | one byte from 2 hex digits |
/// | `\uHHHH` | the code point, UTF-8 encoded |
pub fn decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c != b'\\' || i + 1 == bytes.len() {
            out.push(c);
            i += 1;
            continue;
        }

        let letter = bytes[i + 1];
        i += 2;
        match letter {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'0' => out.push(0),
            b'\\' => out.push(b'\\'),
            _ => {
                let decoded = numeric_spec(letter).and_then(|(base, width)| {
                    let digits = bytes.get(i..i + width)?;
                    let value = read_base(digits, base)?;
                    Some((value, width))
                });
                match decoded {
                    Some((value, width)) if letter == b'u' => match char::from_u32(value) {
                        Some(ch) => {
                            let mut buf = [0u8; 4];
                            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                            i += width;
                        }
                        // Surrogate halves are not characters.
                        None => out.extend_from_slice(&[b'\\', letter]),
                    },
                    Some((value, width)) => {
                        out.push((value & 0xFF) as u8);
                        i += width;
                    }
                    None => out.extend_from_slice(&[b'\\', letter]),
                }
            }
        }
    }

    out
}

/// The bytes to search for: decoded when `extended` is set, raw otherwise.
pub fn decode_if(input: &str, extended: bool) -> Vec<u8> {
    if extended {
        decode(input)
    } else {
        input.as_bytes().to_vec()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
