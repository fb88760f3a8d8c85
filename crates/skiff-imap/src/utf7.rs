//! Modified UTF-7 for mailbox names (RFC 3501 section 5.1.3).
//!
//! Printable ASCII other than `&` is written directly. `&` becomes `&-`.
//! Every other run of characters is written as UTF-16BE, base64 encoded with
//! `,` in place of `/` and no padding, between `&` and `-`.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

const MUTF7: GeneralPurpose = GeneralPurpose::new(
    &alphabet::IMAP_MUTF7,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

const fn is_direct(ch: char) -> bool {
    matches!(ch, ' '..='~') && ch != '&'
}

/// Encodes a UTF-8 mailbox name to modified UTF-7.
#[must_use]
pub fn encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut run: Vec<u16> = Vec::new();

    for ch in name.chars() {
        if is_direct(ch) {
            flush_run(&mut run, &mut out);
            out.push(ch);
        } else if ch == '&' {
            flush_run(&mut run, &mut out);
            out.push_str("&-");
        } else {
            let mut units = [0u16; 2];
            run.extend_from_slice(ch.encode_utf16(&mut units));
        }
    }
    flush_run(&mut run, &mut out);
    out
}

fn flush_run(run: &mut Vec<u16>, out: &mut String) {
    if run.is_empty() {
        return;
    }
    let bytes: Vec<u8> = run.iter().flat_map(|unit| unit.to_be_bytes()).collect();
    out.push('&');
    out.push_str(&MUTF7.encode(bytes));
    out.push('-');
    run.clear();
}

/// Decodes a modified UTF-7 mailbox name.
///
/// Returns `None` if a shifted run is unterminated, is not valid base64, or
/// does not hold whole UTF-16 code units. Characters outside ASCII are
/// passed through, as servers with `UTF8=ACCEPT` send them raw.
#[must_use]
pub fn decode(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let shifted = &rest[start + 1..];
        let end = shifted.find('-')?;
        let encoded = &shifted[..end];
        if encoded.is_empty() {
            out.push('&');
        } else {
            let bytes = MUTF7.decode(encoded).ok()?;
            if bytes.len() % 2 != 0 {
                return None;
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            out.push_str(&String::from_utf16(&units).ok()?);
        }
        rest = &shifted[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}
