//! HTML entity encoding with a configurable decimal/hex mix, per spec
//! §4.5: synthesized text is partially entity-encoded so that no two
//! renders of the same underlying keyword produce byte-identical markup.

use bytes::BytesMut;
use rand::Rng;

/// Writes `value` into `buf`, encoding each character as a numeric HTML
/// entity with probability `mix_ratio` (0.0 = always literal, 1.0 =
/// always encoded), alternating between decimal and hex entity forms.
pub fn write_encoded(buf: &mut BytesMut, value: &str, mix_ratio: f64) {
    let mut rng = rand::thread_rng();
    for (i, ch) in value.chars().enumerate() {
        if matches!(ch, '<' | '>' | '&' | '"' | '\'') {
            write_hex_entity(buf, ch);
            continue;
        }
        if rng.gen_bool(mix_ratio.clamp(0.0, 1.0)) {
            if i % 2 == 0 {
                write_decimal_entity(buf, ch);
            } else {
                write_hex_entity(buf, ch);
            }
        } else {
            let mut tmp = [0u8; 4];
            buf.extend_from_slice(ch.encode_utf8(&mut tmp).as_bytes());
        }
    }
}

fn write_decimal_entity(buf: &mut BytesMut, ch: char) {
    buf.extend_from_slice(format!("&#{};", ch as u32).as_bytes());
}

fn write_hex_entity(buf: &mut BytesMut, ch: char) {
    buf.extend_from_slice(format!("&#x{:x};", ch as u32).as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_zero_never_encodes_plain_characters() {
        let mut buf = BytesMut::new();
        write_encoded(&mut buf, "hello", 0.0);
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn ratio_one_always_encodes() {
        let mut buf = BytesMut::new();
        write_encoded(&mut buf, "hi", 1.0);
        let out = String::from_utf8(buf.to_vec()).unwrap();
        assert!(out.starts_with("&#"));
    }

    #[test]
    fn reserved_html_characters_are_always_encoded() {
        let mut buf = BytesMut::new();
        write_encoded(&mut buf, "<script>", 0.0);
        let out = String::from_utf8(buf.to_vec()).unwrap();
        assert!(!out.contains('<'));
        assert!(out.contains("&#x3c;"));
    }
}
