//! A small hex-dump helper for the opaque byte blobs this crate passes around: evolvable future
//! data, [crate::codec::RawInt128] magnitudes, reference payloads. Nothing here is on the
//! (de)serialization hot path; it exists purely so a caller's logging or test failure output can
//! render those blobs as something other than a `Vec<u8>` debug dump.

/// Render `bytes` as lowercase hex, grouped into 16-byte rows with a leading offset column, the
/// way a packet-capture tool would.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        out.push_str(&format!("{:08x}  ", row * 16));
        for byte in chunk {
            out.push_str(&hex::encode([*byte]));
            out.push(' ');
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_short_input_as_a_single_row() {
        let dump = hex_dump(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(dump, "00000000  de ad be ef \n");
    }

    #[test]
    fn wraps_at_sixteen_bytes_per_row() {
        let bytes: Vec<u8> = (0..20).collect();
        let dump = hex_dump(&bytes);
        assert_eq!(dump.lines().count(), 2);
        assert!(dump.starts_with("00000000"));
        assert!(dump.contains("00000010"));
    }
}
