//! Stateless probe-request decoder.
//!
//! Offsets are relative to the start of the management frame: 2 bytes frame
//! control, 2 duration, 6 receiver, 6 transmitter, 6 BSSID, 2 sequence
//! control, then the tagged parameters. The buffer is untrusted and may be
//! truncated at any length; every access is bounds-checked.

use md5::{Digest, Md5};

use crate::capture::record::Record;

/// First frame-control byte of a probe request (type management, subtype 4).
const FCTL_PROBE_REQ: u8 = 0x40;
/// Transmitter address.
const OFF_MAC: usize = 10;
/// Sequence-control field.
const OFF_SEQ: usize = 22;
/// Length byte of the SSID tag.
const OFF_SSID_LEN: usize = 25;
/// First SSID byte.
const OFF_SSID: usize = 26;
/// Frame check sequence trailer.
const FCS_LEN: usize = 4;
/// HT capability region starts at this base plus the SSID length.
const HT_BASE: usize = 25 + 19;
/// Upper bound of the SSID element; longer claimed lengths are truncated.
const SSID_MAX: usize = 32;

/// Decode one captured frame. Returns `None` for anything that is not a
/// parseable probe request; never panics, whatever the buffer length.
pub fn parse(bytes: &[u8], rssi: i8, captured_at: i64) -> Option<Record> {
    if bytes.len() < OFF_SSID {
        return None;
    }
    if bytes[0] != FCTL_PROBE_REQ {
        return None;
    }

    let mut mac = [0u8; 6];
    mac.copy_from_slice(&bytes[OFF_MAC..OFF_MAC + 6]);

    // The raw length byte keeps positioning the HT field below, but the copy
    // is bounded by the element's 32-byte maximum.
    let ssid_len = bytes[OFF_SSID_LEN] as usize;
    let ssid_end = (OFF_SSID + ssid_len.min(SSID_MAX)).min(bytes.len());
    let ssid = String::from_utf8_lossy(&bytes[OFF_SSID..ssid_end]).into_owned();

    let mut hasher = Md5::new();
    hasher.update(&bytes[..bytes.len() - FCS_LEN]);
    let fingerprint: [u8; 16] = hasher.finalize().into();

    Some(Record {
        mac,
        ssid,
        captured_at,
        fingerprint,
        rssi,
        sequence: parse_sequence(bytes[OFF_SEQ], bytes[OFF_SEQ + 1]),
        ht_capabilities: parse_ht_field(bytes, ssid_len),
    })
}

/// The sequence number rides in two bytes of the sequence-control field. The
/// legacy encoding renders them as four hex characters and parses the value
/// back, keeping the low 12 bits.
fn parse_sequence(hi: u8, lo: u8) -> u16 {
    let rendered = format!("{hi:02x}{lo:02x}");
    let raw = u16::from_str_radix(&rendered, 16).unwrap_or(0);
    raw & 0x0fff
}

/// The tagged-parameter region after the SSID may carry an HT capability
/// element. The byte just before the computed start is its length tag; the
/// field is only read when that tag is nonzero and the start still lies
/// inside the body (reported length minus the FCS trailer). A DSSS parameter
/// set flag four bytes earlier shifts the read forward by three.
fn parse_ht_field(bytes: &[u8], ssid_len: usize) -> Option<[u8; 2]> {
    let ht_start = HT_BASE + ssid_len;

    let tag = *bytes.get(ht_start - 1)?;
    if tag == 0 {
        return None;
    }
    if ht_start >= bytes.len().saturating_sub(FCS_LEN) {
        return None;
    }

    let shift = if bytes.get(ht_start - 4) == Some(&1) {
        3
    } else {
        0
    };
    let a = *bytes.get(ht_start + shift)?;
    let b = *bytes.get(ht_start + shift + 1)?;
    Some([a, b])
}

/// Hex dump with a printable-ASCII gutter, 16 bytes per row. Only emitted at
/// debug level in verbose mode.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for row in bytes.chunks(16) {
        for b in row {
            out.push_str(&format!("{b:02x} "));
        }
        for _ in row.len()..16 {
            out.push_str("   ");
        }
        out.push_str("| ");
        for &b in row {
            out.push(if (32..127).contains(&b) { b as char } else { '.' });
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-built probe request: known MAC, SSID "TestNet", sequence bytes
    /// 0x12 0x3f, HT element 0x2d 0x01, 4-byte FCS trailer.
    fn golden_frame() -> Vec<u8> {
        let ssid = b"TestNet";
        let ht_start = HT_BASE + ssid.len(); // 51
        let mut frame = vec![0u8; ht_start + 2 + FCS_LEN + 3];

        frame[0] = FCTL_PROBE_REQ;
        frame[OFF_MAC..OFF_MAC + 6].copy_from_slice(&[0xaa, 0xbb, 0xcc, 0x01, 0x02, 0x03]);
        frame[OFF_SEQ] = 0x12;
        frame[OFF_SEQ + 1] = 0x3f;
        frame[24] = 0x00; // SSID tag number
        frame[OFF_SSID_LEN] = ssid.len() as u8;
        frame[OFF_SSID..OFF_SSID + ssid.len()].copy_from_slice(ssid);
        frame[ht_start - 1] = 26; // HT capability tag length
        frame[ht_start] = 0x2d;
        frame[ht_start + 1] = 0x01;
        frame
    }

    #[test]
    fn golden_frame_parses_exactly() {
        let frame = golden_frame();
        let record = parse(&frame, -68, 1_700_000_000).unwrap();

        assert_eq!(record.mac, [0xaa, 0xbb, 0xcc, 0x01, 0x02, 0x03]);
        assert_eq!(record.ssid, "TestNet");
        assert_eq!(record.captured_at, 1_700_000_000);
        assert_eq!(record.rssi, -68);
        assert_eq!(record.sequence, 0x23f);
        assert_eq!(record.ht_capabilities, Some([0x2d, 0x01]));

        let mut hasher = Md5::new();
        hasher.update(&frame[..frame.len() - FCS_LEN]);
        let expected: [u8; 16] = hasher.finalize().into();
        assert_eq!(record.fingerprint, expected);
    }

    #[test]
    fn non_probe_frames_are_ignored() {
        let mut frame = golden_frame();
        frame[0] = 0x80; // beacon
        assert!(parse(&frame, -68, 0).is_none());
    }

    #[test]
    fn dsss_parameter_shifts_the_ht_read() {
        let mut frame = golden_frame();
        let ht_start = HT_BASE + 7;
        frame[ht_start - 4] = 1;
        frame[ht_start + 3] = 0x6f;
        frame[ht_start + 4] = 0x08;
        let record = parse(&frame, -68, 0).unwrap();
        assert_eq!(record.ht_capabilities, Some([0x6f, 0x08]));
    }

    #[test]
    fn zero_ht_tag_leaves_field_absent() {
        let mut frame = golden_frame();
        frame[HT_BASE + 7 - 1] = 0;
        let record = parse(&frame, -68, 0).unwrap();
        assert_eq!(record.ht_capabilities, None);
    }

    #[test]
    fn empty_ssid_is_allowed() {
        let mut frame = golden_frame();
        frame[OFF_SSID_LEN] = 0;
        let record = parse(&frame, -68, 0).unwrap();
        assert_eq!(record.ssid, "");
    }

    #[test]
    fn truncation_sweep_never_panics() {
        let frame = golden_frame();
        let ht_start = HT_BASE + 7;
        for cut in 0..=frame.len() {
            if let Some(record) = parse(&frame[..cut], -68, 0) {
                // HT field must be absent whenever the region would fall
                // outside the body.
                if ht_start >= cut.saturating_sub(FCS_LEN) {
                    assert_eq!(record.ht_capabilities, None, "cut at {cut}");
                }
            }
        }
    }

    #[test]
    fn ssid_length_beyond_buffer_is_clamped() {
        let mut frame = golden_frame();
        frame[OFF_SSID_LEN] = 200;
        let record = parse(&frame, -68, 0).unwrap();
        assert!(record.ssid.len() <= frame.len() - OFF_SSID);
    }

    #[test]
    fn oversized_ssid_claim_is_cut_at_the_element_bound() {
        // A long body with a claimed 200-byte SSID must not leak past the
        // element's 32-byte maximum into the record.
        let mut frame = vec![0u8; 300];
        frame[0] = FCTL_PROBE_REQ;
        frame[OFF_SSID_LEN] = 200;
        for b in &mut frame[OFF_SSID..OFF_SSID + 200] {
            *b = b'x';
        }
        let record = parse(&frame, -68, 0).unwrap();
        assert_eq!(record.ssid.len(), SSID_MAX);
        assert_eq!(record.ssid, "x".repeat(SSID_MAX));
    }

    #[test]
    fn sequence_keeps_low_twelve_bits() {
        assert_eq!(parse_sequence(0xab, 0xcd), 0xbcd);
        assert_eq!(parse_sequence(0x00, 0x00), 0);
        assert_eq!(parse_sequence(0xff, 0xff), 0x0fff);
    }

    #[test]
    fn hex_dump_rows_and_gutter() {
        let dump = hex_dump(b"ABCDEFGHIJKLMNOPQ\x01");
        let mut lines = dump.lines();
        let first = lines.next().unwrap();
        assert!(first.starts_with("41 42 43"));
        assert!(first.ends_with("| ABCDEFGHIJKLMNOP"));
        assert!(lines.next().unwrap().ends_with("| Q."));
    }
}
