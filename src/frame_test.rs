use super::*;

#[test]
fn plain_prefix_equals_payload_length() {
    for size in [0_usize, 1, 255, 256, 65_537] {
        let payload = vec![0xAB; size];
        let frame = encode_frame(&payload, FrameLayout::Plain).unwrap();
        let prefix = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(prefix, size);
        assert_eq!(frame.len(), LENGTH_PREFIX_LEN + size);
        assert_eq!(&frame[LENGTH_PREFIX_LEN..], payload.as_slice());
    }
}

#[test]
fn plain_prefix_is_big_endian() {
    let payload = vec![0_u8; 0x0102];
    let frame = encode_frame(&payload, FrameLayout::Plain).unwrap();
    assert_eq!(&frame[..4], &[0x00, 0x00, 0x01, 0x02]);
}

#[test]
fn qt_layout_outer_length_covers_inner_prefix() {
    let payload = b"\xFF\xD8jpeg\xFF\xD9";
    let frame = encode_frame(payload, FrameLayout::QtDataStream).unwrap();
    let outer = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    let inner = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]) as usize;
    assert_eq!(inner, payload.len());
    assert_eq!(outer, inner + 4);
    assert_eq!(frame.len(), 4 + outer);
}

#[test]
fn decode_reads_consecutive_frames() {
    let mut stream = Vec::new();
    stream.extend_from_slice(&encode_frame(b"one", FrameLayout::Plain).unwrap());
    stream.extend_from_slice(&encode_frame(b"three", FrameLayout::Plain).unwrap());

    let (first, rest) = decode_frame(&stream, FrameLayout::Plain).unwrap();
    assert_eq!(first, b"one");
    let (second, rest) = decode_frame(rest, FrameLayout::Plain).unwrap();
    assert_eq!(second, b"three");
    assert!(rest.is_empty());
}

#[test]
fn decode_qt_layout_strips_inner_prefix() {
    let frame = encode_frame(b"payload", FrameLayout::QtDataStream).unwrap();
    let (payload, rest) = decode_frame(&frame, FrameLayout::QtDataStream).unwrap();
    assert_eq!(payload, b"payload");
    assert!(rest.is_empty());
}

#[test]
fn decode_rejects_truncated_body() {
    let frame = encode_frame(b"abcdef", FrameLayout::Plain).unwrap();
    let err = decode_frame(&frame[..7], FrameLayout::Plain).unwrap_err();
    assert!(matches!(err, FrameError::Truncated { needed: 6, available: 3 }));
}

#[test]
fn decode_rejects_short_prefix() {
    let err = decode_frame(&[0, 0], FrameLayout::Plain).unwrap_err();
    assert!(matches!(err, FrameError::Truncated { needed: 4, available: 2 }));
}
