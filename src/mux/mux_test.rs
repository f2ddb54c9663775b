use super::*;

#[test]
fn test_classify_first_byte_ranges() {
    // STUN: 0..19
    assert_eq!(classify(&[0x00, 0x01, 0, 0]), Some(PacketKind::Stun));
    assert_eq!(classify(&[19, 0, 0, 0]), Some(PacketKind::Stun));
    // DTLS: 20..63
    assert_eq!(classify(&[20, 0xfe, 0xfd]), Some(PacketKind::Dtls));
    assert_eq!(classify(&[22, 0xfe, 0xfd]), Some(PacketKind::Dtls));
    assert_eq!(classify(&[63, 0, 0]), Some(PacketKind::Dtls));
    // Reserved: 64..127
    assert_eq!(classify(&[64, 0]), None);
    assert_eq!(classify(&[127, 0]), None);
    // RTP/RTCP: 128..191
    assert_eq!(classify(&[0x80, 0x60]), Some(PacketKind::Rtp));
    assert_eq!(classify(&[191, 0x00]), Some(PacketKind::Rtp));
    // Out of range
    assert_eq!(classify(&[192, 0]), None);
    assert_eq!(classify(&[255, 0]), None);
    assert_eq!(classify(&[]), None);
}

#[test]
fn test_classify_rtcp_payload_types() {
    // RTCP packet types 200..207 appear as 64..95 in the low 7 bits.
    for pt in [200u8, 201, 202, 203, 204, 205, 206, 207] {
        assert_eq!(
            classify(&[0x80, pt]),
            Some(PacketKind::Rtcp),
            "packet type {pt}"
        );
    }
    // Common dynamic RTP payload types stay RTP.
    for pt in [0u8, 8, 96, 111, 127] {
        assert_eq!(classify(&[0x80, pt]), Some(PacketKind::Rtp), "pt {pt}");
        assert_eq!(
            classify(&[0x80, pt | 0x80]),
            Some(PacketKind::Rtp),
            "pt {pt} with marker"
        );
    }
}
