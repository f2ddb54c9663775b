use super::*;
use crate::textattrs::TextAttribute;

#[test]
fn test_message_type_value() {
    let tests = vec![
        (BINDING_REQUEST, 0x0001u16),
        (ALLOCATE_REQUEST, 0x0003),
        (
            MessageType::new(METHOD_ALLOCATE, CLASS_SUCCESS_RESPONSE),
            0x0103,
        ),
        (
            MessageType::new(METHOD_ALLOCATE, CLASS_ERROR_RESPONSE),
            0x0113,
        ),
        (SEND_INDICATION, 0x0016),
        (DATA_INDICATION, 0x0017),
        (CREATE_PERMISSION_REQUEST, 0x0008),
        (REFRESH_REQUEST, 0x0004),
    ];
    for (typ, expected) in tests {
        assert_eq!(typ.value(), expected, "{typ}");

        let mut round = MessageType::default();
        round.read_value(expected);
        assert_eq!(round, typ);
    }
}

#[test]
fn test_message_encode_decode() {
    let mut m = Message::new();
    m.build(&[
        &ALLOCATE_REQUEST,
        &TransactionId::new(),
        &TextAttribute::new(ATTR_USERNAME, "alice".to_owned()),
        &TextAttribute::new(ATTR_SOFTWARE, "sipmedia".to_owned()),
    ])
    .unwrap();

    let mut decoded = Message::new();
    decoded.unmarshal_binary(&m.raw).unwrap();

    assert_eq!(decoded, m);
    assert_eq!(decoded.get(ATTR_USERNAME).unwrap(), b"alice");
    assert!(decoded.contains(ATTR_SOFTWARE));
    assert!(!decoded.contains(ATTR_REALM));
}

#[test]
fn test_attribute_padding() {
    let mut m = Message::new();
    m.build(&[&BINDING_REQUEST, &TransactionId::new()]).unwrap();
    m.add(ATTR_NONCE, b"abc");

    // 3-byte value padded to 4 on the wire.
    assert_eq!(m.length as usize, ATTRIBUTE_HEADER_SIZE + 4);
    assert_eq!(m.raw.len(), MESSAGE_HEADER_SIZE + ATTRIBUTE_HEADER_SIZE + 4);

    let mut decoded = Message::new();
    decoded.unmarshal_binary(&m.raw).unwrap();
    assert_eq!(decoded.get(ATTR_NONCE).unwrap(), b"abc");
}

#[test]
fn test_decode_rejects_garbage() {
    let mut m = Message::new();
    assert_eq!(
        m.unmarshal_binary(&[0u8; 8]),
        Err(Error::ErrUnexpectedHeaderEof)
    );

    let mut bad_cookie = vec![0u8; MESSAGE_HEADER_SIZE];
    bad_cookie[4..8].copy_from_slice(&[1, 2, 3, 4]);
    assert_eq!(
        m.unmarshal_binary(&bad_cookie),
        Err(Error::ErrInvalidMagicCookie)
    );

    // Header claims one more attribute byte than the buffer holds.
    let mut truncated = Message::new();
    truncated
        .build(&[&BINDING_REQUEST, &TransactionId::new()])
        .unwrap();
    truncated.add(ATTR_NONCE, b"12345678");
    let short = &truncated.raw[..truncated.raw.len() - 1];
    assert_eq!(
        m.unmarshal_binary(short),
        Err(Error::ErrAttributeSizeOverflow)
    );
}

#[test]
fn test_is_message() {
    let mut m = Message::new();
    m.build(&[&BINDING_REQUEST, &TransactionId::new()]).unwrap();
    assert!(is_message(&m.raw));
    assert!(!is_message(&[0u8; 4]));
}
