use super::*;

#[test]
fn test_padding() {
    let tests = vec![(4, 4), (2, 4), (5, 8), (8, 8), (11, 12), (1, 4), (3, 4)];
    for (input, expected) in tests {
        assert_eq!(nearest_padded_value_length(input), expected);
    }
}

#[test]
fn test_attr_type_range() {
    assert!(!ATTR_USERNAME.optional());
    assert!(!ATTR_ERROR_CODE.optional());
    assert!(ATTR_SOFTWARE.optional());
    assert!(ATTR_ALTERNATE_SERVER.optional());
}

#[test]
fn test_attributes_get() {
    let attrs = Attributes(vec![
        RawAttribute {
            typ: ATTR_USERNAME,
            length: 5,
            value: b"alice".to_vec(),
        },
        RawAttribute {
            typ: ATTR_NONCE,
            length: 8,
            value: b"deadbeef".to_vec(),
        },
    ]);

    let (got, ok) = attrs.get(ATTR_NONCE);
    assert!(ok);
    assert_eq!(got.value, b"deadbeef");

    let (_, ok) = attrs.get(ATTR_REALM);
    assert!(!ok);
}
