/// Scales a 16-bit register holding a value with 0.01 resolution.
#[inline]
pub fn centi (raw: u16) -> f64 { f64::from (raw) / 100.0 }

/// A register holding a whole number (e.g. a percentage).
#[inline]
pub fn whole (raw: u16) -> f64 { f64::from (raw) / 1.0 }

/// Composes a 32-bit quantity stored low word first.
#[inline]
pub fn compose_u32 (low: u16, high: u16) -> u32 {
    u32::from (low) | (u32::from (high) << 16)
}

/// Composes a 32-bit quantity (low word first) with 0.01 resolution.
#[inline]
pub fn centi_u32 (low: u16, high: u16) -> f64 {
    f64::from (compose_u32 (low, high)) / 100.0
}

/// Packs two byte-sized fields into one register, `high` in the MSB.
#[inline]
pub fn pack_bytes (high: u8, low: u8) -> u16 {
    (u16::from (high) << 8) | u16::from (low)
}

#[test]
fn test_centi_scaling() {
    assert_eq!(centi (0), 0.0);
    assert_eq!(centi (1234), 12.34);
    assert_eq!(centi (0xFFFF), 655.35);
    assert_eq!(whole (87), 87.0);
}

#[test]
fn test_u32_composition() {
    assert_eq!(compose_u32 (0x5678, 0x1234), 0x1234_5678);
    assert_eq!(compose_u32 (0xFFFF, 0xFFFF), u32::max_value());
    assert_eq!(centi_u32 (0x86A0, 0x0001), 1000.0);   // 100000
}

#[test]
fn test_u32_composition_uses_low_word_first() {
    for &(low, high) in &[(0u16, 0u16), (1, 0), (0, 1), (0xFFFF, 0), (0, 0xFFFF), (0x8000, 0x7FFF)] {
        let expected = (u32::from (low) | (u32::from (high) << 16)) as f64 / 100.0;
        assert_eq!(centi_u32 (low, high), expected);
    }
}

#[test]
fn test_byte_packing() {
    assert_eq!(pack_bytes (0x12, 0x34), 0x1234);
    assert_eq!(pack_bytes (59, 7), (59 << 8) + 7);
}
