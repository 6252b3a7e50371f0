//! Rolling hash stored next to the primary slot as a diagnostic

/// `h = h * 31 + unit` over UTF-16 code units with 32-bit wraparound, the
/// same value a browser computes for the stored string.
pub fn rolling_checksum(text: &str) -> i32 {
    text.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

pub fn checksum_string(text: &str) -> String {
    rolling_checksum(text).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(rolling_checksum(""), 0);
        assert_eq!(rolling_checksum("a"), 97);
        assert_eq!(rolling_checksum("abc"), 96354);
        assert_eq!(checksum_string("hello world"), "1794106052");
    }

    #[test]
    fn test_wraps_instead_of_overflowing() {
        let long = "{\"inventory\":[]}".repeat(200);
        let _ = rolling_checksum(&long);
        assert_ne!(rolling_checksum("梨"), rolling_checksum("桃"));
    }
}
