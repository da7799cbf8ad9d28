use rand::RngCore;

/// `len` random bytes rendered as lowercase hex, two characters per byte.
pub fn random_hex<R: RngCore + ?Sized>(rng: &mut R, len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;

    use super::*;

    #[test]
    fn test_random_hex_length_and_alphabet() {
        let hex = random_hex(&mut rand::thread_rng(), 32);

        assert_eq!(hex.len(), 64);
        assert!(hex
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_random_hex_pads_small_bytes() {
        // StepRng yields zero bytes first, which must still render as two chars each
        let hex = random_hex(&mut StepRng::new(0, 0), 3);

        assert_eq!(hex, "000000");
    }
}
