//! Certificate id generation: 8 bytes of CSPRNG output, URL-safe base64,
//! retried if the first character would be `-` (to avoid argv parsing
//! ambiguity for `cert rm -<id>`-style invocations). Ported from
//! `cryptorandombytes.Base64UrlWithoutLeadingDash`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use base64::Engine;
use rand::RngCore;

pub fn new_cert_id() -> String {
    loop {
        let mut bytes = [0u8; 8];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let encoded = B64.encode(bytes);
        if !encoded.starts_with('-') {
            return encoded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_starts_with_a_dash() {
        for _ in 0..10_000 {
            assert!(!new_cert_id().starts_with('-'));
        }
    }

    #[test]
    fn is_eleven_base64_characters_for_eight_bytes() {
        // 8 bytes -> ceil(8*8/6) = 11 base64 characters, no padding.
        assert_eq!(new_cert_id().len(), 11);
    }
}
