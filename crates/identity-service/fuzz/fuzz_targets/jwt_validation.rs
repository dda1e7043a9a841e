#![no_main]

use common::jwt::{decode_claims, split_token, AccessClaims};
use libfuzzer_sys::fuzz_target;

// Untrusted bearer tokens go through these two functions before any
// signature check; neither may panic on arbitrary input.
fuzz_target!(|data: &[u8]| {
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(segments) = split_token(token) {
        assert!(segments.signing_input.len() < token.len());
        let _ = decode_claims::<AccessClaims>(segments.payload);
    }

    // Raw payloads as well, without a valid header in front.
    let _ = decode_claims::<AccessClaims>(token);
});
