#![no_main]

use libfuzzer_sys::fuzz_target;
use sieve_transport::Endpoint;

fuzz_target!(|data: &[u8]| {
    let Ok(url) = std::str::from_utf8(data) else {
        return;
    };

    // Should never panic on any input
    let Ok(endpoint) = Endpoint::parse(url) else {
        return;
    };

    assert!(!endpoint.host().is_empty());
    assert_ne!(endpoint.port(), 0);

    let reparsed = Endpoint::parse(&endpoint.to_string()).expect("display output must parse");
    assert_eq!(reparsed, endpoint);

    let _ = endpoint.channel_address(true);
    let _ = endpoint.channel_address(false);
});
