//! Fuzz target for truncated-payload recovery.
//!
//! Feeds arbitrary text through every schema profile's recovery and checks
//! that a successful result is always a JSON object.
//!
//! Run with: cargo +nightly fuzz run recovery_fuzz -- -max_total_time=60

#![no_main]

use fincache_core::DocumentClass;
use fincache_llm::{PayloadRecovery, SchemaProfile};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        for class in DocumentClass::ALL {
            let recovery = PayloadRecovery::for_profile(SchemaProfile::for_class(class));

            // Recovery must never panic, whatever the generator emitted.
            if let Ok(recovered) = recovery.recover(input) {
                assert!(recovered.value.is_object(), "Recovered payload must be an object");
            }
        }
    }
});
