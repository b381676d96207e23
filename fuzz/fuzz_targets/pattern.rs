#![no_main]

use casework_core::pattern::TestPattern;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Split the input into a pattern and a name at the first NUL byte
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let (pattern, name) = s.split_once('\0').unwrap_or((s, ""));
    let compiled = TestPattern::new(pattern);
    let first = compiled.matches(name);
    assert_eq!(first, compiled.matches(name));
    if !pattern.contains('*') && name.contains(pattern) {
        assert!(first, "containment must imply a match");
    }
});
