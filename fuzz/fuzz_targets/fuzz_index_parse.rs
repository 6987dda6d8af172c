#![no_main]

mod utils;

use lavender_index::Index;
use libfuzzer_sys::fuzz_target;

use utils::truncate_utf8;

fuzz_target!(|data: &[u8]| {
    let Some(text) = truncate_utf8(data) else {
        return;
    };

    // Malformed input must be an error, never a panic. Anything accepted must survive a
    // write/parse cycle unchanged.
    let Ok(index) = Index::parse(text) else {
        return;
    };
    let written = index.to_text();
    let reparsed = Index::parse(&written).expect("written index must parse");
    assert_eq!(reparsed, index);
    assert_eq!(reparsed.to_text(), written);
});
