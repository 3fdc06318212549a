#![no_main]

use libfuzzer_sys::fuzz_target;
use lookout_proto::{ClientHello, EvalRequest, PostponedEntry, ResponseFrame};

mod utils;

fuzz_target!(|data: &[u8]| {
    // Stored entries are raw bytes; only the header markers need to be text.
    let _ = PostponedEntry::from_bytes(utils::capped(data));

    let Some(text) = utils::capped_text(data) else {
        return;
    };

    // Anything that decodes must survive a second trip through the codec.
    if let Ok(hello) = ClientHello::decode(text) {
        let encoded = hello.encode().expect("decoded hello re-encodes");
        let again = ClientHello::decode(&encoded).expect("re-encoded hello decodes");
        assert_eq!(hello, again);
    }
    if let Ok(request) = EvalRequest::decode(text) {
        let encoded = request.encode().expect("decoded eval request re-encodes");
        let again = EvalRequest::decode(&encoded).expect("re-encoded eval request decodes");
        assert_eq!(request, again);
    }
    let _ = ResponseFrame::decode(text);
});
