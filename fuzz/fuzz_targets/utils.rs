use lookout_proto::MAX_EVAL_BYTES;

/// Fuzz input cut to the largest header Lookout will decode. Larger inputs
/// only exercise the length check.
pub fn capped(data: &[u8]) -> &[u8] {
    &data[..data.len().min(MAX_EVAL_BYTES)]
}

/// [`capped`] input as text for the header markers, JSON documents and
/// backtrace text. A codepoint split by the cap is dropped; any other
/// invalid UTF-8 rejects the input.
pub fn capped_text(data: &[u8]) -> Option<&str> {
    let data = capped(data);
    match std::str::from_utf8(data) {
        Ok(text) => Some(text),
        Err(err) if err.error_len().is_none() => {
            std::str::from_utf8(&data[..err.valid_up_to()]).ok()
        }
        Err(_) => None,
    }
}
