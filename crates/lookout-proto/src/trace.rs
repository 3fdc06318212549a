use serde::{Deserialize, Serialize};

/// One frame of a call trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceCall {
    pub call: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl TraceCall {
    pub fn new(call: impl Into<String>) -> Self {
        Self {
            call: call.into(),
            file: None,
            line: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}

/// Parses the `Display` rendering of [`std::backtrace::Backtrace`].
///
/// Frame lines look like `  3: crate::module::function` and may be followed
/// by an `at path/to/file.rs:LINE:COL` line. Anything else is ignored.
pub fn parse_backtrace(text: &str) -> Vec<TraceCall> {
    let mut calls: Vec<TraceCall> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if let Some(location) = line.strip_prefix("at ") {
            if let (Some(last), Some((file, line_no))) = (calls.last_mut(), split_location(location))
            {
                if last.file.is_none() {
                    last.file = Some(file.to_string());
                    last.line = Some(line_no);
                }
            }
            continue;
        }
        let Some((index, call)) = line.split_once(": ") else {
            continue;
        };
        if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
            calls.push(TraceCall::new(call.trim()));
        }
    }
    calls
}

fn split_location(location: &str) -> Option<(&str, u32)> {
    let mut parts = location.rsplitn(3, ':');
    let col = parts.next()?;
    let line = parts.next()?;
    let file = parts.next()?;
    if col.parse::<u32>().is_err() {
        return None;
    }
    Some((file, line.parse().ok()?))
}
