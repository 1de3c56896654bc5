//! Response parsing: status line, header lines, chunk length lines

use crate::error::{Error, Result};

/// Trailing characters stripped from header values
const TRAILING: &[u8] = b" \t\r\n";

/// How many trailing characters of a header value are inspected
const TRAILING_WINDOW: usize = 4;

/// Parsed response status line: `<proto> <code> <message>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub protocol: String,
    /// `None` when the code is missing or not a number
    pub code: Option<u16>,
    pub message: String,
}

impl StatusLine {
    pub fn is_ok(&self) -> bool {
        self.code == Some(200)
    }

    /// NTRIP 1.0 casters answer `ICY 200 OK` and send no header block
    pub fn is_legacy(&self) -> bool {
        self.protocol == "ICY"
    }
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} {} {}", self.protocol, code, self.message),
            None => write!(f, "{} {}", self.protocol, self.message),
        }
    }
}

pub fn parse_status_line(line: &str) -> StatusLine {
    let mut parts = line.split_whitespace();
    let protocol = parts.next().unwrap_or_default().to_string();
    let code = parts.next().and_then(|c| c.parse().ok());
    let message = parts.collect::<Vec<_>>().join(" ");

    StatusLine { protocol, code, message }
}

/// Split a header line on the first `:`.
///
/// `line` is the line as received minus its final `\n`, so a trailing `\r`
/// is still present and counts against the trailing trim window. The name is
/// kept verbatim.
pub fn parse_header_line(line: &str) -> (String, String) {
    match line.split_once(':') {
        Some((name, value)) => (name.to_string(), trim_header_value(value).to_string()),
        None => (line.to_string(), String::new()),
    }
}

/// Strip leading spaces/tabs, and trailing CR/LF/space/tab found among the
/// last [`TRAILING_WINDOW`] characters only.
pub fn trim_header_value(value: &str) -> &str {
    let bytes = value.as_bytes();

    let start = bytes
        .iter()
        .position(|b| *b != b' ' && *b != b'\t')
        .unwrap_or(bytes.len());

    let floor = bytes.len().saturating_sub(TRAILING_WINDOW).max(start);
    let mut end = bytes.len();
    while end > floor && TRAILING.contains(&bytes[end - 1]) {
        end -= 1;
    }

    &value[start..end]
}

/// Whether a header turns on chunked body decoding. Case-sensitive.
pub fn is_chunked_encoding(name: &str, value: &str) -> bool {
    name == "Transfer-Encoding" && value == "chunked"
}

/// Parse the hex length at the start of a chunk-length line.
///
/// Anything after the digits (chunk extensions, the CRLF) is ignored.
pub fn parse_chunk_length(line: &[u8]) -> Result<usize> {
    let digits = line.iter().take_while(|b| b.is_ascii_hexdigit()).count();
    let invalid = || {
        Error::InvalidChunkLength(String::from_utf8_lossy(line).trim_end().to_string())
    };

    if digits == 0 {
        return Err(invalid());
    }

    let hex = std::str::from_utf8(&line[..digits]).map_err(|_| invalid())?;
    usize::from_str_radix(hex, 16).map_err(|_| invalid())
}
