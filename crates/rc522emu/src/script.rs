//! Session scripts for the replay CLI.
//!
//! One chip-select session per line, written as hex MOSI bytes. An optional
//! `=> ...` suffix gives the expected MISO bytes, where `xx` matches any
//! byte. `#` starts a comment.
//!
//! ```text
//! # VersionReg
//! EE 00 => xx 92
//! ```

/// Marks a don't-care byte in an expected MISO sequence
const WILDCARD: &str = "xx";

/// Errors that can occur while parsing a script
#[derive(Debug, PartialEq)]
pub enum ScriptError {
    /// A token is not a sequence of hex byte pairs
    InvalidHex { line: usize, token: String },
    /// Expected MISO has a different length than the MOSI bytes
    LengthMismatch {
        line: usize,
        mosi: usize,
        expected: usize,
    },
    /// `=>` with nothing before it
    MissingMosi { line: usize },
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::InvalidHex { line, token } => {
                write!(f, "line {}: invalid hex token {:?}", line, token)
            }
            ScriptError::LengthMismatch {
                line,
                mosi,
                expected,
            } => write!(
                f,
                "line {}: {} MOSI bytes but {} expected MISO bytes",
                line, mosi, expected
            ),
            ScriptError::MissingMosi { line } => write!(f, "line {}: no MOSI bytes", line),
        }
    }
}

impl std::error::Error for ScriptError {}

/// One scripted chip-select session
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptSession {
    /// 1-based source line
    pub line: usize,
    pub mosi: Vec<u8>,
    /// Expected MISO, `None` entries match anything
    pub expected: Option<Vec<Option<u8>>>,
}

impl ScriptSession {
    /// True if `miso` satisfies the expectation (always true without one)
    pub fn matches(&self, miso: &[u8]) -> bool {
        match &self.expected {
            None => true,
            Some(expected) => {
                expected.len() == miso.len()
                    && expected
                        .iter()
                        .zip(miso)
                        .all(|(&want, &got)| want.is_none_or(|want| want == got))
            }
        }
    }

    /// Expected bytes in script notation
    pub fn expected_display(&self) -> String {
        match &self.expected {
            None => "nothing".to_string(),
            Some(expected) => expected
                .iter()
                .map(|byte| match byte {
                    Some(byte) => format!("{:02X}", byte),
                    None => WILDCARD.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Parse a whole script
pub fn parse_script(text: &str) -> Result<Vec<ScriptSession>, ScriptError> {
    let mut sessions = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        let (mosi_text, expected_text) = match content.split_once("=>") {
            Some((mosi, expected)) => (mosi, Some(expected)),
            None => (content, None),
        };

        let mosi: Vec<u8> = parse_bytes(mosi_text, line, false)?
            .into_iter()
            .flatten()
            .collect();
        if mosi.is_empty() {
            return Err(ScriptError::MissingMosi { line });
        }

        let expected = match expected_text {
            Some(text) => {
                let expected = parse_bytes(text, line, true)?;
                if expected.len() != mosi.len() {
                    return Err(ScriptError::LengthMismatch {
                        line,
                        mosi: mosi.len(),
                        expected: expected.len(),
                    });
                }
                Some(expected)
            }
            None => None,
        };

        sessions.push(ScriptSession {
            line,
            mosi,
            expected,
        });
    }

    Ok(sessions)
}

/// Parse whitespace separated hex tokens. A token may hold several bytes
/// ("9370"). With `wildcards`, a pair of `xx` yields `None`.
fn parse_bytes(text: &str, line: usize, wildcards: bool) -> Result<Vec<Option<u8>>, ScriptError> {
    let mut bytes = Vec::new();

    for token in text.split_whitespace() {
        let invalid = || ScriptError::InvalidHex {
            line,
            token: token.to_string(),
        };
        let digits = token.strip_prefix("0x").unwrap_or(token);
        if digits.is_empty() || digits.len() % 2 != 0 || !digits.is_ascii() {
            return Err(invalid());
        }

        for pair in digits.as_bytes().chunks(2) {
            let pair = std::str::from_utf8(pair).map_err(|_| invalid())?;
            if wildcards && pair.eq_ignore_ascii_case(WILDCARD) {
                bytes.push(None);
            } else {
                let byte = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
                bytes.push(Some(byte));
            }
        }
    }

    Ok(bytes)
}
