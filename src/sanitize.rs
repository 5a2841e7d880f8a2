//! Pre-tokenization text cleanup.
//!
//! Control characters confuse WordPiece vocabularies (most map to `[UNK]`)
//! and carry no meaning for similarity search, so they are removed before
//! the tokenizer sees the text.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Which characters [`sanitize`] removes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SanitizePolicy {
    /// Unicode control characters (C0, DEL, C1), private-use code points and
    /// the U+FFFE/U+FFFF non-characters.
    #[default]
    ControlChars,
    /// Everything outside printable ASCII (U+0020..=U+007E).
    AsciiPrintable,
    /// Leave text untouched.
    Disabled,
}

impl SanitizePolicy {
    fn rejects(self, c: char) -> bool {
        match self {
            SanitizePolicy::ControlChars => {
                c.is_control() || is_private_use(c) || is_bmp_noncharacter(c)
            }
            SanitizePolicy::AsciiPrintable => !matches!(c, '\u{20}'..='\u{7E}'),
            SanitizePolicy::Disabled => false,
        }
    }
}

/// Strips the characters `policy` rejects. Borrows when nothing changes.
///
/// Idempotent: `sanitize(&sanitize(s, p), p) == sanitize(s, p)`.
pub fn sanitize(text: &str, policy: SanitizePolicy) -> Cow<'_, str> {
    if !text.chars().any(|c| policy.rejects(c)) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.chars().filter(|&c| !policy.rejects(c)).collect())
}

fn is_private_use(c: char) -> bool {
    matches!(
        c,
        '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{FFFFD}' | '\u{100000}'..='\u{10FFFD}'
    )
}

fn is_bmp_noncharacter(c: char) -> bool {
    matches!(c, '\u{FFFE}' | '\u{FFFF}')
}
