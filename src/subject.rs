//! Subject-line parsing — extracts bracketed control directives from
//! free text, leaving everything else as the target file path.
//!
//! The wire format is `[key:value]` tokens anywhere in the subject,
//! keys matched case-insensitively against the five recognized names.
//! Anything that is not a well-formed token with a recognized key is
//! ordinary path text, so parsing never fails on malformed input —
//! only on a subject with no path left after stripping.

use std::collections::HashMap;

use crate::error::SubjectError;

/// Recognized directive keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKey {
    CommitMsg,
    Branch,
    Author,
    Repo,
    Tag,
}

impl DirectiveKey {
    /// Match a key name case-insensitively. Unknown names are not
    /// directives.
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "commit_msg" => Some(Self::CommitMsg),
            "branch" => Some(Self::Branch),
            "author" => Some(Self::Author),
            "repo" => Some(Self::Repo),
            "tag" => Some(Self::Tag),
            _ => None,
        }
    }
}

/// A subject line split into directives and the remaining path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSubject {
    /// Extracted directives, unique per key (last occurrence wins).
    pub directives: HashMap<DirectiveKey, String>,
    /// Subject text left after stripping directive tokens, trimmed at
    /// the ends. Never empty.
    pub path: String,
}

impl ParsedSubject {
    /// Look up a directive value.
    pub fn get(&self, key: DirectiveKey) -> Option<&str> {
        self.directives.get(&key).map(String::as_str)
    }
}

/// Parse a subject line into directives and a path.
///
/// Directive tokens may appear anywhere in the subject and in any
/// order. A repeated key resolves to its last occurrence. Unknown keys
/// and malformed tokens (missing colon, unterminated bracket, bracket
/// pair crossing a newline) stay in the path as literal text.
pub fn parse(subject: &str) -> Result<ParsedSubject, SubjectError> {
    let mut directives = HashMap::new();
    let mut path = String::new();
    let mut rest = subject;

    while let Some(open) = rest.find('[') {
        match lex_token(&rest[open..]) {
            Some((key, value, token_len)) => {
                path.push_str(&rest[..open]);
                // Later occurrences overwrite earlier ones.
                directives.insert(key, value);
                rest = &rest[open + token_len..];
            }
            None => {
                // Not a directive: keep the bracket as path text and
                // resume scanning right after it.
                path.push_str(&rest[..=open]);
                rest = &rest[open + 1..];
            }
        }
    }
    path.push_str(rest);

    let path = path.trim();
    if path.is_empty() {
        return Err(SubjectError::EmptyPath);
    }

    Ok(ParsedSubject {
        directives,
        path: path.to_string(),
    })
}

/// Try to lex one `[key:value]` token at the start of `s` (which begins
/// with `[`). Returns the key, the trimmed value, and the token's byte
/// length, or `None` if the text is not a recognized directive.
///
/// The first `]` always closes the token; values cannot contain `]`.
fn lex_token(s: &str) -> Option<(DirectiveKey, String, usize)> {
    let close = s.find(']')?;
    let inner = &s[1..close];
    if inner.contains('\n') {
        return None;
    }
    let (name, value) = inner.split_once(':')?;
    let key = DirectiveKey::from_name(name)?;
    Some((key, value.trim().to_string(), close + 1))
}
