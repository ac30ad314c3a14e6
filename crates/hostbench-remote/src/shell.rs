//! POSIX shell quoting for commands nested inside ssh invocations

use shell_escape::unix::escape;
use std::borrow::Cow;

/// Quote a value for a POSIX shell using single quotes.
///
/// Embedded single quotes are closed, escaped and reopened (`'"'"'`), so the
/// result is always a single shell word.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\"'\"'");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Quote only when the value contains characters the shell would interpret
pub fn quote_if_needed(value: &str) -> String {
    escape(Cow::from(value)).into_owned()
}
