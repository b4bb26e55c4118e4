//! Framing of a muninlite session transcript.
//!
//! muninlite answers a batch of commands with one continuous stream. This
//! module encodes the batch for the child's stdin and cuts the stream back
//! into one body per command.

use super::command::DATA_TERMINATOR;

/// Encode a batch of commands as newline-terminated ASCII lines.
#[must_use]
pub fn encode_commands<S: AsRef<str>>(commands: &[S]) -> Vec<u8> {
    let mut payload = Vec::new();
    for command in commands {
        payload.extend_from_slice(command.as_ref().trim().as_bytes());
        payload.push(b'\n');
    }
    payload
}

/// Drop the `# munin node at <host>` greeting from the start of a transcript.
///
/// Text that does not start with a comment line is returned unchanged.
#[must_use]
pub fn strip_banner(transcript: &str) -> &str {
    if !transcript.starts_with('#') {
        return transcript;
    }
    match transcript.split_once('\n') {
        Some((_, rest)) => rest,
        None => "",
    }
}

/// Whether the node answers `command` with a single line rather than a
/// `.`-terminated data block.
///
/// Only the command keyword counts, so `list extra` is framed like `list`.
#[must_use]
pub fn is_single_line(command: &str) -> bool {
    matches!(command.split_whitespace().next(), Some("list" | "version"))
}

/// Split a transcript into one response body per command, in order.
///
/// `list` and `version` bodies end at the next newline; every other body ends
/// at a line holding a single `.`. Terminators are not part of the returned
/// bodies. When the transcript runs out early, the first unsatisfied command
/// gets the leftover text and the remaining ones get empty strings.
#[must_use]
pub fn split_responses<S: AsRef<str>>(transcript: &str, commands: &[S]) -> Vec<String> {
    let mut remaining = strip_banner(transcript);
    let mut responses = Vec::with_capacity(commands.len());

    for command in commands {
        let (body, rest) = if is_single_line(command.as_ref()) {
            next_line(remaining)
        } else {
            next_data_block(remaining)
        };
        responses.push(body.to_string());
        remaining = rest;
    }

    responses
}

fn next_line(text: &str) -> (&str, &str) {
    text.split_once('\n').unwrap_or((text, ""))
}

fn next_data_block(text: &str) -> (&str, &str) {
    // An empty block is just the terminator line.
    if let Some(rest) = text.strip_prefix(".\n") {
        return ("", rest);
    }
    text.split_once(DATA_TERMINATOR).unwrap_or((text, ""))
}
