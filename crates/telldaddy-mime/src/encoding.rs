//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header encoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Maximum encoded line length for Quoted-Printable, soft break included.
const MAX_LINE_LENGTH: usize = 76;

/// Largest payload per RFC 2047 encoded word, keeping each word under 75 columns.
const MAX_WORD_PAYLOAD: usize = 45;

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Each `\n` becomes a CRLF hard line break. A carriage return is always
/// data and goes out as `=0D`, so `a\r\nb` decodes back to `a\r\nb`.
/// Lines longer than the limit are split with `=` soft breaks, and
/// whitespace at the end of a line is escaped so transports cannot strip it.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            result.push_str("\r\n");
        }
        encode_qp_line(line.as_bytes(), &mut result);
    }

    result
}

fn encode_qp_line(line: &[u8], out: &mut String) {
    let mut column = 0;
    let last = line.len().saturating_sub(1);

    for (index, &byte) in line.iter().enumerate() {
        let is_blank = byte == b' ' || byte == b'\t';
        let literal = matches!(byte, b'!'..=b'<' | b'>'..=b'~') || (is_blank && index != last);
        let width = if literal { 1 } else { 3 };

        // One column is reserved for the soft break itself.
        if column + width > MAX_LINE_LENGTH - 1 {
            out.push_str("=\r\n");
            column = 0;
        }

        if literal {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        column += width;
    }
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// Line breaks are taken as written; callers reading wire text normalize
/// CRLF hard breaks first.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences or the
/// decoded bytes are not UTF-8.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break
        if bytes.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }
        if bytes.get(i + 1..i + 3) == Some(b"\r\n".as_slice()) {
            i += 3;
            continue;
        }

        // Hex encoded byte
        let hex = bytes
            .get(i + 1..i + 3)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let hex = std::str::from_utf8(hex)
            .map_err(|_| Error::InvalidEncoding("Non-ASCII escape sequence".to_string()))?;
        let byte = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(byte);
        i += 3;
    }

    String::from_utf8(result).map_err(Into::into)
}

/// Encodes a header value using RFC 2047 encoding when it needs it.
///
/// Plain ASCII passes through untouched. Anything else becomes one or more
/// `=?charset?B?...?=` words separated by spaces, split on character
/// boundaries. Values holding CR or LF are always encoded, so the result
/// never contains a line break.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if text.is_ascii() && !text.contains("=?") && !text.contains(['\r', '\n']) {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > MAX_WORD_PAYLOAD {
            words.push(format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())));
    }

    words.join(" ")
}

/// Decodes an RFC 2047 header value.
///
/// Whitespace between two adjacent encoded words is dropped; everything
/// else is kept as written.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    if !text.contains("=?") {
        return Ok(text.to_string());
    }

    let mut result = String::with_capacity(text.len());
    let mut previous_encoded = false;

    for (index, token) in text.split(' ').enumerate() {
        let encoded = is_encoded_word(token);
        if index > 0 && !(encoded && previous_encoded) {
            result.push(' ');
        }
        if encoded {
            result.push_str(&decode_word(token)?);
        } else {
            result.push_str(token);
        }
        previous_encoded = encoded;
    }

    Ok(result)
}

fn is_encoded_word(token: &str) -> bool {
    token.len() > 4 && token.starts_with("=?") && token.ends_with("?=")
}

fn decode_word(word: &str) -> Result<String> {
    let inner = &word[2..word.len() - 2];
    let parts: Vec<&str> = inner.split('?').collect();

    if parts.len() != 3 {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    }

    let encoding = parts[1].to_uppercase();
    let encoded_text = parts[2];

    match encoding.as_str() {
        "B" => {
            let decoded = decode_base64(encoded_text)?;
            String::from_utf8(decoded).map_err(Into::into)
        }
        "Q" => {
            // Q encoding writes spaces as underscores
            let text_with_spaces = encoded_text.replace('_', " ");
            decode_quoted_printable(&text_with_spaces)
        }
        _ => Err(Error::InvalidEncoding(format!(
            "Unknown encoding: {encoding}"
        ))),
    }
}
