//! MIME message structure and handling.

use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;
use std::fmt::Write as _;

/// Longest line allowed in a 7bit body (RFC 5322, without the CRLF).
const MAX_7BIT_LINE: usize = 998;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }

    /// Picks the encoding used when sending `text`.
    ///
    /// ASCII text with short enough lines and no carriage returns goes out
    /// as-is; everything else is quoted-printable.
    #[must_use]
    pub fn for_text(text: &str) -> Self {
        let short_lines = text.split('\n').all(|line| line.len() <= MAX_7BIT_LINE);
        if text.is_ascii() && !text.contains('\r') && short_lines {
            Self::SevenBit
        } else {
            Self::QuotedPrintable
        }
    }

    fn decode(self, body: &str) -> Result<String> {
        match self {
            Self::Base64 => {
                // Remove whitespace for lenient parsing
                let cleaned: String = body.chars().filter(|c| !c.is_whitespace()).collect();
                String::from_utf8(decode_base64(&cleaned)?).map_err(Into::into)
            }
            // Hard line breaks are CRLF on the wire and LF in memory. Data
            // carriage returns are always escaped, so a raw CR is line ending.
            Self::QuotedPrintable => decode_quoted_printable(&body.replace("\r\n", "\n")),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(body.to_string()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Line terminator used when serializing a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    /// `\r\n`, as required on the SMTP wire.
    #[default]
    Crlf,
    /// `\n`, as expected by local mail transfer agents reading a pipe.
    Lf,
}

impl LineEnding {
    /// Returns the terminator characters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crlf => "\r\n",
            Self::Lf => "\n",
        }
    }
}

/// MIME message part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    headers: Headers,
    body: String,
}

impl Part {
    /// Creates a part from headers and an already transfer-encoded body.
    #[must_use]
    pub const fn new(headers: Headers, body: String) -> Self {
        Self { headers, body }
    }

    /// Returns the part headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the transfer-encoded body.
    #[must_use]
    pub fn raw_body(&self) -> &str {
        &self.body
    }

    /// Gets the content type, defaulting to `text/plain`.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        content_type_of(&self.headers)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        transfer_encoding_of(&self.headers)
    }

    /// Gets the decoded body as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or UTF-8 conversion fails.
    pub fn body_text(&self) -> Result<String> {
        self.transfer_encoding().decode(&self.body)
    }
}

/// MIME message.
///
/// A message is never modified after it has been built or parsed; the
/// accessors only read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    headers: Headers,
    /// Parts of a multipart message, in order.
    parts: Vec<Part>,
    /// Body of a single-part message.
    body: Option<String>,
    boundary: Option<String>,
}

impl Message {
    /// Creates a single-part message with an already transfer-encoded body.
    #[must_use]
    pub(crate) const fn single_part(headers: Headers, body: String) -> Self {
        Self {
            headers,
            parts: Vec::new(),
            body: Some(body),
            boundary: None,
        }
    }

    /// Creates a multipart message.
    #[must_use]
    pub(crate) const fn multipart(headers: Headers, boundary: String, parts: Vec<Part>) -> Self {
        Self {
            headers,
            parts,
            body: None,
            boundary: Some(boundary),
        }
    }

    /// Parses a message from its wire form.
    ///
    /// Line endings are normalized to `\n`. Multipart bodies are split on
    /// the boundary declared in the `Content-Type` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type is malformed or a multipart body
    /// has no boundary or no parts.
    pub fn parse(raw: &str) -> Result<Self> {
        let (head, body) = split_head_body(raw);
        let headers = Headers::parse(&head);
        let content_type = content_type_of(&headers)?;

        if !content_type.is_multipart() {
            return Ok(Self::single_part(headers, body));
        }

        let boundary = content_type
            .boundary()
            .ok_or(Error::MissingBoundary)?
            .to_string();
        let parts = split_multipart(&body, &boundary)?;
        Ok(Self::multipart(headers, boundary, parts))
    }

    /// Returns all top-level headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the parts of a multipart message (empty for single-part).
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Gets the content type.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        content_type_of(&self.headers)
    }

    /// Checks if this is a multipart message.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        self.boundary.is_some()
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }

    /// Gets the body as text for single-part messages.
    ///
    /// # Errors
    ///
    /// Returns an error if this is a multipart message or decoding fails.
    pub fn body_text(&self) -> Result<String> {
        let body = self.body.as_ref().ok_or(Error::NotSinglePart)?;
        transfer_encoding_of(&self.headers).decode(body)
    }

    /// Finds the first text/plain part in a multipart message.
    ///
    /// # Errors
    ///
    /// Returns an error if no text part is found or decoding fails.
    pub fn text_part(&self) -> Result<String> {
        self.find_part("plain")
    }

    /// Finds the first text/html part in a multipart message.
    ///
    /// # Errors
    ///
    /// Returns an error if no HTML part is found or decoding fails.
    pub fn html_part(&self) -> Result<String> {
        self.find_part("html")
    }

    fn find_part(&self, sub_type: &str) -> Result<String> {
        for part in &self.parts {
            if part.content_type()?.is("text", sub_type) {
                return part.body_text();
            }
        }

        Err(Error::PartNotFound(sub_type.to_string()))
    }

    /// Serializes the message with CRLF line endings.
    #[must_use]
    pub fn to_wire(&self) -> String {
        self.to_wire_with(LineEnding::Crlf)
    }

    /// Serializes the message with the given line ending.
    #[must_use]
    pub fn to_wire_with(&self, line_ending: LineEnding) -> String {
        let eol = line_ending.as_str();
        let mut out = String::new();

        self.headers.write_to(&mut out, eol);
        out.push_str(eol);

        if let Some(boundary) = &self.boundary {
            for part in &self.parts {
                let _ = write!(out, "--{boundary}{eol}");
                part.headers.write_to(&mut out, eol);
                out.push_str(eol);
                push_lines(&mut out, &part.body, eol);
                out.push_str(eol);
            }
            let _ = write!(out, "--{boundary}--{eol}");
        } else if let Some(body) = &self.body {
            push_lines(&mut out, body, eol);
        }

        out
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

fn content_type_of(headers: &Headers) -> Result<ContentType> {
    headers
        .get("content-type")
        .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
}

fn transfer_encoding_of(headers: &Headers) -> TransferEncoding {
    headers
        .get("content-transfer-encoding")
        .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
}

/// Appends `text` with every line terminated by `eol` except the last.
fn push_lines(out: &mut String, text: &str, eol: &str) {
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            out.push_str(eol);
        }
        out.push_str(line.strip_suffix('\r').unwrap_or(line));
    }
}

/// Splits raw text at the first empty line into `(header block, body)`.
fn split_head_body(raw: &str) -> (String, String) {
    let lines: Vec<&str> = raw
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    match lines.iter().position(|line| line.is_empty()) {
        Some(blank) => (lines[..blank].join("\n"), lines[blank + 1..].join("\n")),
        None => (lines.join("\n"), String::new()),
    }
}

fn split_multipart(body: &str, boundary: &str) -> Result<Vec<Part>> {
    let delimiter = format!("--{boundary}");
    let close = format!("--{boundary}--");

    let mut parts = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in body.split('\n') {
        if line == close {
            break;
        }
        if line == delimiter {
            if let Some(lines) = current.take() {
                parts.push(part_from_lines(&lines));
            }
            current = Some(Vec::new());
            continue;
        }
        // Lines before the first delimiter are preamble.
        if let Some(lines) = current.as_mut() {
            lines.push(line);
        }
    }

    if let Some(lines) = current {
        parts.push(part_from_lines(&lines));
    }

    if parts.is_empty() {
        return Err(Error::InvalidMultipart(format!(
            "No parts delimited by {delimiter}"
        )));
    }

    Ok(parts)
}

fn part_from_lines(lines: &[&str]) -> Part {
    let (head, body) = split_head_body(&lines.join("\n"));
    Part::new(Headers::parse(&head), body)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("base64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("Quoted-Printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_transfer_encoding_for_text() {
        assert_eq!(TransferEncoding::for_text("hello\nworld"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::for_text("grüße"), TransferEncoding::QuotedPrintable);
        assert_eq!(
            TransferEncoding::for_text(&"x".repeat(1200)),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::for_text("a\r\nb"), TransferEncoding::QuotedPrintable);
    }

    #[test]
    fn test_part_body_text_quoted_printable() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain; charset=utf-8");
        headers.add("Content-Transfer-Encoding", "quoted-printable");
        let part = Part::new(headers, "gr=C3=BC=C3=9Fe".to_string());

        assert_eq!(part.body_text().unwrap(), "grüße");
    }

    #[test]
    fn test_parse_single_part() {
        let raw = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test\r\n",
            "\r\n",
            "Hello, World!\r\n",
            "Second line"
        );
        let message = Message::parse(raw).unwrap();

        assert_eq!(message.from(), Some("sender@example.com"));
        assert_eq!(message.to(), Some("recipient@example.com"));
        assert_eq!(message.subject(), Some("Test"));
        assert!(!message.is_multipart());
        assert_eq!(message.body_text().unwrap(), "Hello, World!\nSecond line");
    }

    #[test]
    fn test_parse_base64_body() {
        let raw = concat!(
            "Content-Type: text/plain; charset=utf-8\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "SGVsbG8s\r\n",
            "IFdvcmxkIQ==\r\n"
        );
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.body_text().unwrap(), "Hello, World!");
    }

    #[test]
    fn test_parse_multipart() {
        let raw = concat!(
            "Content-Type: multipart/alternative; boundary=\"=_b\"\r\n",
            "\r\n",
            "preamble\r\n",
            "--=_b\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "plain body\r\n",
            "--=_b\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<p>html body</p>\r\n",
            "--=_b--\r\n"
        );
        let message = Message::parse(raw).unwrap();

        assert!(message.is_multipart());
        assert_eq!(message.parts().len(), 2);
        assert_eq!(message.text_part().unwrap(), "plain body");
        assert_eq!(message.html_part().unwrap(), "<p>html body</p>");
        assert!(matches!(message.body_text(), Err(Error::NotSinglePart)));
    }

    #[test]
    fn test_parse_multipart_without_boundary() {
        let raw = "Content-Type: multipart/alternative\r\n\r\nbody";
        assert!(matches!(Message::parse(raw), Err(Error::MissingBoundary)));
    }

    #[test]
    fn test_parse_multipart_without_parts() {
        let raw = "Content-Type: multipart/alternative; boundary=x\r\n\r\nno parts here";
        assert!(matches!(
            Message::parse(raw),
            Err(Error::InvalidMultipart(_))
        ));
    }

    #[test]
    fn test_to_wire_line_endings() {
        let mut headers = Headers::new();
        headers.add("Subject", "Hi");
        let message = Message::single_part(headers, "one\r\ntwo\nthree".to_string());

        assert_eq!(message.to_wire(), "Subject: Hi\r\n\r\none\r\ntwo\r\nthree");
        assert_eq!(
            message.to_wire_with(LineEnding::Lf),
            "Subject: Hi\n\none\ntwo\nthree"
        );
    }

    #[test]
    fn test_wire_form_parses_back() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "multipart/alternative; boundary=\"=_x\"");
        let mut plain = Headers::new();
        plain.add("Content-Type", "text/plain; charset=utf-8");
        let mut html = Headers::new();
        html.add("Content-Type", "text/html; charset=utf-8");
        let message = Message::multipart(
            headers,
            "=_x".to_string(),
            vec![
                Part::new(plain, "text\n".to_string()),
                Part::new(html, "<b>text</b>".to_string()),
            ],
        );

        let parsed = Message::parse(&message.to_wire()).unwrap();
        assert_eq!(parsed, message);
    }
}
