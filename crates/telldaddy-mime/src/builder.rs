//! Construction of outgoing notification messages.
//!
//! Building never fails: addresses are taken as given and only the
//! structure of the envelope is produced here.

use crate::content_type::ContentType;
use crate::encoding::encode_quoted_printable;
use crate::header::Headers;
use crate::message::{Message, Part, TransferEncoding};
use chrono::{DateTime, FixedOffset, Local};
use rand::RngCore;

/// Builds a single-part `text/plain` message.
#[must_use]
pub fn build_plain(
    from: impl Into<String>,
    to: impl Into<String>,
    subject: impl Into<String>,
    body: impl Into<String>,
) -> Message {
    MessageBuilder::new()
        .from(from)
        .to(to)
        .subject(subject)
        .text_body(body)
        .build()
}

/// Builds a `multipart/alternative` message with the plain part first and
/// the HTML part second.
#[must_use]
pub fn build_alternative(
    from: impl Into<String>,
    to: impl Into<String>,
    subject: impl Into<String>,
    body_text: impl Into<String>,
    body_html: impl Into<String>,
) -> Message {
    MessageBuilder::new()
        .from(from)
        .to(to)
        .subject(subject)
        .text_body(body_text)
        .html_body(body_html)
        .build()
}

/// Fluent builder for outgoing messages.
///
/// With an HTML body the result is `multipart/alternative`; without one it
/// is a single `text/plain` part.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: String,
    to: String,
    subject: String,
    date: Option<DateTime<FixedOffset>>,
    text_body: String,
    html_body: Option<String>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `From` header.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    /// Sets the `To` header (single recipient).
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = to.into();
        self
    }

    /// Sets the `Subject` header.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Overrides the `Date` header, which otherwise is the build time.
    #[must_use]
    pub fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Sets the plain text body.
    #[must_use]
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = body.into();
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    /// Builds the message.
    #[must_use]
    pub fn build(self) -> Message {
        let date = self
            .date
            .map_or_else(|| Local::now().to_rfc2822(), |date| date.to_rfc2822());

        let mut headers = Headers::new();
        headers.add("Subject", self.subject);
        headers.add("From", self.from);
        headers.add("To", self.to);
        headers.add("Date", date);
        headers.add("MIME-Version", "1.0");

        match self.html_body {
            None => {
                let (content_headers, body) = text_entity(ContentType::text_plain(), &self.text_body);
                for (name, value) in content_headers.iter() {
                    headers.add(name, value);
                }
                Message::single_part(headers, body)
            }
            Some(html) => {
                let boundary = boundary_for(&[&self.text_body, &html]);
                headers.add(
                    "Content-Type",
                    ContentType::multipart_alternative(boundary.as_str()).to_string(),
                );

                // Least preferred rendering first.
                let parts = [
                    (ContentType::text_plain(), self.text_body.as_str()),
                    (ContentType::text_html(), html.as_str()),
                ]
                .into_iter()
                .map(|(content_type, text)| {
                    let (part_headers, body) = text_entity(content_type, text);
                    Part::new(part_headers, body)
                })
                .collect();

                Message::multipart(headers, boundary, parts)
            }
        }
    }
}

/// Produces the content headers and transfer-encoded body for a text entity.
fn text_entity(content_type: ContentType, text: &str) -> (Headers, String) {
    let encoding = TransferEncoding::for_text(text);
    let body = match encoding {
        TransferEncoding::QuotedPrintable => encode_quoted_printable(text),
        _ => text.to_string(),
    };

    let mut headers = Headers::new();
    headers.add("Content-Type", content_type.to_string());
    headers.add("Content-Transfer-Encoding", encoding.to_string());
    (headers, body)
}

/// Picks a random boundary that occurs in none of the bodies.
fn boundary_for(bodies: &[&str]) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let candidate = format!("=_telldaddy_{:016x}", rng.next_u64());
        if bodies.iter().all(|body| !body.contains(&candidate)) {
            return candidate;
        }
    }
}
