//! # telldaddy-mime
//!
//! MIME message construction and parsing for change notifications.
//!
//! ## Features
//!
//! - **Message building**: single-part `text/plain` or `multipart/alternative`
//!   (plain first, HTML second)
//! - **Message parsing**: read a wire-form message back into its parts
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 header encoding
//! - **Content types**: parse and format `type/subtype; key=value`
//!
//! ## Quick Start
//!
//! ```
//! use telldaddy_mime::{build_alternative, build_plain};
//!
//! let plain = build_plain("a@x.com", "b@y.com", "Hi", "hello");
//! assert!(plain.to_wire().contains("Subject: Hi"));
//!
//! let rich = build_alternative("a@x.com", "b@y.com", "Hi", "hello", "<b>hello</b>");
//! assert_eq!(rich.parts().len(), 2);
//! ```
//!
//! ### Fluent builder
//!
//! ```
//! use telldaddy_mime::MessageBuilder;
//!
//! let message = MessageBuilder::new()
//!     .from("urlwatch@example.com")
//!     .to("me@example.com")
//!     .subject("2 changes detected")
//!     .text_body("https://example.com/ changed")
//!     .build();
//! assert_eq!(message.subject(), Some("2 changes detected"));
//! ```
//!
//! ### Parsing
//!
//! ```
//! use telldaddy_mime::Message;
//!
//! let message = Message::parse("Subject: Test\r\n\r\nHello, World!")?;
//! assert_eq!(message.body_text()?, "Hello, World!");
//! # Ok::<(), telldaddy_mime::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod builder;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use builder::{MessageBuilder, build_alternative, build_plain};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{LineEnding, Message, Part, TransferEncoding};
