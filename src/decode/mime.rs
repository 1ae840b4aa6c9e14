//! Typed MIME tree built from a parsed message

use mailparse::{MailHeaderMap, ParsedMail};

/// One node of a message's MIME structure
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MimePart {
    /// A part carrying content
    Leaf(LeafPart),
    /// A multipart container, children in document order
    Multipart(Vec<MimePart>),
}

/// Content-bearing MIME part with its transfer encoding removed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafPart {
    /// Lowercase mimetype, e.g. `text/plain`
    pub mimetype: String,
    /// Declared charset parameter, if any
    pub charset: Option<String>,
    /// Content-Disposition mentions `attachment`
    pub is_attachment: bool,
    /// Disposition `filename`, else content-type `name`
    pub filename: Option<String>,
    /// Decoded payload
    pub body: Vec<u8>,
}

impl MimePart {
    /// Build the tree for a parsed message
    pub fn from_parsed(mail: &ParsedMail<'_>) -> Self {
        if !mail.subparts.is_empty() {
            return MimePart::Multipart(mail.subparts.iter().map(MimePart::from_parsed).collect());
        }

        let is_attachment = mail
            .headers
            .get_first_value("Content-Disposition")
            .is_some_and(|v| v.to_ascii_lowercase().contains("attachment"));

        let filename = mail
            .get_content_disposition()
            .params
            .get("filename")
            .or_else(|| mail.ctype.params.get("name"))
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let body = mail.get_body_raw().unwrap_or_else(|e| {
            tracing::warn!(mimetype = %mail.ctype.mimetype, error = %e, "undecodable part body, treating as empty");
            Vec::new()
        });

        MimePart::Leaf(LeafPart {
            mimetype: mail.ctype.mimetype.to_ascii_lowercase(),
            charset: mail.ctype.params.get("charset").cloned(),
            is_attachment,
            filename,
            body,
        })
    }

    /// Depth-first iterator over leaves in document order
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves { stack: vec![self] }
    }
}

/// Iterator returned by [`MimePart::leaves`]
pub struct Leaves<'a> {
    stack: Vec<&'a MimePart>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a LeafPart;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(part) = self.stack.pop() {
            match part {
                MimePart::Leaf(leaf) => return Some(leaf),
                MimePart::Multipart(children) => self.stack.extend(children.iter().rev()),
            }
        }
        None
    }
}
