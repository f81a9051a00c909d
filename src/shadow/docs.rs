//! Parsed documentation companions.
//!
//! Modules may ship a documentation file next to them (same base name, `.xml`
//! extension) in the conventional compiler-generated shape:
//!
//! ```xml
//! <doc>
//!   <assembly><name>MyLibrary</name></assembly>
//!   <members>
//!     <member name="T:MyLibrary.Widget"><summary>…</summary></member>
//!   </members>
//! </doc>
//! ```
//!
//! [`DocImage`] is the in-memory form of such a file: the declared module name
//! and a map from member id to its documentation text. Once parsed, the image
//! is independent of the copy file it was read from, like [`crate::image::ModuleImage`].

use std::collections::HashMap;

use quick_xml::{events::Event, Reader};

use crate::Result;

/// Parsed in-memory image of a documentation companion file.
#[derive(Debug, Default)]
pub struct DocImage {
    module_name: Option<String>,
    members: HashMap<String, String>,
}

impl DocImage {
    /// Parse a documentation file from its raw bytes.
    ///
    /// Elements outside the conventional shape are skipped; only `<member>`
    /// entries and the `<assembly><name>` declaration are captured.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the XML itself is not well formed.
    pub fn parse(data: &[u8]) -> Result<DocImage> {
        let mut reader = Reader::from_reader(data);

        let mut image = DocImage::default();
        let mut buf = Vec::new();

        // Tracks which capture target the current text belongs to.
        let mut current_member: Option<String> = None;
        let mut in_assembly_name = false;
        let mut text = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(start)) => match start.name().as_ref() {
                    b"member" => {
                        for attribute in start.attributes() {
                            let attribute = attribute.map_err(|e| {
                                malformed_error!("Invalid documentation attribute: {}", e)
                            })?;
                            if attribute.key.as_ref() == b"name" {
                                current_member =
                                    Some(String::from_utf8_lossy(&attribute.value).into_owned());
                                text.clear();
                            }
                        }
                    }
                    b"name" => {
                        in_assembly_name = true;
                        text.clear();
                    }
                    _ => {}
                },
                Ok(Event::Text(event)) => {
                    let fragment = event
                        .unescape()
                        .map_err(|e| malformed_error!("Invalid documentation text: {}", e))?;
                    text.push_str(fragment.trim());
                }
                Ok(Event::End(end)) => match end.name().as_ref() {
                    b"member" => {
                        if let Some(name) = current_member.take() {
                            image.members.insert(name, std::mem::take(&mut text));
                        }
                    }
                    b"name" => {
                        if in_assembly_name {
                            image.module_name = Some(std::mem::take(&mut text));
                            in_assembly_name = false;
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(malformed_error!("Invalid documentation XML: {}", e)),
            }
            buf.clear();
        }

        Ok(image)
    }

    /// The module name declared by the documentation file, if any.
    #[must_use]
    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// Documentation text for a member id (e.g. `"T:MyLibrary.Widget"`).
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&str> {
        self.members.get(name).map(String::as_str)
    }

    /// Number of documented members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = br#"<?xml version="1.0"?>
<doc>
    <assembly><name>MyLibrary</name></assembly>
    <members>
        <member name="T:MyLibrary.Widget"><summary>A widget.</summary></member>
        <member name="M:MyLibrary.Widget.Run"><summary>Runs the widget.</summary></member>
    </members>
</doc>"#;

    #[test]
    fn test_parse_sample() {
        let image = DocImage::parse(SAMPLE).unwrap();

        assert_eq!(image.module_name(), Some("MyLibrary"));
        assert_eq!(image.member_count(), 2);
        assert_eq!(image.member("T:MyLibrary.Widget"), Some("A widget."));
        assert_eq!(
            image.member("M:MyLibrary.Widget.Run"),
            Some("Runs the widget.")
        );
        assert!(image.member("T:Missing").is_none());
    }

    #[test]
    fn test_parse_empty_document() {
        let image = DocImage::parse(b"<doc></doc>").unwrap();
        assert!(image.module_name().is_none());
        assert_eq!(image.member_count(), 0);
    }

    #[test]
    fn test_parse_malformed() {
        // Mismatched end tag
        assert!(DocImage::parse(b"<doc><members></doc>").is_err());
    }
}
