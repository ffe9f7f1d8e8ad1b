// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Control paragraph primitives.

`Packages` and `Sources` indices are sequences of RFC822-like *paragraphs*
separated by blank lines. Each paragraph is an ordered series of `Name: value`
fields, where values may continue on following lines indented by whitespace.

See <https://www.debian.org/doc/debian-policy/ch-controlfields.html>.
*/

use {
    crate::error::{DebianError, Result},
    std::{
        borrow::Cow,
        collections::HashMap,
        io::{BufRead, Write},
    },
};

/// A field in a control paragraph.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ControlField<'a> {
    name: Cow<'a, str>,
    value: Cow<'a, str>,
}

impl<'a> ControlField<'a> {
    /// Construct an instance from a field name and value.
    pub fn new(name: Cow<'a, str>, value: Cow<'a, str>) -> Self {
        Self { name, value }
    }

    /// The name of this field.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// The raw value, including newlines and leading whitespace of continuation lines.
    pub fn value_str(&self) -> &str {
        self.value.as_ref()
    }

    /// Obtain an iterator of words in the value.
    pub fn iter_words(&self) -> impl Iterator<Item = &str> {
        self.value.split_ascii_whitespace()
    }

    /// Obtain an iterator of lines in the value.
    ///
    /// Leading whitespace from each line is stripped.
    pub fn iter_lines(&self) -> impl Iterator<Item = &str> {
        self.value.lines().map(|x| x.trim_start())
    }

    /// Write the contents of this field to a writer.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(self.name.as_bytes())?;
        writer.write_all(b":")?;
        // Multiline values like `Files` start on the line after the name.
        if !self.value.starts_with('\n') && !self.value.is_empty() {
            writer.write_all(b" ")?;
        }
        writer.write_all(self.value.as_bytes())?;
        writer.write_all(b"\n")
    }
}

/// A paragraph in a control file.
///
/// Field names are case insensitive on read and case preserving on set. A paragraph
/// holds a single occurrence of any field.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ControlParagraph<'a> {
    fields: Vec<ControlField<'a>>,
}

impl<'a> ControlParagraph<'a> {
    /// Whether the paragraph has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Set the value of a field, replacing any existing field with the same name.
    pub fn set_field(&mut self, field: ControlField<'a>) {
        self.fields
            .retain(|cf| !cf.name.eq_ignore_ascii_case(&field.name));
        self.fields.push(field);
    }

    /// Set the value of a field defined via strings.
    pub fn set_field_from_string(&mut self, name: Cow<'a, str>, value: Cow<'a, str>) {
        self.set_field(ControlField::new(name, value));
    }

    /// Whether a named field is present in this paragraph.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Iterate over fields in insertion order.
    pub fn iter_fields(&self) -> impl Iterator<Item = &ControlField<'a>> {
        self.fields.iter()
    }

    /// Obtain the field with a given name.
    pub fn field(&self, name: &str) -> Option<&ControlField<'a>> {
        self.fields
            .iter()
            .find(|f| f.name.as_ref().eq_ignore_ascii_case(name))
    }

    /// Obtain the raw string value of the named field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value_str())
    }

    /// Obtain the raw string value of a field that must be present.
    pub fn required_field_str(&self, name: &str) -> Result<&str> {
        self.field_str(name)
            .ok_or_else(|| DebianError::ControlRequiredFieldMissing(name.to_string()))
    }

    /// Obtain an iterator of words in the named field.
    pub fn iter_field_words(&self, name: &str) -> Option<impl Iterator<Item = &str>> {
        self.field(name).map(|f| f.iter_words())
    }

    /// Obtain an iterator of lines in the named field.
    pub fn iter_field_lines(&self, name: &str) -> Option<impl Iterator<Item = &str>> {
        self.field(name).map(|f| f.iter_lines())
    }

    /// Convert this paragraph to a [HashMap] of field name to raw value.
    pub fn as_str_hash_map(&self) -> HashMap<&str, &str> {
        self.fields
            .iter()
            .map(|field| (field.name(), field.value_str()))
            .collect()
    }

    /// Serialize the paragraph to a writer.
    ///
    /// No blank line is written after the final field.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for field in &self.fields {
            field.write(writer)?;
        }

        Ok(())
    }
}

/// Holds parsing state for control files.
///
/// Instances are fed lines of text and emit [ControlParagraph] instances as they
/// are completed.
#[derive(Clone, Debug, Default)]
pub struct ControlFileParser {
    paragraph: ControlParagraph<'static>,
    field: Option<String>,
}

impl ControlFileParser {
    /// Write a line to the parser.
    ///
    /// If the line terminates an in-progress paragraph, that paragraph is returned.
    pub fn write_line(&mut self, line: &str) -> Result<Option<ControlParagraph<'static>>> {
        let is_empty_line = line.trim().is_empty();
        let is_continuation = line.starts_with([' ', '\t']) && !is_empty_line;

        let current_field = self.field.take();

        if is_empty_line {
            if let Some(field) = current_field {
                self.flush_field(field)?;
            }

            return Ok(if self.paragraph.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut self.paragraph))
            });
        }

        self.field = Some(match (current_field, is_continuation) {
            (Some(v), true) => v + line,
            (Some(v), false) => {
                self.flush_field(v)?;
                line.to_string()
            }
            (None, true) => {
                return Err(DebianError::ControlParseError(format!(
                    "continuation line without a field: '{}'",
                    line.trim_end()
                )));
            }
            (None, false) => line.to_string(),
        });

        Ok(None)
    }

    /// Finish parsing, consuming self.
    ///
    /// Returns the trailing paragraph if input did not end with a blank line.
    pub fn finish(mut self) -> Result<Option<ControlParagraph<'static>>> {
        if let Some(field) = self.field.take() {
            self.flush_field(field)?;
        }

        Ok(if self.paragraph.is_empty() {
            None
        } else {
            Some(self.paragraph)
        })
    }

    fn flush_field(&mut self, v: String) -> Result<()> {
        let (name, value) = v.split_once(':').ok_or_else(|| {
            DebianError::ControlParseError(format!(
                "error parsing line '{}'; missing colon",
                v.trim_end()
            ))
        })?;

        let name = name.trim();
        if name.is_empty() {
            return Err(DebianError::ControlParseError(format!(
                "error parsing line '{}'; empty field name",
                v.trim_end()
            )));
        }

        self.paragraph.set_field_from_string(
            Cow::Owned(name.to_string()),
            Cow::Owned(value.trim().to_string()),
        );

        Ok(())
    }
}

/// A streaming reader of [ControlParagraph].
///
/// Each call into the iterator reads one full paragraph from the underlying reader.
/// Iteration ends at end of input or after the first error.
pub struct ControlParagraphReader<R: BufRead> {
    reader: R,
    parser: Option<ControlFileParser>,
}

impl<R: BufRead> ControlParagraphReader<R> {
    /// Create a new instance bound to a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            parser: Some(ControlFileParser::default()),
        }
    }

    /// Consumes the instance, returning the original reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn get_next(&mut self, mut parser: ControlFileParser) -> Result<Option<ControlParagraph<'static>>> {
        let mut line = String::new();

        loop {
            line.clear();

            if self.reader.read_line(&mut line)? == 0 {
                return parser.finish();
            }

            if let Some(paragraph) = parser.write_line(&line)? {
                self.parser.replace(parser);
                return Ok(Some(paragraph));
            }
        }
    }
}

impl<R: BufRead> Iterator for ControlParagraphReader<R> {
    type Item = Result<ControlParagraph<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        let parser = self.parser.take()?;

        self.get_next(parser).transpose()
    }
}

#[cfg(test)]
mod test {
    use {super::*, indoc::indoc, std::io::Cursor};

    const SOURCES: &str = indoc! {"
        Package: zstd
        Version: 1.4.8+dfsg-3
        Directory: pool/main/libz/libzstd
        Files:
         943bed8b8d98a50c8d8a101b12693bb4 1331996 libzstd_1.4.8+dfsg.orig.tar.xz
         4d2692830e1f481ce769e2dd24cbc9db 12184 libzstd_1.4.8+dfsg-3.debian.tar.xz


        Package: hello
        Version: 2.10-2
        Description: example package
         based on GNU hello
         .
         a second paragraph
    "};

    #[test]
    fn control_paragraph_field_semantics() {
        let mut p = ControlParagraph::default();

        p.set_field_from_string("foo".into(), "bar".into());
        p.set_field_from_string("foo".into(), "baz".into());
        assert_eq!(p.field_str("foo"), Some("baz"));

        p.set_field_from_string("FOO".into(), "bar".into());
        assert_eq!(p.field_str("foo"), Some("bar"));
        assert_eq!(p.iter_fields().count(), 1);
        assert!(p.required_field_str("missing").is_err());
    }

    #[test]
    fn read_paragraphs() -> Result<()> {
        let paragraphs = ControlParagraphReader::new(Cursor::new(SOURCES.as_bytes()))
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(paragraphs.len(), 2);

        let p = &paragraphs[0];
        assert_eq!(p.field_str("package"), Some("zstd"));
        assert_eq!(
            p.iter_field_lines("Files").unwrap().collect::<Vec<_>>(),
            vec![
                "943bed8b8d98a50c8d8a101b12693bb4 1331996 libzstd_1.4.8+dfsg.orig.tar.xz",
                "4d2692830e1f481ce769e2dd24cbc9db 12184 libzstd_1.4.8+dfsg-3.debian.tar.xz",
            ]
        );

        let p = &paragraphs[1];
        assert_eq!(p.iter_field_lines("Description").unwrap().count(), 4);
        assert_eq!(p.as_str_hash_map().get("Version"), Some(&"2.10-2"));

        Ok(())
    }

    #[test]
    fn empty_input_has_no_paragraphs() {
        assert_eq!(
            ControlParagraphReader::new(Cursor::new(b"\n\n".as_ref())).count(),
            0
        );
    }

    #[test]
    fn missing_colon_is_error() {
        let mut reader = ControlParagraphReader::new(Cursor::new(b"Package foo\n".as_ref()));

        assert!(matches!(
            reader.next(),
            Some(Err(DebianError::ControlParseError(_)))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn write_round_trip() -> Result<()> {
        let paragraphs = ControlParagraphReader::new(Cursor::new(SOURCES.as_bytes()))
            .collect::<Result<Vec<_>>>()?;

        let mut buf = vec![];
        paragraphs[0].write(&mut buf)?;

        let reparsed = ControlParagraphReader::new(Cursor::new(buf))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(reparsed, vec![paragraphs[0].clone()]);

        Ok(())
    }
}
