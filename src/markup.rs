//! Typed access to the XML tree of `.tmx` and `.tsx` files.

use std::str::FromStr;
use roxmltree::{Document, Node};
use crate::TmxError;

/// Parses markup text. `path` names the source in errors.
pub fn parse<'input>(text: &'input str, path: &str) -> Result<Document<'input>, TmxError> {
    Document::parse(text).map_err(|source| TmxError::ParseFailure {
        path: String::from(path),
        source,
    })
}

/// Element node of a parsed document.
#[derive(Copy, Clone, Debug)]
pub struct Element<'a, 'input: 'a>(Node<'a, 'input>);

impl<'a, 'input: 'a> Element<'a, 'input> {

    /// First element in the document with the given tag, in document order.
    pub fn find(doc: &'a Document<'input>, tag: &str) -> Result<Self, TmxError> {
        doc.descendants()
            .find(|node| node.is_element() && node.tag_name().name() == tag)
            .map(Element)
            .ok_or_else(|| TmxError::MissingNode { tag: String::from(tag) })
    }

    pub fn tag(&self) -> &'a str {
        self.0.tag_name().name()
    }

    /// First direct child with the given tag.
    pub fn child(&self, tag: &str) -> Result<Self, TmxError> {
        self.children(tag)
            .next()
            .ok_or_else(|| TmxError::MissingNode { tag: String::from(tag) })
    }

    /// Direct children with the given tag, in document order.
    pub fn children<'t>(&self, tag: &'t str) -> impl Iterator<Item = Element<'a, 'input>> + 't
    where
        'a: 't,
    {
        self.0
            .children()
            .filter(move |node| node.is_element() && node.tag_name().name() == tag)
            .map(Element)
    }

    pub fn attribute(&self, name: &str) -> Result<&'a str, TmxError> {
        self.0.attribute(name).ok_or_else(|| TmxError::MissingAttribute {
            tag: String::from(self.tag()),
            attribute: String::from(name),
        })
    }

    pub fn optional_attribute(&self, name: &str) -> Option<&'a str> {
        self.0.attribute(name)
    }

    /// Required attribute parsed as a number.
    pub fn number<T: FromStr>(&self, name: &str) -> Result<T, TmxError> {
        let value = self.attribute(name)?;
        parse_number(name, value)
    }

    pub fn optional_number<T: FromStr>(&self, name: &str) -> Result<Option<T>, TmxError> {
        match self.0.attribute(name) {
            Some(value) => parse_number(name, value).map(Some),
            None => Ok(None),
        }
    }

    /// Concatenated text content. Empty when the element has none.
    pub fn text(&self) -> &'a str {
        self.0.text().unwrap_or("")
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, TmxError> {
    value.trim().parse().map_err(|_| TmxError::InvalidAttributeValue {
        attribute: String::from(name),
        value: String::from(value),
    })
}
