// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Small XML value readers shared by the CPL and Asset Map parsers.
//!
//! These mirror `ff_xml_read_ulong`/`ff_xml_read_rational`/`ff_xml_read_UUID`/
//! `ff_xml_get_child_element_by_name`: each extracts one scalar from the text
//! content of a named child element, or locates a child by local name.

use log::error;
use roxmltree::Node;

use crate::error::{invalid_data, Result};
use crate::model::Uuid;
use crate::rational::Rational;

/// Returns the first child of `parent` whose local (namespace-stripped) name
/// is `name`, ignoring text/comment nodes.
pub fn first_child_by_name<'a, 'input>(
    parent: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    parent.children().find(|child| child.is_element() && child.tag_name().name() == name)
}

/// Like [`first_child_by_name`], but returns the element's trimmed text
/// content, or `None` if the element is absent or has no text.
pub fn child_text<'a>(parent: Node<'a, '_>, name: &str) -> Option<&'a str> {
    first_child_by_name(parent, name).and_then(|child| child.text()).map(str::trim)
}

/// Decodes the decimal text content of child element `name` as an unsigned
/// integer.
pub fn read_uint(parent: Node<'_, '_>, name: &str) -> Result<u64> {
    let text = match child_text(parent, name) {
        Some(text) => text,
        None => {
            error!("imf: missing required element <{}>", name);
            return invalid_data("imf: missing required element");
        }
    };

    match text.parse::<u64>() {
        Ok(value) => Ok(value),
        Err(_) => {
            error!("imf: element <{}> is not a valid unsigned integer: {:?}", name, text);
            invalid_data("imf: element is not a valid unsigned integer")
        }
    }
}

/// Decodes the text content of child element `name` as two whitespace
/// separated integers `"N D"`, returning `Rational::new(N, D)`.
pub fn read_rational(parent: Node<'_, '_>, name: &str) -> Result<Rational> {
    let text = match child_text(parent, name) {
        Some(text) => text,
        None => {
            error!("imf: missing required element <{}>", name);
            return invalid_data("imf: missing required element");
        }
    };

    let mut parts = text.split_whitespace();

    let (num, den) = match (parts.next(), parts.next(), parts.next()) {
        (Some(num), Some(den), None) => (num, den),
        _ => {
            error!("imf: element <{}> is not a valid rational: {:?}", name, text);
            return invalid_data("imf: element is not a valid rational");
        }
    };

    let (num, den) = match (num.parse::<i64>(), den.parse::<i64>()) {
        (Ok(num), Ok(den)) => (num, den),
        _ => {
            error!("imf: rational in <{}> has non-integer parts: {:?}", name, text);
            return invalid_data("imf: rational has non-integer parts");
        }
    };

    if den == 0 {
        error!("imf: rational denominator in <{}> is zero", name);
        return invalid_data("imf: rational denominator is zero");
    }

    if num == 0 {
        error!("imf: rational numerator in <{}> is zero", name);
        return invalid_data("imf: rational numerator is zero");
    }

    Ok(Rational::new(num, den))
}

/// Decodes the text content of child element `name` as a UUID.
///
/// Accepts the `urn:uuid:` prefix used throughout ST 2067-3/429-9, with
/// case-insensitive hex. Unlike the strict `sscanf`-style parser this spec
/// descends from, dashes between hex groups are not required to fall at
/// fixed offsets as long as the resulting string is a valid UUID; this
/// crate documents that leniency rather than matching the original exactly.
pub fn read_uuid(parent: Node<'_, '_>, name: &str) -> Result<Uuid> {
    let text = match child_text(parent, name) {
        Some(text) => text,
        None => {
            error!("imf: missing required element <{}>", name);
            return invalid_data("imf: missing required element");
        }
    };

    match parse_uuid_urn(text) {
        Some(uuid) => Ok(uuid),
        None => {
            error!("imf: element <{}> is not a valid UUID: {:?}", name, text);
            invalid_data("imf: element is not a valid UUID")
        }
    }
}

/// Parses a bare `urn:uuid:...` string, as used by `@attribute` values that
/// don't go through [`read_uuid`]'s child-element lookup.
pub fn parse_uuid_urn(text: &str) -> Option<Uuid> {
    let hex = text.trim().strip_prefix("urn:uuid:").unwrap_or_else(|| text.trim());
    Uuid::parse_str(hex).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    #[test]
    fn read_uint_parses_decimal_text() {
        let doc = Document::parse("<r><N>42</N></r>").unwrap();
        assert_eq!(read_uint(doc.root_element(), "N").unwrap(), 42);
    }

    #[test]
    fn read_uint_rejects_non_numeric_text() {
        let doc = Document::parse("<r><N>abc</N></r>").unwrap();
        assert!(read_uint(doc.root_element(), "N").is_err());
    }

    #[test]
    fn read_uint_rejects_missing_element() {
        let doc = Document::parse("<r></r>").unwrap();
        assert!(read_uint(doc.root_element(), "N").is_err());
    }

    #[test]
    fn read_rational_parses_two_integers() {
        let doc = Document::parse("<r><EditRate>24 1</EditRate></r>").unwrap();
        let rate = read_rational(doc.root_element(), "EditRate").unwrap();
        assert_eq!(rate.num(), 24);
        assert_eq!(rate.den(), 1);
    }

    #[test]
    fn read_rational_rejects_zero_denominator() {
        let doc = Document::parse("<r><EditRate>24 0</EditRate></r>").unwrap();
        assert!(read_rational(doc.root_element(), "EditRate").is_err());
    }

    #[test]
    fn read_rational_rejects_zero_numerator() {
        let doc = Document::parse("<r><EditRate>0 1</EditRate></r>").unwrap();
        assert!(read_rational(doc.root_element(), "EditRate").is_err());
    }

    #[test]
    fn read_rational_rejects_single_value() {
        let doc = Document::parse("<r><EditRate>24</EditRate></r>").unwrap();
        assert!(read_rational(doc.root_element(), "EditRate").is_err());
    }

    #[test]
    fn read_uuid_accepts_urn_prefix() {
        let doc = Document::parse(
            "<r><Id>urn:uuid:f81d4fae-7dec-11d0-a765-00a0c91e6bf6</Id></r>",
        )
        .unwrap();
        let uuid = read_uuid(doc.root_element(), "Id").unwrap();
        assert_eq!(uuid.to_string(), "f81d4fae-7dec-11d0-a765-00a0c91e6bf6");
    }

    #[test]
    fn read_uuid_rejects_malformed_text() {
        let doc = Document::parse("<r><Id>not-a-uuid</Id></r>").unwrap();
        assert!(read_uuid(doc.root_element(), "Id").is_err());
    }

    #[test]
    fn first_child_by_name_ignores_text_nodes() {
        let doc = Document::parse("<r>text<Child/></r>").unwrap();
        assert!(first_child_by_name(doc.root_element(), "Child").is_some());
        assert!(first_child_by_name(doc.root_element(), "Missing").is_none());
    }
}
