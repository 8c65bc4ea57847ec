//! Owned MIME tree.
//!
//! Leaves carry a decoded payload, inner nodes carry their children in
//! document order. `message/rfc822` parts are inner nodes with the embedded
//! message's root as their single child.

/// A node of a parsed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeNode {
    /// A leaf part.
    Part(MimePart),
    /// A `multipart/*` or `message/rfc822` container.
    Multipart {
        content_type: String,
        children: Vec<MimeNode>,
    },
}

/// A leaf part with its declared type and decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimePart {
    /// Lower-cased `type/subtype`.
    pub content_type: String,
    pub body: PartBody,
}

/// Body of a leaf after transfer and charset decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartBody {
    Text(String),
    Binary(Vec<u8>),
    /// Transfer encoding or charset could not be decoded.
    Undecodable,
}

impl MimeNode {
    /// Declared content type of this node.
    pub fn content_type(&self) -> &str {
        match self {
            Self::Part(part) => &part.content_type,
            Self::Multipart { content_type, .. } => content_type,
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart { .. })
    }

    /// Depth-first, document-order walk over every node, starting with `self`.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Only the leaves, in walk order.
    pub fn leaves(&self) -> impl Iterator<Item = &MimePart> {
        self.walk().filter_map(|node| match node {
            Self::Part(part) => Some(part),
            Self::Multipart { .. } => None,
        })
    }
}

impl MimePart {
    /// The decoded text of a textual leaf, if decoding succeeded.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            PartBody::Text(text) => Some(text),
            PartBody::Binary(_) | PartBody::Undecodable => None,
        }
    }
}

/// Iterator returned by [`MimeNode::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a MimeNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a MimeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let MimeNode::Multipart { children, .. } = node {
            self.stack.extend(children.iter().rev());
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(ct: &str, body: &str) -> MimeNode {
        MimeNode::Part(MimePart {
            content_type: ct.to_string(),
            body: PartBody::Text(body.to_string()),
        })
    }

    #[test]
    fn test_walk_is_depth_first_in_document_order() {
        let tree = MimeNode::Multipart {
            content_type: "multipart/mixed".into(),
            children: vec![
                MimeNode::Multipart {
                    content_type: "multipart/alternative".into(),
                    children: vec![text("text/html", "a"), text("text/plain", "b")],
                },
                text("text/plain", "c"),
            ],
        };
        let types: Vec<&str> = tree.walk().map(MimeNode::content_type).collect();
        assert_eq!(
            types,
            vec![
                "multipart/mixed",
                "multipart/alternative",
                "text/html",
                "text/plain",
                "text/plain"
            ]
        );
        let bodies: Vec<&str> = tree.leaves().filter_map(MimePart::text).collect();
        assert_eq!(bodies, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_single_part_walk() {
        let leaf = text("text/plain", "only");
        assert!(!leaf.is_multipart());
        assert_eq!(leaf.walk().count(), 1);
    }
}
