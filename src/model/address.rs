//! RFC 2822 address headers, reduced to what the tag index needs.

/// One address from a `From`/`To` header.
///
/// - `"Ada Lovelace <ada@example.com>"` → name `"Ada Lovelace"`, address `"ada@example.com"`
/// - `"ada@example.com (Ada)"` → name `"Ada"`, address `"ada@example.com"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display name (may be empty).
    pub name: String,
    /// The `local@domain` part (may be empty when the header is garbage).
    pub address: String,
}

impl Address {
    /// Parse a single address.
    ///
    /// Never fails: input that contains no recognizable address yields an
    /// empty `address`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self {
                    name: unquote(&trimmed[..open]),
                    address: trimmed[open + 1..close].trim().to_string(),
                };
            }
            return Self::empty();
        }

        // Old-style trailing comment: "user@host (Full Name)"
        let (addr_part, comment) = match (trimmed.find('('), trimmed.rfind(')')) {
            (Some(open), Some(close)) if close > open => (
                trimmed[..open].trim(),
                trimmed[open + 1..close].trim().to_string(),
            ),
            _ => (trimmed, String::new()),
        };

        if addr_part.contains('@') && !addr_part.contains(char::is_whitespace) {
            Self {
                name: comment,
                address: addr_part.to_string(),
            }
        } else {
            Self::empty()
        }
    }

    /// Split a header on top-level commas and parse each address.
    ///
    /// Commas inside quotes or angle brackets do not split.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut segments = Vec::new();
        let mut start = 0;
        let mut in_quotes = false;
        let mut in_angle = false;

        for (i, ch) in raw.char_indices() {
            match ch {
                '"' => in_quotes = !in_quotes,
                '<' if !in_quotes => in_angle = true,
                '>' if !in_quotes => in_angle = false,
                ',' if !in_quotes && !in_angle => {
                    segments.push(&raw[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        segments.push(&raw[start..]);

        segments
            .into_iter()
            .map(Self::parse)
            .filter(|a| !a.address.is_empty())
            .collect()
    }

    fn empty() -> Self {
        Self {
            name: String::new(),
            address: String::new(),
        }
    }
}

/// The address part of the first address in a header, or `""`.
pub fn first_address(raw: &str) -> String {
    Address::parse_list(raw)
        .into_iter()
        .next()
        .map(|a| a.address)
        .unwrap_or_default()
}

fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}
