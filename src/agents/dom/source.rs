//! Lightweight HTML source scanner.
//!
//! Splits document text into a flat stream of tag, text, comment and
//! doctype payloads with their character offsets. It does not build a
//! tree and does not validate markup; the DOM agent matches the stream
//! against the live tree to learn where each node sits in the source.
//!
//! All offsets and lengths count `char`s, not bytes.

// ============================================================================
// Constants
// ============================================================================

/// DOM node type of elements.
pub const ELEMENT_NODE: u8 = 1;

/// DOM node type of text nodes.
pub const TEXT_NODE: u8 = 3;

/// DOM node type of comments.
pub const COMMENT_NODE: u8 = 8;

/// DOM node type of the document.
pub const DOCUMENT_NODE: u8 = 9;

/// DOM node type of `<!DOCTYPE>`.
pub const DOCUMENT_TYPE_NODE: u8 = 10;

// ============================================================================
// SourcePayload
// ============================================================================

/// One node found in source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePayload {
    /// DOM node type.
    pub node_type: u8,
    /// Upper-case tag name for elements, empty otherwise.
    pub node_name: String,
    /// Text for text and comment nodes.
    pub node_value: String,
    /// Attributes in source order.
    pub attributes: Vec<(String, String)>,
    /// `</tag>`
    pub closing: bool,
    /// Self-closed (`<tag/>`), or a `script`/`style` element scanned with
    /// its body.
    pub closed: bool,
    /// Offset of the first character.
    pub offset: usize,
    /// Length in characters.
    pub length: usize,
}

// ============================================================================
// Scanning
// ============================================================================

fn starts_with_at(src: &[char], at: usize, needle: &str, ignore_case: bool) -> bool {
    let mut index = at;
    for expected in needle.chars() {
        let Some(&c) = src.get(index) else {
            return false;
        };
        let matches = if ignore_case {
            c.eq_ignore_ascii_case(&expected)
        } else {
            c == expected
        };
        if !matches {
            return false;
        }
        index += 1;
    }
    true
}

fn find_str(src: &[char], from: usize, needle: &str, ignore_case: bool) -> Option<usize> {
    (from..src.len()).find(|&i| starts_with_at(src, i, needle, ignore_case))
}

/// Finds the first `target` at or after `from` that is outside single or
/// double quotes. A backslash escapes the following quote.
fn find_unquoted(src: &[char], from: usize, target: impl Fn(char) -> bool) -> Option<usize> {
    let mut quote: Option<char> = None;
    for i in from..src.len() {
        let c = src[i];
        let escaped = i > 0 && src[i - 1] == '\\';
        if !escaped {
            match quote {
                Some(q) if c == q => {
                    quote = None;
                    continue;
                }
                None if c == '"' || c == '\'' => {
                    quote = Some(c);
                    continue;
                }
                _ => {}
            }
        }
        if quote.is_none() && target(c) {
            return Some(i);
        }
    }
    None
}

/// Locates the next tag at or after `skip`, returning `(offset, length)`.
///
/// Comments run to `-->`, `script` and `style` elements run to their
/// closing tag, everything else to the first unquoted `>`.
fn find_tag(src: &[char], skip: usize) -> Option<(usize, usize)> {
    let from = (skip..src.len()).find(|&i| {
        src[i] == '<'
            && src
                .get(i + 1)
                .is_some_and(|&c| c.is_ascii_alphabetic() || c == '!' || c == '/')
    })?;

    let end = if starts_with_at(src, from, "<!--", false) {
        find_str(src, from + 4, "-->", false)? + 3
    } else if starts_with_at(src, from, "<script", true) {
        find_str(src, from + 7, "</script>", true)? + 9
    } else if starts_with_at(src, from, "<style", true) {
        find_str(src, from + 6, "</style>", true)? + 8
    } else {
        find_unquoted(src, from + 1, |c| c == '>')? + 1
    };
    Some((from, end - from))
}

/// Removes one level of matching quotes and unescapes the first escaped
/// quote inside.
fn remove_quotes(value: &str) -> String {
    let mut chars = value.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if (first == '"' || first == '\'') && first == last => {
            let inner: String = chars.collect();
            inner.replacen(&format!("\\{first}"), &first.to_string(), 1)
        }
        _ => value.to_string(),
    }
}

/// Parses `name=value` pairs out of an opening tag.
fn extract_attributes(tag: &str) -> Vec<(String, String)> {
    let chars: Vec<char> = tag.chars().collect();
    let end = find_unquoted(&chars, 1, |c| c == '>').unwrap_or(chars.len());
    let head: String = chars[..end].iter().collect();

    let inner = head.trim_start_matches('<');
    let inner = inner
        .find(char::is_whitespace)
        .map_or("", |at| &inner[at..])
        .trim();
    let inner = inner.strip_suffix('/').unwrap_or(inner).trim_end();

    let chars: Vec<char> = inner.chars().collect();
    let mut items = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = find_unquoted(&chars, start, char::is_whitespace).unwrap_or(chars.len());
        if end > start {
            items.push(chars[start..end].iter().collect::<String>());
        }
        start = end + 1;
    }

    items
        .iter()
        .filter_map(|item| {
            let (key, value) = item.split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), remove_quotes(value.trim())))
        })
        .collect()
}

/// Builds a payload from one text run or tag.
///
/// The returned payload has offset `0`; callers set it.
#[must_use]
pub fn extract_payload(content: &str) -> SourcePayload {
    let length = content.chars().count();
    let text = || SourcePayload {
        node_type: TEXT_NODE,
        node_value: content.to_string(),
        length,
        ..SourcePayload::default()
    };

    if !content.starts_with('<') {
        return text();
    }

    if let Some(body) = content.strip_prefix("<!--") {
        return SourcePayload {
            node_type: COMMENT_NODE,
            node_value: body.strip_suffix("-->").unwrap_or(body).to_string(),
            length,
            ..SourcePayload::default()
        };
    }

    if content[1..].starts_with('!') {
        return SourcePayload {
            node_type: DOCUMENT_TYPE_NODE,
            length,
            ..SourcePayload::default()
        };
    }

    let raw_name: String = content[1..]
        .chars()
        .take_while(|&c| c != '>' && !c.is_whitespace())
        .collect();
    if raw_name.is_empty() {
        return text();
    }

    let closing = raw_name.starts_with('/');
    let name = raw_name
        .trim_start_matches('/')
        .trim_end_matches('/')
        .to_ascii_uppercase();
    let self_closed = content.trim_end_matches('>').ends_with('/');
    let closed = self_closed || name == "SCRIPT" || name == "STYLE";

    SourcePayload {
        node_type: ELEMENT_NODE,
        attributes: if closing {
            Vec::new()
        } else {
            extract_attributes(content)
        },
        node_name: name,
        closing,
        closed,
        length,
        ..SourcePayload::default()
    }
}

/// Calls `visit` for every node in `src`, in document order.
///
/// Whitespace-only text between tags is skipped. A tag that never ends
/// is treated as trailing text.
pub fn each_node(src: &str, mut visit: impl FnMut(SourcePayload)) {
    let chars: Vec<char> = src.chars().collect();
    let mut index = 0;

    while index < chars.len() {
        let (from, length) = find_tag(&chars, index).unwrap_or((chars.len(), 0));

        if from > index {
            let text: String = chars[index..from].iter().collect();
            if !text.trim().is_empty() {
                let mut payload = extract_payload(&text);
                payload.offset = index;
                visit(payload);
            }
        }

        if length > 0 {
            let tag: String = chars[from..from + length].iter().collect();
            let mut payload = extract_payload(&tag);
            payload.offset = from;
            visit(payload);
        }

        index = from + length;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(src: &str) -> Vec<SourcePayload> {
        let mut nodes = Vec::new();
        each_node(src, |payload| nodes.push(payload));
        nodes
    }

    #[test]
    fn test_scan_simple_document() {
        let nodes = scan("<html><body><p class=\"x\">Hi</p></body></html>");
        let summary: Vec<(u8, &str, bool, usize)> = nodes
            .iter()
            .map(|n| (n.node_type, n.node_name.as_str(), n.closing, n.offset))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ELEMENT_NODE, "HTML", false, 0),
                (ELEMENT_NODE, "BODY", false, 6),
                (ELEMENT_NODE, "P", false, 12),
                (TEXT_NODE, "", false, 25),
                (ELEMENT_NODE, "P", true, 27),
                (ELEMENT_NODE, "BODY", true, 31),
                (ELEMENT_NODE, "HTML", true, 38),
            ]
        );
        assert_eq!(nodes[2].attributes, vec![("class".into(), "x".into())]);
        assert_eq!(nodes[2].length, 13);
        assert_eq!(nodes[3].node_value, "Hi");
    }

    #[test]
    fn test_comment_doctype_and_whitespace() {
        let nodes = scan("<!DOCTYPE html>\n  <!-- note -->\n<br/>");
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].node_type, DOCUMENT_TYPE_NODE);
        assert_eq!(nodes[1].node_type, COMMENT_NODE);
        assert_eq!(nodes[1].node_value, " note ");
        assert_eq!(nodes[1].offset, 18);
        assert_eq!(nodes[2].node_name, "BR");
        assert!(nodes[2].closed);
    }

    #[test]
    fn test_script_body_is_one_closed_node() {
        let nodes = scan("<script>if (a < b) { x = '<p>'; }</script><p>");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].node_name, "SCRIPT");
        assert!(nodes[0].closed);
        assert_eq!(nodes[0].length, 42);
        assert_eq!(nodes[1].offset, 42);

        let nodes = scan("<script src=\"a.js\"></script>");
        assert_eq!(nodes[0].attributes, vec![("src".into(), "a.js".into())]);
    }

    #[test]
    fn test_quoted_gt_does_not_end_tag() {
        let nodes = scan("<a title='1 > 0' href=\"x\">t</a>");
        assert_eq!(nodes[0].length, 26);
        assert_eq!(
            nodes[0].attributes,
            vec![("title".into(), "1 > 0".into()), ("href".into(), "x".into())]
        );
    }

    #[test]
    fn test_offsets_count_chars() {
        let nodes = scan("<p>héllo wörld</p><b>");
        assert_eq!(nodes[1].node_value, "héllo wörld");
        assert_eq!(nodes[1].length, 11);
        assert_eq!(nodes[2].offset, 14);
        assert_eq!(nodes[3].offset, 18);
    }

    #[test]
    fn test_unterminated_tag_is_text() {
        let nodes = scan("<p>a < b");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].node_type, TEXT_NODE);
        assert_eq!(nodes[1].node_value, "a < b");

        let nodes = scan("<p>open <b");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].node_value, "open <b");
    }

    #[test]
    fn test_remove_quotes() {
        assert_eq!(remove_quotes("\"a\""), "a");
        assert_eq!(remove_quotes("'a\\'b'"), "a'b");
        assert_eq!(remove_quotes("\"a'"), "\"a'");
        assert_eq!(remove_quotes("plain"), "plain");
    }
}
