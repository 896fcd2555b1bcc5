//! Reading and rewriting the `Peers: [ ... ]` array of a node configuration.
//!
//! The configuration is HJSON-like text. Only the span from the `Peers:` marker
//! through the array's closing `]` is ever rewritten; every byte outside it is
//! copied through untouched.

use crate::types::{endpoint_regex, Endpoint};
use std::collections::HashSet;
use std::ops::Range;
use tracing::warn;

const MARKER: &str = "Peers:";
const ENTRY_INDENT: &str = "  ";

/// Location and contents of the peer array inside a configuration text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerBlock {
    /// Byte offset of the `Peers:` marker.
    pub marker: usize,
    /// Byte offset of the `]` terminating the array.
    pub close: usize,
    pub peers: Vec<Endpoint>,
}

impl PeerBlock {
    /// Marker through terminator, inclusive.
    pub fn span(&self) -> Range<usize> {
        self.marker..self.close + 1
    }
}

enum Lookup {
    Found(PeerBlock),
    /// `Peers: [` is present but its array never closes.
    Unterminated(usize),
    Absent,
}

fn lookup(text: &str) -> Lookup {
    let bytes = text.as_bytes();
    for marker in markers(text) {
        let after = marker + MARKER.len();
        let rest = &text[after..];
        let open = after + (rest.len() - rest.trim_start().len());
        if bytes.get(open) != Some(&b'[') {
            continue;
        }
        return match scan_array(text, open) {
            Some((close, peers)) => Lookup::Found(PeerBlock {
                marker,
                close,
                peers,
            }),
            None => Lookup::Unterminated(marker),
        };
    }
    Lookup::Absent
}

/// Finds the first `Peers:` field holding an array.
///
/// Markers that are part of a longer key (`InterfacePeers:`), inside a comment
/// or inside a quoted string are skipped. An array without a terminator yields
/// `None`.
pub fn locate(text: &str) -> Option<PeerBlock> {
    match lookup(text) {
        Lookup::Found(block) => Some(block),
        Lookup::Unterminated(_) | Lookup::Absent => None,
    }
}

/// Endpoints of the peer array in file order; empty when there is no array.
pub fn read_peers(text: &str) -> Vec<Endpoint> {
    locate(text).map(|block| block.peers).unwrap_or_default()
}

/// Adds the endpoints not already configured, after the existing ones.
///
/// The array is rebuilt one endpoint per line. Without any `Peers:` field, a
/// new block holding `new_peers` is appended to the end of the text. A peer
/// array that is never closed is left alone.
pub fn add_peers(text: &str, new_peers: &[Endpoint]) -> String {
    match lookup(text) {
        Lookup::Found(block) => {
            let merged = distinct(block.peers.iter().chain(new_peers));
            replace_block(text, &block, &merged)
        }
        Lookup::Unterminated(marker) => {
            warn!("Peers array at byte {} is never closed, leaving config unchanged", marker);
            text.to_string()
        }
        Lookup::Absent if new_peers.is_empty() => text.to_string(),
        Lookup::Absent => {
            let mut out = String::with_capacity(text.len() + 32 * new_peers.len());
            out.push_str(text);
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&render_block(&distinct(new_peers.iter())));
            out.push('\n');
            out
        }
    }
}

/// Drops every configured endpoint that exactly matches one of `to_remove`.
pub fn remove_peers(text: &str, to_remove: &[Endpoint]) -> String {
    let Some(block) = locate(text) else {
        return text.to_string();
    };
    let remove: HashSet<&Endpoint> = to_remove.iter().collect();
    let keep = distinct(block.peers.iter().filter(|p| !remove.contains(p)));
    replace_block(text, &block, &keep)
}

fn replace_block(text: &str, block: &PeerBlock, peers: &[Endpoint]) -> String {
    let span = block.span();
    let rendered = render_block(peers);
    let mut out = String::with_capacity(text.len() - span.len() + rendered.len());
    out.push_str(&text[..span.start]);
    out.push_str(&rendered);
    out.push_str(&text[span.end..]);
    out
}

fn render_block(peers: &[Endpoint]) -> String {
    if peers.is_empty() {
        return format!("{} []", MARKER);
    }
    let mut block = format!("{} [", MARKER);
    for peer in peers {
        block.push('\n');
        block.push_str(ENTRY_INDENT);
        block.push_str(peer.as_str());
    }
    block.push_str("\n]");
    block
}

fn distinct<'a>(peers: impl Iterator<Item = &'a Endpoint>) -> Vec<Endpoint> {
    let mut seen = HashSet::new();
    peers.filter(|p| seen.insert(*p)).cloned().collect()
}

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Bytes after which `#` or `//` opens a comment rather than continuing a value
/// such as `tcp://host`.
fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b',' | b'[' | b']' | b'{' | b'}')
}

/// Offsets of `Peers:` markers in live text, in file order.
fn markers(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let at_boundary = i == 0 || is_delimiter(bytes[i - 1]);
        match bytes[i] {
            b'#' if at_boundary => i = line_end(bytes, i),
            b'/' if at_boundary && bytes.get(i + 1) == Some(&b'/') => i = line_end(bytes, i),
            b'/' if at_boundary && bytes.get(i + 1) == Some(&b'*') => {
                match text[i + 2..].find("*/") {
                    Some(close) => i += 2 + close + 2,
                    None => break,
                }
            }
            b'"' => {
                i = match quoted_end(bytes, i, b'"') {
                    Some(end) if !bytes[i..end].contains(&b'\n') => end + 1,
                    _ => i + 1,
                }
            }
            _ if bytes[i..].starts_with(MARKER.as_bytes())
                && (i == 0 || !is_key_byte(bytes[i - 1])) =>
            {
                found.push(i);
                i += MARKER.len();
            }
            _ => i += 1,
        }
    }
    found
}

/// Walks the array body starting after `open`, returning the terminator offset
/// and every endpoint found in its tokens.
fn scan_array(text: &str, open: usize) -> Option<(usize, Vec<Endpoint>)> {
    let bytes = text.as_bytes();
    let mut peers = Vec::new();
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b']' => return Some((i, peers)),
            b',' => i += 1,
            b if b.is_ascii_whitespace() => i += 1,
            b'#' => i = line_end(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = line_end(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let close = text[i + 2..].find("*/")?;
                i += 2 + close + 2;
            }
            quote @ (b'"' | b'\'') => {
                let end = quoted_end(bytes, i, quote)?;
                collect_endpoints(&text[i + 1..end], &mut peers);
                i = end + 1;
            }
            _ => {
                let end = bare_end(bytes, i);
                collect_endpoints(&text[i..end], &mut peers);
                i = end;
            }
        }
    }
    None
}

fn collect_endpoints(token: &str, peers: &mut Vec<Endpoint>) {
    peers.extend(endpoint_regex().find_iter(token).map(|m| Endpoint::from(m.as_str())));
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| from + p)
}

fn quoted_end(bytes: &[u8], open: usize, quote: u8) -> Option<usize> {
    let mut j = open + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b if b == quote => return Some(j),
            _ => j += 1,
        }
    }
    None
}

/// End of an unquoted token. A `]` closing a bracketed IPv6 host right after
/// `://` belongs to the token; any other `]` ends it.
fn bare_end(bytes: &[u8], start: usize) -> usize {
    let mut j = start;
    while j < bytes.len() {
        let b = bytes[j];
        if b.is_ascii_whitespace() || b == b',' || b == b']' {
            break;
        }
        if b == b'[' && j >= start + 3 && &bytes[j - 3..j] == b"://" {
            if let Some(close) = address_bracket_end(bytes, j) {
                j = close + 1;
                continue;
            }
        }
        j += 1;
    }
    j
}

fn address_bracket_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut k = open + 1;
    while k < bytes.len() && (bytes[k].is_ascii_hexdigit() || bytes[k] == b':' || bytes[k] == b'.') {
        k += 1;
    }
    (k > open + 1 && bytes.get(k) == Some(&b']')).then_some(k)
}
