//! Document record and the `DocumentSource` contract.

/// One reference document: a Wikipedia page id, its title, and body text.
/// `doc_id` uniqueness across the corpus is assumed, not enforced here.
#[derive(Debug, Clone)]
pub struct Document {
    pub doc_id: u32,
    pub title: String,
    pub body: String,
}

/// A finite, non-restartable, single-pass stream of `Document` records.
///
/// Implementations may be pull iterators or push callbacks; the only
/// contract is that `next_document` returns records in some deterministic
/// order until the source is exhausted, and that a structural failure on
/// one document does not end the stream — only an I/O error on the
/// underlying byte stream does.
pub trait DocumentSource {
    /// Pulls the next document, or `None` once the source is exhausted.
    /// Per-document parse failures are handled internally (logged and
    /// skipped) rather than surfaced here; only a fatal I/O error on the
    /// underlying stream is returned as `Err`.
    fn next_document(&mut self) -> crate::error::EsaResult<Option<Document>>;
}

/// Strips corpus-specific markup noise from a document body before it
/// reaches the tokenizer. A pluggable collaborator — the XML
/// parser itself is out of scope, but a working default beats a stub that
/// turns every ingested document into empty text.
pub trait MarkupStripper: Send + Sync {
    fn strip(&self, raw: &str) -> String;
}

/// Strips the MediaWiki markup noise that matters most for a tokenizer that
/// only keeps `[A-Za-z-]` runs anyway: template braces, link brackets
/// (keeping the visible text), HTML comments, and `<ref>` footnotes.
#[derive(Default)]
pub struct MediaWikiMarkupStripper;

impl MarkupStripper for MediaWikiMarkupStripper {
    fn strip(&self, raw: &str) -> String {
        let no_comments = strip_delimited(raw, "<!--", "-->");
        let no_refs = strip_tag_block(&no_comments, "ref");
        let no_templates = strip_balanced(&no_refs, "{{", "}}");
        strip_wiki_links(&no_templates)
    }
}

/// Removes every `start...end` span, non-overlapping, left to right. An
/// unterminated `start` with no matching `end` is left in place along with
/// everything after it, rather than dropped.
fn strip_delimited(text: &str, start: &str, end: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(s) = rest.find(start) {
        out.push_str(&rest[..s]);
        match rest[s..].find(end) {
            Some(e) => rest = &rest[s + e + end.len()..],
            None => {
                out.push_str(&rest[s..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Removes `<tag>...</tag>` blocks (and self-closing `<tag/>` variants). An
/// unterminated opening tag (no `>`, or no matching closing tag) is left in
/// place along with everything after it, rather than dropped.
fn strip_tag_block(text: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        match rest.find(&open) {
            None => {
                out.push_str(rest);
                return out;
            }
            Some(s) => {
                out.push_str(&rest[..s]);
                let after_open = &rest[s..];
                let tag_end = match after_open.find('>') {
                    Some(i) => i,
                    None => {
                        out.push_str(after_open);
                        return out;
                    }
                };
                if after_open.as_bytes()[tag_end - 1] == b'/' {
                    rest = &after_open[tag_end + 1..];
                    continue;
                }
                match after_open.find(&close) {
                    Some(c) => rest = &after_open[c + close.len()..],
                    None => {
                        out.push_str(after_open);
                        return out;
                    }
                }
            }
        }
    }
}

/// Removes `{{...}}` template invocations, honouring one level of nesting.
/// An unterminated `open` with no matching `close` is left in place along
/// with everything after it, rather than dropped.
fn strip_balanced(text: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(s) = rest.find(open) {
        out.push_str(&rest[..s]);
        let mut depth = 1usize;
        let mut cursor = s + open.len();
        loop {
            match (rest[cursor..].find(open), rest[cursor..].find(close)) {
                (Some(o), Some(c)) if o < c => {
                    depth += 1;
                    cursor += o + open.len();
                }
                (_, Some(c)) => {
                    depth -= 1;
                    cursor += c + close.len();
                    if depth == 0 {
                        break;
                    }
                }
                _ => {
                    out.push_str(&rest[s..]);
                    return out;
                }
            }
        }
        rest = &rest[cursor..];
    }
    out.push_str(rest);
    out
}

/// Rewrites `[[target|display]]` and `[[target]]` to just their visible
/// text, and drops `[single-bracket]` external-link markers entirely.
fn strip_wiki_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(s) = rest.find("[[") {
        out.push_str(&rest[..s]);
        match rest[s..].find("]]") {
            Some(e) => {
                let inner = &rest[s + 2..s + e];
                let display = inner.rsplit('|').next().unwrap_or(inner);
                out.push_str(display);
                rest = &rest[s + e + 2..];
            }
            None => {
                rest = &rest[s + 2..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comments_templates_refs_and_links() {
        let raw = "Intro <!-- note --> {{infobox|x=1}} See [[Apple|the apple]] and \
                   <ref>citation</ref> done.";
        let cleaned = MediaWikiMarkupStripper.strip(raw);
        assert!(!cleaned.contains("infobox"));
        assert!(!cleaned.contains("citation"));
        assert!(!cleaned.contains("note"));
        assert!(cleaned.contains("the apple"));
    }

    #[test]
    fn plain_text_passes_through() {
        let raw = "No markup here at all.";
        assert_eq!(MediaWikiMarkupStripper.strip(raw), raw);
    }

    #[test]
    fn unterminated_comment_keeps_the_rest_of_the_body() {
        let raw = "Intro text <!-- this comment never closes and the article keeps going";
        let cleaned = strip_delimited(raw, "<!--", "-->");
        assert!(cleaned.contains("Intro text"));
        assert!(cleaned.contains("the article keeps going"));
    }

    #[test]
    fn unterminated_ref_tag_keeps_the_rest_of_the_body() {
        let raw = "Before <ref>citation never closes, body continues after it";
        let cleaned = strip_tag_block(raw, "ref");
        assert!(cleaned.contains("Before"));
        assert!(cleaned.contains("body continues after it"));
    }

    #[test]
    fn unterminated_template_keeps_the_rest_of_the_body() {
        let raw = "Lead paragraph {{infobox starts but never closes, more text follows";
        let cleaned = strip_balanced(raw, "{{", "}}");
        assert!(cleaned.contains("Lead paragraph"));
        assert!(cleaned.contains("more text follows"));
    }

    #[test]
    fn unterminated_markup_does_not_truncate_a_whole_document() {
        let raw = "Apple is a fruit. <!-- stray note that never closes. Banana is also a fruit.";
        let cleaned = MediaWikiMarkupStripper.strip(raw);
        assert!(cleaned.contains("Apple is a fruit"));
        assert!(cleaned.contains("Banana is also a fruit"));
    }
}
