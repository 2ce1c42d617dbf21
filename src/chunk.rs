//! Paragraph-boundary text chunker.
//!
//! Paragraphs (separated by `\n\n`) are packed greedily into chunks of at
//! most `max_chars` characters. A paragraph longer than `max_chars` is cut
//! on its own, preferring a newline or space near the limit. Lengths are
//! counted in `char`s so multi-byte text never splits inside a code point.

/// Split `text` into chunks. Blank input yields no chunks.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0usize;

    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        let para_chars = para.chars().count();

        let would_be = if buf.is_empty() {
            para_chars
        } else {
            buf_chars + 2 + para_chars
        };
        if would_be > max_chars && !buf.is_empty() {
            chunks.push(std::mem::take(&mut buf));
            buf_chars = 0;
        }

        if para_chars > max_chars {
            chunks.extend(hard_split(para, max_chars));
            continue;
        }

        if !buf.is_empty() {
            buf.push_str("\n\n");
            buf_chars += 2;
        }
        buf.push_str(para);
        buf_chars += para_chars;
    }

    if !buf.is_empty() {
        chunks.push(buf);
    }
    chunks
}

fn hard_split(para: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = para.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + max_chars).min(chars.len());
        if end < chars.len() {
            if let Some(pos) = chars[start..end]
                .iter()
                .rposition(|c| *c == '\n' || *c == ' ')
            {
                if pos > 0 {
                    end = start + pos + 1;
                }
            }
        }
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        start = end;
    }
    pieces
}
