use once_cell::sync::Lazy;
use regex::Regex;

// @module: Sentence segmentation

// @const: Sentence punctuation followed by a whitespace run
static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[.!?]\s+").unwrap()
});

/// Split text into sentence units.
///
/// A boundary is a whitespace run preceded by `.`, `!` or `?`; the punctuation
/// stays with the preceding unit. Pieces are trimmed and empty pieces dropped.
/// When nothing survives, the original text is returned as the only unit, so
/// the result is never empty. Abbreviations and decimals are not special-cased.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        // Punctuation is ASCII, so the cut after it is a char boundary
        let end = boundary.start() + 1;
        push_trimmed(&mut units, &text[start..end]);
        start = boundary.end();
    }
    push_trimmed(&mut units, &text[start..]);

    if units.is_empty() {
        units.push(text.to_string());
    }
    units
}

fn push_trimmed(units: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        units.push(piece.to_string());
    }
}

/// Pack sentences into chunks of at most `max_chars` characters.
///
/// Whole sentences are joined with a space while they fit. A sentence that is
/// too long on its own is split at word boundaries, and a single word that is
/// still too long is cut into character runs. Blank input yields no chunks.
pub fn pack_sentences(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        if sentence.trim().is_empty() {
            continue;
        }
        if append_fits(&current, &sentence, max_chars) {
            append(&mut current, &sentence);
            continue;
        }
        flush(&mut chunks, &mut current);

        if char_len(&sentence) <= max_chars {
            current = sentence;
            continue;
        }

        for word in sentence.split_whitespace() {
            if append_fits(&current, word, max_chars) {
                append(&mut current, word);
                continue;
            }
            flush(&mut chunks, &mut current);

            if char_len(word) <= max_chars {
                current = word.to_string();
                continue;
            }
            let chars: Vec<char> = word.chars().collect();
            for run in chars.chunks(max_chars) {
                flush(&mut chunks, &mut current);
                current = run.iter().collect();
            }
        }
    }
    flush(&mut chunks, &mut current);

    chunks
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn append_fits(current: &str, next: &str, max_chars: usize) -> bool {
    if current.is_empty() {
        char_len(next) <= max_chars
    } else {
        char_len(current) + 1 + char_len(next) <= max_chars
    }
}

fn append(current: &mut String, next: &str) {
    if !current.is_empty() {
        current.push(' ');
    }
    current.push_str(next);
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}
