// @module: Caption layout and escaping

/// Width of a run of text in pixels
pub trait TextMeasure: Send + Sync {
    /// Rendered width of `text` on one line
    fn width(&self, text: &str) -> f32;
}

/// Measure that gives every character the same advance.
///
/// Used when no font file is available to measure real glyphs.
#[derive(Debug, Clone, Copy)]
pub struct FixedAdvance {
    // @field: Advance of one character in pixels
    pub advance: f32,
}

impl FixedAdvance {
    /// Average advance of a proportional sans font at `font_size`
    pub fn for_font_size(font_size: f32) -> Self {
        Self {
            advance: font_size * 0.55,
        }
    }
}

impl TextMeasure for FixedAdvance {
    fn width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.advance
    }
}

/// Wrap text into lines no wider than `max_width`.
///
/// Lines break at whitespace. A word that does not fit on an empty line is
/// broken between characters; its last piece starts the next line so the
/// following words can join it.
pub fn wrap_caption(measure: &dyn TextMeasure, text: &str, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if measure.width(&candidate) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if measure.width(word) <= max_width {
            current = word.to_string();
            continue;
        }

        let mut piece = String::new();
        for ch in word.chars() {
            let mut next = piece.clone();
            next.push(ch);
            if !piece.is_empty() && measure.width(&next) > max_width {
                lines.push(std::mem::replace(&mut piece, ch.to_string()));
            } else {
                piece = next;
            }
        }
        current = piece;
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Escape caption text for a `drawtext` `text=` option inside a filter graph.
///
/// Two levels apply: the option parser (`\`, `'`, `:`) and then the filter
/// graph parser (`\`, `'`, `[`, `]`, `,`, `;`). The filter must also set
/// `expansion=none` so `%` is taken literally.
pub fn escape_drawtext(text: &str) -> String {
    let option_level = escape_chars(text, &['\\', '\'', ':']);
    escape_chars(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(text: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        if special.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
