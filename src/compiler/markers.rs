//! Pre-processing that hides text from every later pass.
//!
//! Verbatim blocks, comments and `@@` escapes are swapped for private-use
//! sentinels before the structural pass runs. Each hidden region keeps its
//! newlines (as filler lines) so that line numbers in errors stay accurate.
//! [`Markers::restore`] turns the sentinels back into literal text when the
//! final text nodes are built.

use regex::{Captures, Regex};
use std::sync::LazyLock;

const VERBATIM_OPEN: char = '\u{E000}';
const VERBATIM_CLOSE: char = '\u{E001}';
const FILLER: char = '\u{E002}';
const ESCAPED_AT: char = '\u{E003}';

static VERBATIM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)@verbatim\s*(.*?)@endverbatim").expect("Invalid regex pattern")
});

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{--.*?--\}\}").expect("Invalid regex pattern"));

static ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@@([A-Za-z])").expect("Invalid regex pattern"));

static SENTINELS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\u{E000}(\\d+)\u{E001}(?:\u{E002}\n)*|(?:\u{E002}\n)+|\u{E002}|\u{E003}")
        .expect("Invalid regex pattern")
});

/// Hidden regions of one template.
#[derive(Debug, Default)]
pub struct Markers {
    verbatim: Vec<String>,
}

impl Markers {
    /// Hide verbatim blocks, comments and escapes in `source`.
    pub fn protect(source: &str) -> (String, Markers) {
        let mut markers = Markers::default();

        let text = VERBATIM.replace_all(source, |caps: &Captures| {
            let index = markers.verbatim.len();
            markers.verbatim.push(caps[1].to_string());
            let mut placeholder = format!("{}{}{}", VERBATIM_OPEN, index, VERBATIM_CLOSE);
            placeholder.push_str(&filler(&caps[0]));
            placeholder
        });

        let text = COMMENT.replace_all(&text, |caps: &Captures| filler(&caps[0]));
        let text = ESCAPE.replace_all(&text, |caps: &Captures| format!("{}{}", ESCAPED_AT, &caps[1]));

        (text.into_owned(), markers)
    }

    /// Turn sentinels back into the text they stand for.
    pub fn restore(&self, text: &str) -> String {
        if !text.contains([VERBATIM_OPEN, FILLER, ESCAPED_AT]) {
            return text.to_string();
        }
        SENTINELS
            .replace_all(text, |caps: &Captures| match caps.get(1) {
                Some(index) => index
                    .as_str()
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.verbatim.get(i))
                    .cloned()
                    .unwrap_or_default(),
                None if caps[0].starts_with(ESCAPED_AT) => "@".to_string(),
                None => String::new(),
            })
            .into_owned()
    }
}

/// One filler line per newline in `hidden`.
fn filler(hidden: &str) -> String {
    let lines = hidden.matches('\n').count();
    let mut out = String::with_capacity(lines * 4);
    for _ in 0..lines {
        out.push(FILLER);
        out.push('\n');
    }
    out
}
