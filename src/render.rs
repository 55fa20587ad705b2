//! Annotated text rendering.
//!
//! Pipelines return sequences of word pieces, some flagged with a confidence.
//! [`PieceDecoder`] turns vocabulary pieces into display fragments through the
//! tokenizer's own decoder, [`AnnotatedText`] merges the fragments back into
//! words, and the result can be shown in a terminal (via
//! [`Display`](std::fmt::Display)) or as an HTML fragment via
//! [`HtmlRenderer`], where flagged words get a colored background whose
//! opacity is the confidence.

use std::fmt;

use tokenizers::{Decoder, Tokenizer};

use crate::error::{PipelineError, Result};

/// A word piece with an optional highlight strength in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedToken {
    /// Display text of the piece, without word-boundary markers.
    pub text: String,
    /// Whether the piece begins a new word.
    pub starts_word: bool,
    /// Highlight opacity, `None` for plain text.
    pub highlight: Option<f32>,
}

impl AnnotatedToken {
    /// Unflagged WordPiece piece (`##` marks a continuation).
    pub fn plain(piece: &str) -> Self {
        Self::word_piece(piece, None)
    }

    /// Flagged WordPiece piece with the given strength.
    pub fn highlighted(piece: &str, strength: f32) -> Self {
        Self::word_piece(piece, Some(strength))
    }

    fn word_piece(piece: &str, highlight: Option<f32>) -> Self {
        match piece.strip_prefix("##") {
            Some(rest) => Self {
                text: rest.to_string(),
                starts_word: false,
                highlight,
            },
            None => Self {
                text: piece.to_string(),
                starts_word: true,
                highlight,
            },
        }
    }

    /// A decoded fragment; leading whitespace marks the start of a word.
    pub fn from_fragment(fragment: &str, highlight: Option<f32>) -> Self {
        let text = fragment.trim_start();
        Self {
            starts_word: text.len() != fragment.len(),
            text: text.to_string(),
            highlight,
        }
    }
}

// Decoded ahead of every piece so decoders treat the piece as non-initial.
const ANCHOR: &str = "a";

/// Maps vocabulary pieces to display fragments using the tokenizer's decoder.
///
/// A fragment starts with whitespace when its piece begins a word: WordPiece
/// marks continuations with `##`, byte-level BPE marks word starts with `Ġ`,
/// SentencePiece with `▁`. Tokenizers without a decoder are read as WordPiece.
#[derive(Debug, Clone, Copy)]
pub struct PieceDecoder<'a> {
    tokenizer: &'a Tokenizer,
}

impl<'a> PieceDecoder<'a> {
    /// Decoder over `tokenizer`'s vocabulary.
    pub fn new(tokenizer: &'a Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Display text of `piece`, with a leading space when it begins a word.
    pub fn fragment(&self, piece: &str) -> Result<String> {
        let Some(decoder) = self.tokenizer.get_decoder() else {
            return Ok(match piece.strip_prefix("##") {
                Some(rest) => rest.to_string(),
                None => format!(" {piece}"),
            });
        };

        let decoded = decoder
            .decode_chain(vec![ANCHOR.to_string(), piece.to_string()])
            .map_err(|e| {
                PipelineError::Tokenization(format!("Failed to decode piece '{piece}': {e}"))
            })?;

        // Byte-level and fusing decoders return one joined string.
        Ok(match decoded.as_slice() {
            [_, fragment] => fragment.clone(),
            _ => {
                let joined = decoded.concat();
                match joined.strip_prefix(ANCHOR) {
                    Some(rest) => rest.to_string(),
                    None => joined,
                }
            }
        })
    }

    /// Annotated token for `piece`.
    pub fn token(&self, piece: &str, highlight: Option<f32>) -> Result<AnnotatedToken> {
        Ok(AnnotatedToken::from_fragment(&self.fragment(piece)?, highlight))
    }
}

/// A whole word rebuilt from one or more pieces.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedWord {
    /// Word text without continuation markers.
    pub text: String,
    /// Strongest highlight among the word's pieces.
    pub highlight: Option<f32>,
}

/// Words ready for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotatedText {
    /// Words in reading order.
    pub words: Vec<AnnotatedWord>,
}

impl AnnotatedText {
    /// Merges pieces that continue a word into the preceding word.
    pub fn from_tokens(tokens: &[AnnotatedToken]) -> Self {
        let mut words: Vec<AnnotatedWord> = Vec::new();
        for token in tokens {
            if !token.starts_word {
                if let Some(word) = words.last_mut() {
                    word.text.push_str(&token.text);
                    word.highlight = match (word.highlight, token.highlight) {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        (a, b) => a.or(b),
                    };
                    continue;
                }
            }
            words.push(AnnotatedWord {
                text: token.text.clone(),
                highlight: token.highlight,
            });
        }
        Self { words }
    }

    /// Plain text with highlights dropped.
    pub fn plain_text(&self) -> String {
        join_words(self.words.iter().map(|w| w.text.clone()))
    }

    /// Number of highlighted words.
    pub fn highlighted_count(&self) -> usize {
        self.words.iter().filter(|w| w.highlight.is_some()).count()
    }
}

impl fmt::Display for AnnotatedText {
    /// Highlighted words are wrapped in `[brackets]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = self.words.iter().map(|w| match w.highlight {
            Some(_) => format!("[{}]", w.text),
            None => w.text.clone(),
        });
        write!(f, "{}", join_words(words))
    }
}

// WordPiece splits "world's" into `world ' s`, so an apostrophe joins both sides.
fn attaches_left(word: &str) -> bool {
    matches!(word, "." | "," | "!" | "?" | ";" | ":" | ")" | "]" | "}" | "'")
}

fn attaches_right(word: &str) -> bool {
    matches!(word, "(" | "[" | "{" | "'")
}

fn join_words(words: impl Iterator<Item = String>) -> String {
    let mut out = String::new();
    let mut glue_next = true;
    for word in words {
        // Bracketed terminal words still attach by their inner text.
        let bare = word.trim_start_matches('[').trim_end_matches(']');
        if !glue_next && !attaches_left(bare) {
            out.push(' ');
        }
        glue_next = attaches_right(bare);
        out.push_str(&word);
    }
    out
}

/// An RGB color for highlight backgrounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Predictions.
    pub const RED: Rgb = Rgb(255, 0, 0);
    /// Masked source words.
    pub const BLUE: Rgb = Rgb(0, 0, 255);
}

/// Renders [`AnnotatedText`] as an HTML fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlRenderer {
    /// Background color of highlighted words.
    pub color: Rgb,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self { color: Rgb::RED }
    }
}

impl HtmlRenderer {
    /// Renderer highlighting in `color`.
    pub fn new(color: Rgb) -> Self {
        Self { color }
    }

    /// Escaped text with highlighted words wrapped in colored spans.
    pub fn render(&self, text: &AnnotatedText) -> String {
        let Rgb(r, g, b) = self.color;
        let words = text.words.iter().map(|word| {
            let escaped = escape_html(&word.text);
            match word.highlight {
                Some(strength) => format!(
                    "<span style=\"background-color: rgba({r},{g},{b},{:.2})\" title=\"{:.4}\">{escaped}</span>",
                    strength.clamp(0.0, 1.0),
                    strength
                ),
                None => escaped,
            }
        });

        let mut html = String::from("<p>");
        let mut glue_next = true;
        for (word, rendered) in text.words.iter().zip(words) {
            if !glue_next && !attaches_left(&word.text) {
                html.push(' ');
            }
            glue_next = attaches_right(&word.text);
            html.push_str(&rendered);
        }
        html.push_str("</p>");
        html
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{byte_level_tokenizer, tiny_tokenizer};

    fn plain_text_of(pieces: &[&str]) -> String {
        let tokens: Vec<_> = pieces.iter().map(|p| AnnotatedToken::plain(p)).collect();
        AnnotatedText::from_tokens(&tokens).plain_text()
    }

    #[test]
    fn merges_continuation_pieces() {
        assert_eq!(
            plain_text_of(&["the", "cat", "##s", "play", "##ing", "."]),
            "the cats playing."
        );
    }

    #[test]
    fn apostrophe_joins_split_contractions() {
        assert_eq!(plain_text_of(&["the", "world", "'", "s", "park"]), "the world's park");
    }

    #[test]
    fn fragments_mark_word_starts_with_whitespace() {
        let text = AnnotatedText::from_tokens(&[
            AnnotatedToken::from_fragment("the", None),
            AnnotatedToken::from_fragment(" cat", None),
            AnnotatedToken::from_fragment("s", Some(0.3)),
            AnnotatedToken::from_fragment(" sat", None),
        ]);
        assert_eq!(text.plain_text(), "the cats sat");
        assert_eq!(text.words[1].highlight, Some(0.3));
    }

    #[test]
    fn word_piece_fragments_follow_decoder() {
        let tokenizer = tiny_tokenizer();
        let decoder = PieceDecoder::new(&tokenizer);
        assert_eq!(decoder.fragment("cat").unwrap(), " cat");
        assert_eq!(decoder.fragment("##s").unwrap(), "s");
        assert_eq!(decoder.fragment(".").unwrap(), ".");
    }

    #[test]
    fn byte_level_fragments_drop_markers() {
        let tokenizer = byte_level_tokenizer();
        let decoder = PieceDecoder::new(&tokenizer);
        assert_eq!(decoder.fragment("the").unwrap(), "the");
        assert_eq!(decoder.fragment("Ġcat").unwrap(), " cat");
        assert_eq!(decoder.fragment("s").unwrap(), "s");

        let tokens: Vec<_> = ["the", "Ġcat", "s", "Ġsat"]
            .iter()
            .map(|p| decoder.token(p, None).unwrap())
            .collect();
        assert_eq!(AnnotatedText::from_tokens(&tokens).plain_text(), "the cats sat");
    }

    #[test]
    fn word_takes_strongest_piece_highlight() {
        let text = AnnotatedText::from_tokens(&[
            AnnotatedToken::plain("play"),
            AnnotatedToken::highlighted("##ing", 0.4),
            AnnotatedToken::highlighted("park", 0.9),
        ]);
        assert_eq!(
            text.words,
            vec![
                AnnotatedWord {
                    text: "playing".into(),
                    highlight: Some(0.4)
                },
                AnnotatedWord {
                    text: "park".into(),
                    highlight: Some(0.9)
                },
            ]
        );
        assert_eq!(text.highlighted_count(), 2);
    }

    #[test]
    fn leading_continuation_is_kept_as_word() {
        let text = AnnotatedText::from_tokens(&[AnnotatedToken::plain("##s")]);
        assert_eq!(text.plain_text(), "s");
    }

    #[test]
    fn terminal_display_brackets_highlights() {
        let text = AnnotatedText::from_tokens(&[
            AnnotatedToken::plain("a"),
            AnnotatedToken::highlighted("dog", 0.5),
            AnnotatedToken::highlighted(".", 0.1),
        ]);
        assert_eq!(text.to_string(), "a [dog][.]");
    }

    #[test]
    fn html_wraps_highlights_and_escapes() {
        let text = AnnotatedText::from_tokens(&[
            AnnotatedToken::plain("<b>"),
            AnnotatedToken::highlighted("cat", 0.25),
            AnnotatedToken::plain(","),
            AnnotatedToken::plain("dog"),
        ]);
        let html = HtmlRenderer::new(Rgb::BLUE).render(&text);
        assert_eq!(
            html,
            "<p>&lt;b&gt; <span style=\"background-color: rgba(0,0,255,0.25)\" title=\"0.2500\">cat</span>, dog</p>"
        );
    }

    #[test]
    fn html_clamps_opacity() {
        let text = AnnotatedText::from_tokens(&[AnnotatedToken::highlighted("x", 1.7)]);
        let html = HtmlRenderer::default().render(&text);
        assert!(html.contains("rgba(255,0,0,1.00)"));
    }
}
