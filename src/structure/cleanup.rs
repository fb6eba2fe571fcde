//! Text cleanup for reconstructed prose.
//!
//! Runs after line joining and inline math splitting, on text segments only.
//! Math and link segments are never touched.

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::model::{Inline, Line};

/// Cleans prose text and turns bare URLs into links.
pub struct TextCleaner {
    ligature_map: Vec<(&'static str, &'static str)>,
    punctuation_map: Vec<(char, &'static str)>,
    spaces_regex: Regex,
    tight_punct_regex: Regex,
    url_regex: Regex,
}

impl TextCleaner {
    /// Create a cleaner.
    pub fn new() -> Self {
        Self {
            ligature_map: vec![
                ("\u{FB00}", "ff"),
                ("\u{FB01}", "fi"),
                ("\u{FB02}", "fl"),
                ("\u{FB03}", "ffi"),
                ("\u{FB04}", "ffl"),
                ("\u{FB05}", "st"),
                ("\u{FB06}", "st"),
            ],
            punctuation_map: vec![
                ('\u{201C}', "\""),
                ('\u{201D}', "\""),
                ('\u{201E}', "\""),
                ('\u{2018}', "'"),
                ('\u{2019}', "'"),
                ('\u{201A}', "'"),
                ('\u{2026}', "..."),
                ('\u{2013}', "-"),
                ('\u{2014}', "-"),
                ('\u{00A0}', " "),
                ('\u{00AD}', ""),
                ('\u{FFFD}', ""),
            ],
            spaces_regex: Regex::new(r"[ \t]{2,}").expect("spaces pattern is valid"),
            tight_punct_regex: Regex::new(r"[ \t]+([,.;:?!]+)(\s|$)")
                .expect("punctuation pattern is valid"),
            url_regex: Regex::new(r"\b[A-Za-z][A-Za-z0-9+.-]*://[^\s)<>]+")
                .expect("url pattern is valid"),
        }
    }

    /// Normalize one run of prose.
    ///
    /// NFC, ligature expansion, typographic punctuation to ASCII, private-use
    /// characters removed, space runs collapsed and spaces before
    /// punctuation removed when the punctuation ends a word. Leading and
    /// trailing whitespace is kept so that segments around inline math still
    /// join correctly.
    pub fn clean(&self, text: &str) -> String {
        let mut result: String = text.nfc().collect();

        for (ligature, replacement) in &self.ligature_map {
            result = result.replace(ligature, replacement);
        }

        let mut mapped = String::with_capacity(result.len());
        for c in result.chars() {
            if is_private_use(c) {
                continue;
            }
            match self.punctuation_map.iter().find(|(from, _)| *from == c) {
                Some((_, to)) => mapped.push_str(to),
                None => mapped.push(c),
            }
        }

        let collapsed = self.spaces_regex.replace_all(&mapped, " ");
        self.tight_punct_regex
            .replace_all(&collapsed, "${1}${2}")
            .into_owned()
    }

    /// Split text into plain runs and `Link` segments for bare URLs.
    pub fn linkify(&self, text: &str) -> Vec<Inline> {
        let mut out = Vec::new();
        let mut cursor = 0;
        for m in self.url_regex.find_iter(text) {
            let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
            if url.split_once("://").map_or(true, |(_, rest)| rest.is_empty()) {
                continue;
            }
            if m.start() > cursor {
                out.push(Inline::text(&text[cursor..m.start()]));
            }
            out.push(Inline::Link {
                text: url.to_string(),
                url: url.to_string(),
            });
            cursor = m.start() + url.len();
        }
        if cursor < text.len() {
            out.push(Inline::text(&text[cursor..]));
        }
        out
    }

    /// Clean and linkify every text segment of an inline sequence.
    pub fn clean_inlines(&self, content: Vec<Inline>) -> Vec<Inline> {
        let mut out = Vec::with_capacity(content.len());
        for inline in content {
            match inline {
                Inline::Text { text } => {
                    let cleaned = self.clean(&text);
                    out.extend(self.linkify(&cleaned));
                }
                other => out.push(other),
            }
        }
        trim_edges(&mut out);
        out
    }

    /// Re-apply bold and italic runs to cleaned content.
    ///
    /// Runs are matched in order against the text segments; a run whose
    /// text no longer appears (for example after hyphen repair) is skipped.
    pub fn emphasize(&self, content: Vec<Inline>, runs: &[StyledRun]) -> Vec<Inline> {
        let needles: Vec<(String, bool, bool)> = runs
            .iter()
            .map(|r| (self.clean(&r.text).trim().to_string(), r.bold, r.italic))
            .filter(|(text, _, _)| !text.is_empty())
            .collect();
        if needles.is_empty() {
            return content;
        }

        let mut next = 0;
        let mut out = Vec::with_capacity(content.len());
        for (index, inline) in content.iter().enumerate() {
            let Inline::Text { text } = inline else {
                out.push(inline.clone());
                continue;
            };
            let mut rest = text.as_str();
            while let Some((needle, bold, italic)) = needles.get(next) {
                match rest.find(needle.as_str()) {
                    Some(pos) => {
                        if pos > 0 {
                            out.push(Inline::text(&rest[..pos]));
                        }
                        out.push(Inline::Emphasis {
                            text: needle.clone(),
                            bold: *bold,
                            italic: *italic,
                        });
                        rest = &rest[pos + needle.len()..];
                        next += 1;
                    }
                    None => {
                        let later = content[index + 1..].iter().any(|i| {
                            matches!(i, Inline::Text { text } if text.contains(needle.as_str()))
                        });
                        if later {
                            break;
                        }
                        next += 1;
                    }
                }
            }
            if !rest.is_empty() {
                out.push(Inline::text(rest));
            }
        }
        out
    }
}

/// Consecutive spans set in the same bold or italic font.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledRun {
    /// Span texts joined with single spaces
    pub text: String,
    /// Bold weight
    pub bold: bool,
    /// Italic style
    pub italic: bool,
}

/// Collect styled runs from lines in reading order. A run that ends one
/// line continues on the next when the style carries over.
pub fn styled_runs<'a>(lines: impl IntoIterator<Item = &'a Line>) -> Vec<StyledRun> {
    let mut runs: Vec<StyledRun> = Vec::new();
    let mut open = false;
    for line in lines {
        for span in line.spans.iter().filter(|s| !s.text.trim().is_empty()) {
            let styled = span.bold || span.italic;
            match runs.last_mut() {
                Some(run) if open && styled && run.bold == span.bold && run.italic == span.italic => {
                    run.text.push(' ');
                    run.text.push_str(span.text.trim());
                }
                _ if styled => runs.push(StyledRun {
                    text: span.text.trim().to_string(),
                    bold: span.bold,
                    italic: span.italic,
                }),
                _ => {}
            }
            open = styled;
        }
    }
    runs
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new()
    }
}

fn is_private_use(c: char) -> bool {
    let code = c as u32;
    (0xE000..=0xF8FF).contains(&code)
        || (0xF0000..=0xFFFFD).contains(&code)
        || (0x100000..=0x10FFFD).contains(&code)
}

/// Trim leading whitespace of the first and trailing whitespace of the last text segment.
fn trim_edges(content: &mut Vec<Inline>) {
    if let Some(Inline::Text { text }) = content.first_mut() {
        *text = text.trim_start().to_string();
    }
    if let Some(Inline::Text { text }) = content.last_mut() {
        *text = text.trim_end().to_string();
    }
    content.retain(|i| !matches!(i, Inline::Text { text } if text.is_empty()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Span};

    #[test]
    fn test_unicode_normalization() {
        let cleaner = TextCleaner::new();
        let nfd = "cafe\u{0301}";
        assert_eq!(cleaner.clean(nfd), "café");
    }

    #[test]
    fn test_ligature_fix() {
        let cleaner = TextCleaner::new();
        assert_eq!(cleaner.clean("e\u{FB03}cient \u{FB01}le"), "efficient file");
    }

    #[test]
    fn test_punctuation_normalized() {
        let cleaner = TextCleaner::new();
        assert_eq!(
            cleaner.clean("\u{201C}Quoted\u{201D} and it\u{2019}s 1\u{2013}2\u{2026}"),
            "\"Quoted\" and it's 1-2..."
        );
    }

    #[test]
    fn test_spaces_collapsed_and_tightened() {
        let cleaner = TextCleaner::new();
        assert_eq!(cleaner.clean("word  ,  next   word ."), "word, next word.");
    }

    #[test]
    fn test_dot_before_word_kept() {
        let cleaner = TextCleaner::new();
        assert_eq!(cleaner.clean("built on version .NET 8 ."), "built on version .NET 8.");
        assert_eq!(cleaner.clean("wait ... what"), "wait... what");
    }

    #[test]
    fn test_edge_spaces_kept() {
        let cleaner = TextCleaner::new();
        assert_eq!(cleaner.clean(" in joules "), " in joules ");
    }

    #[test]
    fn test_private_use_removed() {
        let cleaner = TextCleaner::new();
        assert_eq!(cleaner.clean("a\u{E001}b\u{FFFD}"), "ab");
    }

    #[test]
    fn test_linkify() {
        let cleaner = TextCleaner::new();
        let parts = cleaner.linkify("See https://example.com/docs. Then go");
        assert_eq!(
            parts,
            vec![
                Inline::text("See "),
                Inline::Link {
                    text: "https://example.com/docs".into(),
                    url: "https://example.com/docs".into(),
                },
                Inline::text(". Then go"),
            ]
        );
    }

    #[test]
    fn test_linkify_other_schemes() {
        let cleaner = TextCleaner::new();
        let parts =
            cleaner.linkify("Download the archive from ftp://files.example.org/pub/data.tar today.");
        assert_eq!(
            parts[1],
            Inline::Link {
                text: "ftp://files.example.org/pub/data.tar".into(),
                url: "ftp://files.example.org/pub/data.tar".into(),
            }
        );
        assert_eq!(parts.len(), 3);
        assert_eq!(cleaner.linkify("no link in ://nothing"), vec![Inline::text("no link in ://nothing")]);
    }

    #[test]
    fn test_styled_runs_merge_across_lines() {
        let span = |text: &str, font: &str, x0: f32| {
            Span::new(text, font, 10.0, BoundingBox::new(x0, 0.0, x0 + 40.0, 10.0))
        };
        let lines = [
            Line::new(vec![span("plain", "Times-Roman", 0.0), span("very", "Times-Bold", 50.0)]),
            Line::new(vec![span("bold", "Times-Bold", 0.0), span("then", "Times-Italic", 50.0)]),
        ];
        assert_eq!(
            styled_runs(&lines),
            vec![
                StyledRun {
                    text: "very bold".into(),
                    bold: true,
                    italic: false,
                },
                StyledRun {
                    text: "then".into(),
                    bold: false,
                    italic: true,
                },
            ]
        );
    }

    #[test]
    fn test_emphasize() {
        let cleaner = TextCleaner::new();
        let runs = [
            StyledRun {
                text: "important".into(),
                bold: true,
                italic: false,
            },
            StyledRun {
                text: "missing".into(),
                bold: false,
                italic: true,
            },
        ];
        let out = cleaner.emphasize(
            vec![Inline::text("an important word and an important echo")],
            &runs,
        );
        assert_eq!(
            out,
            vec![
                Inline::text("an "),
                Inline::Emphasis {
                    text: "important".into(),
                    bold: true,
                    italic: false,
                },
                Inline::text(" word and an important echo"),
            ]
        );
    }

    #[test]
    fn test_clean_inlines_skips_math() {
        let cleaner = TextCleaner::new();
        let out = cleaner.clean_inlines(vec![
            Inline::text("  value\u{2019}s "),
            Inline::math("x  ,  y"),
            Inline::text(" end  "),
        ]);
        assert_eq!(
            out,
            vec![
                Inline::text("value's "),
                Inline::math("x  ,  y"),
                Inline::text(" end"),
            ]
        );
    }
}
