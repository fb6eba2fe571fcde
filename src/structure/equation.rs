//! Equation engine.
//!
//! Finds runs of Unicode math notation in text lines and rewrites them as
//! LaTeX. Conversion is a fixed table lookup plus brace insertion for
//! super/subscript runs and radicals. Unknown characters stay as they are.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Block, BlockKind, DocumentNode, Inline, Line};
use crate::options::EquationConfig;

use super::PageItem;

/// Widest line, as a share of page width, that still counts as a centred display line.
const DISPLAY_MAX_WIDTH_RATIO: f32 = 0.75;

/// Longest all-Greek token treated as math rather than Greek prose.
const MAX_GREEK_SYMBOL_LEN: usize = 3;

/// Longest plain token pulled into a math region next to an operator.
const MAX_OPERAND_LEN: usize = 4;

/// Detects math in blocks and lines and converts it to LaTeX.
#[derive(Debug, Clone)]
pub struct EquationEngine {
    config: EquationConfig,
}

impl EquationEngine {
    /// Create an engine with the given thresholds.
    pub fn new(config: EquationConfig) -> Self {
        Self { config }
    }

    /// Whether the whole line is math (or already `$`-delimited).
    pub fn is_math_line(&self, text: &str) -> bool {
        if !self.config.enabled {
            return false;
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }
        if let Some((inner, _)) = strip_delimiters(trimmed) {
            return !inner.is_empty();
        }
        match self.math_regions(trimmed).as_slice() {
            [region] => {
                trimmed[..region.start]
                    .chars()
                    .all(|c| c.is_whitespace() || matches!(c, '(' | '[' | '{'))
                    && trimmed[region.end..].chars().all(|c| {
                        c.is_whitespace() || is_trailing_punct(c) || matches!(c, ')' | ']' | '}')
                    })
            }
            _ => false,
        }
    }

    /// Byte ranges of math regions in a line of prose.
    ///
    /// Empty when the regions cover less of the line's visible characters
    /// than the configured density threshold.
    pub fn math_regions(&self, text: &str) -> Vec<Range<usize>> {
        if !self.config.enabled {
            return Vec::new();
        }
        let tokens = tokenize(text);
        let kinds: Vec<TokenKind> = tokens
            .iter()
            .map(|r| classify_token(&text[r.clone()]))
            .collect();

        let mut spans: Vec<(usize, usize)> = Vec::new();
        for (i, kind) in kinds.iter().enumerate() {
            if !kind.is_math() {
                continue;
            }
            let (mut lo, mut hi) = (i, i);

            let mut need_operand = kinds[i].is_operator();
            while lo > 0 {
                let next = kinds[lo - 1];
                if next == TokenKind::Word || (next == TokenKind::Operand && !need_operand) {
                    break;
                }
                need_operand = next.is_operator();
                lo -= 1;
            }
            // A region never starts on a dangling ASCII operator.
            while lo < i && kinds[lo] == TokenKind::Operator {
                lo += 1;
            }

            need_operand = kinds[i].is_operator();
            while hi + 1 < kinds.len() {
                let next = kinds[hi + 1];
                if next == TokenKind::Word || (next == TokenKind::Operand && !need_operand) {
                    break;
                }
                need_operand = next.is_operator();
                hi += 1;
            }

            match spans.last_mut() {
                Some(last) if lo <= last.1 + 1 => last.1 = last.1.max(hi),
                _ => spans.push((lo, hi)),
            }
        }

        let regions: Vec<Range<usize>> = spans
            .into_iter()
            .filter_map(|(lo, hi)| trim_region(text, tokens[lo].start, tokens[hi].end))
            .collect();

        let visible = visible_chars(text);
        let covered: usize = regions.iter().map(|r| visible_chars(&text[r.clone()])).sum();
        if visible == 0 || (covered as f32 / visible as f32) < self.config.min_math_density {
            return Vec::new();
        }
        regions
    }

    /// Split prose into text and inline math.
    ///
    /// `$...$` and `$$...$$` spans pass through untouched; other math regions
    /// are converted to LaTeX.
    pub fn split_inline(&self, text: &str) -> Vec<Inline> {
        let mut out: Vec<Inline> = Vec::new();
        let mut cursor = 0;

        for caps in delimited_math().captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if text[whole.end()..].starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            self.split_undelimited(&text[cursor..whole.start()], &mut out);
            let (latex, display) = match (caps.get(1), caps.get(2)) {
                (Some(m), _) => (m.as_str(), true),
                (None, Some(m)) => (m.as_str(), false),
                (None, None) => continue,
            };
            out.push(Inline::Math {
                latex: latex.to_string(),
                display,
            });
            cursor = whole.end();
        }
        self.split_undelimited(&text[cursor..], &mut out);
        out
    }

    fn split_undelimited(&self, text: &str, out: &mut Vec<Inline>) {
        if text.is_empty() {
            return;
        }
        let mut cursor = 0;
        for region in self.math_regions(text) {
            push_text(out, &text[cursor..region.start]);
            out.push(Inline::math(to_latex(&text[region.clone()])));
            cursor = region.end;
        }
        push_text(out, &text[cursor..]);
    }

    /// Turn math-only lines into equation nodes.
    ///
    /// In an equation-candidate block every line becomes an equation. In
    /// other prose blocks only display lines (centred or `$$`-delimited) are
    /// lifted out; left-aligned math stays in the paragraph as inline math.
    pub fn detect_and_convert(&self, items: Vec<PageItem>, page_width: f32) -> Vec<PageItem> {
        if !self.config.enabled {
            return items;
        }
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                PageItem::Block(block) if is_prose(&block) => {
                    out.extend(self.convert_block(block, page_width));
                }
                other => out.push(other),
            }
        }
        out
    }

    fn convert_block(&self, block: Block, page_width: f32) -> Vec<PageItem> {
        let whole_block = block.kind == BlockKind::EquationCandidate;
        let texts: Vec<String> = block.lines.iter().map(|l| l.text()).collect();
        let lifted: Vec<bool> = block
            .lines
            .iter()
            .zip(&texts)
            .map(|(line, text)| {
                self.is_math_line(text)
                    && (whole_block || self.is_display_line(line, text, page_width))
            })
            .collect();

        if !lifted.iter().any(|l| *l) {
            return vec![PageItem::Block(block)];
        }

        let mut out = Vec::new();
        let mut prose: Vec<Line> = Vec::new();
        let mut i = 0;
        while i < block.lines.len() {
            if !lifted[i] {
                prose.push(block.lines[i].clone());
                i += 1;
                continue;
            }
            if !prose.is_empty() {
                out.push(PageItem::Block(
                    block
                        .with_lines(std::mem::take(&mut prose))
                        .with_kind(BlockKind::Paragraph),
                ));
            }

            let display = self.is_display_line(&block.lines[i], &texts[i], page_width);
            let mut raw = texts[i].trim().to_string();
            i += 1;
            while needs_continuation(&raw) && i < block.lines.len() {
                raw.push(' ');
                raw.push_str(texts[i].trim());
                i += 1;
            }
            log::debug!("Equation: {:?} (display={})", raw, display);
            out.push(PageItem::Node(self.equation_node(&raw, display)));
        }
        if !prose.is_empty() {
            out.push(PageItem::Block(
                block.with_lines(prose).with_kind(BlockKind::Paragraph),
            ));
        }
        out
    }

    fn equation_node(&self, raw: &str, display: bool) -> DocumentNode {
        match strip_delimiters(raw) {
            Some((inner, delimited_display)) => DocumentNode::equation(inner, delimited_display),
            None => {
                let body = raw.trim_end_matches(is_trailing_punct).trim_end();
                DocumentNode::equation(to_latex(body), display)
            }
        }
    }

    /// Whether a math line is visibly set off from the text.
    fn is_display_line(&self, line: &Line, text: &str, page_width: f32) -> bool {
        let trimmed = text.trim();
        if trimmed.starts_with("$$") && trimmed.ends_with("$$") && trimmed.len() > 4 {
            return true;
        }
        if page_width <= 0.0 {
            return false;
        }
        let bbox = line.bbox();
        let offset = (bbox.center_x() - page_width / 2.0).abs();
        offset <= self.config.centered_tolerance * page_width
            && bbox.width() <= page_width * DISPLAY_MAX_WIDTH_RATIO
    }
}

impl Default for EquationEngine {
    fn default() -> Self {
        Self::new(EquationConfig::default())
    }
}

/// Convert Unicode math notation to LaTeX.
///
/// ```
/// use pagemd::structure::to_latex;
///
/// assert_eq!(to_latex("E = mc²"), "E = mc^{2}");
/// assert_eq!(to_latex("√x + α₁"), "\\sqrt{x} + \\alpha_{1}");
/// ```
pub fn to_latex(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let (latex, _) = convert_chars(&chars, 0, None);
    latex
}

/// Convert `chars[start..]` until `close` (exclusive) or the end.
/// Returns the LaTeX and the index after the consumed input.
fn convert_chars(chars: &[char], start: usize, close: Option<char>) -> (String, usize) {
    let mut out = String::new();
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        if Some(c) == close {
            return (out, i);
        }

        if let Some(s) = superscript_ascii(c) {
            let mut run = String::from(s);
            i += 1;
            while let Some(s) = chars.get(i).and_then(|c| superscript_ascii(*c)) {
                run.push(s);
                i += 1;
            }
            out.push_str(&format!("^{{{}}}", run));
            continue;
        }

        if let Some(s) = subscript_ascii(c) {
            let mut run = String::from(s);
            i += 1;
            while let Some(s) = chars.get(i).and_then(|c| subscript_ascii(*c)) {
                run.push(s);
                i += 1;
            }
            out.push_str(&format!("_{{{}}}", run));
            continue;
        }

        if let Some(root) = radical_command(c) {
            i += 1;
            out.push_str(root);
            out.push('{');
            match chars.get(i) {
                Some('(') => {
                    let (inner, end) = convert_chars(chars, i + 1, Some(')'));
                    out.push_str(&inner);
                    i = (end + 1).min(chars.len());
                }
                _ => {
                    while let Some(c) = chars.get(i) {
                        if (c.is_alphanumeric() && !is_math_char(*c)) || *c == '.' {
                            out.push(*c);
                            i += 1;
                        } else {
                            break;
                        }
                    }
                }
            }
            out.push('}');
            continue;
        }

        if c == '(' && close.is_some() {
            // Nested group inside a radical argument keeps its parentheses.
            let (inner, end) = convert_chars(chars, i + 1, Some(')'));
            out.push('(');
            out.push_str(&inner);
            if end < chars.len() {
                out.push(')');
            }
            i = (end + 1).min(chars.len());
            continue;
        }

        match latex_symbol(c) {
            Some(cmd) => {
                out.push_str(cmd);
                let needs_space = cmd.starts_with('\\')
                    && cmd.ends_with(|e: char| e.is_ascii_alphabetic())
                    && chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic());
                if needs_space {
                    out.push(' ');
                }
            }
            None => out.push(c),
        }
        i += 1;
    }

    (out, i)
}

/// Whether a math fragment ends inside an open bracket or after a binary operator.
pub fn needs_continuation(raw: &str) -> bool {
    let mut depth: i32 = 0;
    for c in raw.chars() {
        match c {
            '(' | '[' | '{' | '⟨' => depth += 1,
            ')' | ']' | '}' | '⟩' => depth -= 1,
            _ => {}
        }
    }
    if depth > 0 {
        return true;
    }
    matches!(
        raw.trim_end().chars().last(),
        Some('=' | '+' | '-' | '−' | '×' | '·' | '÷' | '±' | '≤' | '≥' | '≈' | '→' | '⇒' | '/' | '√')
    )
}

/// Whether a character belongs to the Unicode math/symbol ranges.
pub fn is_math_char(c: char) -> bool {
    matches!(c,
        '\u{0370}'..='\u{03FF}'       // Greek
        | '\u{2200}'..='\u{22FF}'     // Mathematical Operators
        | '\u{2A00}'..='\u{2AFF}'     // Supplemental Mathematical Operators
        | '\u{27C0}'..='\u{27EF}'     // Misc Mathematical Symbols-A
        | '\u{2980}'..='\u{29FF}'     // Misc Mathematical Symbols-B
        | '\u{2190}'..='\u{21FF}'     // Arrows
        | '\u{27F0}'..='\u{27FF}'     // Supplemental Arrows-A
        | '\u{2900}'..='\u{297F}'     // Supplemental Arrows-B
        | '\u{2070}'..='\u{207F}'     // Superscripts
        | '\u{2080}'..='\u{209F}'     // Subscripts
        | '\u{1D400}'..='\u{1D7FF}'   // Mathematical Alphanumeric Symbols
        | '\u{00B2}' | '\u{00B3}' | '\u{00B9}'
        | 'ᵢ' | 'ⱼ' | 'ᵣ' | 'ᵤ' | 'ᵥ'
        | '±' | '×' | '÷' | '′' | '″'
        | 'ℝ' | 'ℕ' | 'ℤ' | 'ℚ' | 'ℂ'
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    /// Math symbol acting as an operator or relation (`≤`, `∑`, `→`)
    MathOperator,
    /// Other token carrying math characters (`x²`, `α`)
    Math,
    /// ASCII operator (`=`, `+`, `<=`)
    Operator,
    /// Short token that can sit next to an operator (`x`, `2`, `mc`)
    Operand,
    Word,
}

impl TokenKind {
    fn is_math(self) -> bool {
        matches!(self, TokenKind::Math | TokenKind::MathOperator)
    }

    fn is_operator(self) -> bool {
        matches!(self, TokenKind::Operator | TokenKind::MathOperator)
    }
}

fn classify_token(token: &str) -> TokenKind {
    let core = token.trim_end_matches(is_trailing_punct);
    let core = if core.is_empty() { token } else { core };

    if matches!(core, "=" | "+" | "-" | "<" | ">" | "/" | "*" | "^" | "==" | "<=" | ">=") {
        return TokenKind::Operator;
    }

    let mut chars = core.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if is_operator_symbol(c) {
            return TokenKind::MathOperator;
        }
    }

    let greek = core.chars().filter(|c| is_greek(*c)).count();
    let other_math = core.chars().filter(|c| is_math_char(*c) && !is_greek(*c)).count();
    if other_math > 0 || (greek > 0 && core.chars().count() <= MAX_GREEK_SYMBOL_LEN) {
        return TokenKind::Math;
    }

    let short = core.chars().count() <= MAX_OPERAND_LEN
        && core
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "()[]{}.,'".contains(c));
    if short || core.parse::<f64>().is_ok() {
        TokenKind::Operand
    } else {
        TokenKind::Word
    }
}

fn is_operator_symbol(c: char) -> bool {
    matches!(c,
        '\u{2190}'..='\u{22FF}'
        | '\u{27C0}'..='\u{27FF}'
        | '\u{2900}'..='\u{2AFF}'
        | '±' | '×' | '÷'
    )
}

fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

fn is_greek(c: char) -> bool {
    ('\u{0370}'..='\u{03FF}').contains(&c)
}

fn is_trailing_punct(c: char) -> bool {
    matches!(c, '.' | ',' | ';' | ':' | '!' | '?')
}

/// Byte ranges of whitespace-separated tokens.
fn tokenize(text: &str) -> Vec<Range<usize>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(s..i);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(s..text.len());
    }
    tokens
}

/// Shrink a region to drop sentence punctuation and unmatched brackets at its edges.
fn trim_region(text: &str, mut start: usize, mut end: usize) -> Option<Range<usize>> {
    loop {
        let slice = &text[start..end];
        let Some(last) = slice.chars().last() else {
            return None;
        };
        let opens = slice.matches(['(', '[', '{']).count();
        let closes = slice.matches([')', ']', '}']).count();
        if is_trailing_punct(last) || (matches!(last, ')' | ']' | '}') && closes > opens) {
            end -= last.len_utf8();
            continue;
        }
        let first = slice.chars().next()?;
        if matches!(first, '(' | '[' | '{') && opens > closes {
            start += first.len_utf8();
            continue;
        }
        break;
    }
    if start < end {
        Some(start..end)
    } else {
        None
    }
}

/// `$$x$$` → ("x", true), `$x$` → ("x", false).
fn strip_delimiters(text: &str) -> Option<(&str, bool)> {
    if let Some(inner) = text.strip_prefix("$$").and_then(|t| t.strip_suffix("$$")) {
        if !inner.contains('$') {
            return Some((inner.trim(), true));
        }
    }
    if let Some(inner) = text.strip_prefix('$').and_then(|t| t.strip_suffix('$')) {
        if !inner.contains('$') && !inner.starts_with(char::is_whitespace) {
            return Some((inner.trim(), false));
        }
    }
    None
}

fn delimited_math() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\$([^$]+?)\$\$|\$([^$\s](?:[^$]*[^$\s])?)\$")
            .expect("math delimiter pattern is valid")
    })
}

fn push_text(out: &mut Vec<Inline>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Inline::Text { text: prev }) = out.last_mut() {
        prev.push_str(text);
    } else {
        out.push(Inline::text(text));
    }
}

fn is_prose(block: &Block) -> bool {
    matches!(
        block.kind,
        BlockKind::Paragraph
            | BlockKind::Orphan
            | BlockKind::EquationCandidate
            | BlockKind::TableCandidate
            | BlockKind::Unknown
    )
}

fn superscript_ascii(c: char) -> Option<char> {
    Some(match c {
        '⁰' => '0',
        '¹' => '1',
        '²' => '2',
        '³' => '3',
        '⁴' => '4',
        '⁵' => '5',
        '⁶' => '6',
        '⁷' => '7',
        '⁸' => '8',
        '⁹' => '9',
        '⁺' => '+',
        '⁻' => '-',
        '⁼' => '=',
        '⁽' => '(',
        '⁾' => ')',
        'ⁿ' => 'n',
        'ⁱ' => 'i',
        _ => return None,
    })
}

fn subscript_ascii(c: char) -> Option<char> {
    Some(match c {
        '₀' => '0',
        '₁' => '1',
        '₂' => '2',
        '₃' => '3',
        '₄' => '4',
        '₅' => '5',
        '₆' => '6',
        '₇' => '7',
        '₈' => '8',
        '₉' => '9',
        '₊' => '+',
        '₋' => '-',
        '₌' => '=',
        '₍' => '(',
        '₎' => ')',
        'ₐ' => 'a',
        'ₑ' => 'e',
        'ₒ' => 'o',
        'ₓ' => 'x',
        'ₕ' => 'h',
        'ₖ' => 'k',
        'ₗ' => 'l',
        'ₘ' => 'm',
        'ₙ' => 'n',
        'ₚ' => 'p',
        'ₛ' => 's',
        'ₜ' => 't',
        'ᵢ' => 'i',
        'ⱼ' => 'j',
        'ᵣ' => 'r',
        'ᵤ' => 'u',
        'ᵥ' => 'v',
        _ => return None,
    })
}

fn radical_command(c: char) -> Option<&'static str> {
    match c {
        '√' => Some("\\sqrt"),
        '∛' => Some("\\sqrt[3]"),
        '∜' => Some("\\sqrt[4]"),
        _ => None,
    }
}

fn latex_symbol(c: char) -> Option<&'static str> {
    Some(match c {
        // Greek lowercase
        'α' => "\\alpha",
        'β' => "\\beta",
        'γ' => "\\gamma",
        'δ' => "\\delta",
        'ε' | 'ϵ' => "\\epsilon",
        'ζ' => "\\zeta",
        'η' => "\\eta",
        'θ' => "\\theta",
        'ϑ' => "\\vartheta",
        'ι' => "\\iota",
        'κ' => "\\kappa",
        'λ' => "\\lambda",
        'μ' => "\\mu",
        'ν' => "\\nu",
        'ξ' => "\\xi",
        'ο' => "o",
        'π' => "\\pi",
        'ϖ' => "\\varpi",
        'ρ' => "\\rho",
        'ϱ' => "\\varrho",
        'σ' => "\\sigma",
        'ς' => "\\varsigma",
        'τ' => "\\tau",
        'υ' => "\\upsilon",
        'φ' | 'ϕ' => "\\phi",
        'χ' => "\\chi",
        'ψ' => "\\psi",
        'ω' => "\\omega",
        // Greek uppercase
        'Γ' => "\\Gamma",
        'Δ' => "\\Delta",
        'Θ' => "\\Theta",
        'Λ' => "\\Lambda",
        'Ξ' => "\\Xi",
        'Π' => "\\Pi",
        'Σ' => "\\Sigma",
        'Υ' => "\\Upsilon",
        'Φ' => "\\Phi",
        'Ψ' => "\\Psi",
        'Ω' => "\\Omega",
        'Α' => "A",
        'Β' => "B",
        'Ε' => "E",
        'Ζ' => "Z",
        'Η' => "H",
        'Ι' => "I",
        'Κ' => "K",
        'Μ' => "M",
        'Ν' => "N",
        'Ο' => "O",
        'Ρ' => "P",
        'Τ' => "T",
        'Χ' => "X",
        // Operators and relations
        '±' => "\\pm",
        '∓' => "\\mp",
        '×' => "\\times",
        '÷' => "\\div",
        '·' | '⋅' => "\\cdot",
        '∗' => "*",
        '−' => "-",
        '∘' => "\\circ",
        '∞' => "\\infty",
        '∑' => "\\sum",
        '∏' => "\\prod",
        '∫' => "\\int",
        '∬' => "\\iint",
        '∮' => "\\oint",
        '∂' => "\\partial",
        '∇' => "\\nabla",
        '≤' => "\\leq",
        '≥' => "\\geq",
        '≠' => "\\neq",
        '≈' => "\\approx",
        '≡' => "\\equiv",
        '∼' => "\\sim",
        '≃' => "\\simeq",
        '≅' => "\\cong",
        '∝' => "\\propto",
        '≪' => "\\ll",
        '≫' => "\\gg",
        '∈' => "\\in",
        '∉' => "\\notin",
        '∋' => "\\ni",
        '⊂' => "\\subset",
        '⊃' => "\\supset",
        '⊆' => "\\subseteq",
        '⊇' => "\\supseteq",
        '∪' => "\\cup",
        '∩' => "\\cap",
        '∅' => "\\emptyset",
        '∀' => "\\forall",
        '∃' => "\\exists",
        '¬' => "\\neg",
        '∧' => "\\land",
        '∨' => "\\lor",
        '⊕' => "\\oplus",
        '⊗' => "\\otimes",
        '∠' => "\\angle",
        '⊥' => "\\perp",
        '∥' => "\\parallel",
        '∴' => "\\therefore",
        '∵' => "\\because",
        '⋯' => "\\cdots",
        '′' => "'",
        '″' => "''",
        // Arrows
        '→' => "\\rightarrow",
        '←' => "\\leftarrow",
        '↔' => "\\leftrightarrow",
        '⇒' => "\\Rightarrow",
        '⇐' => "\\Leftarrow",
        '⇔' => "\\Leftrightarrow",
        '↦' => "\\mapsto",
        // Delimiters
        '⟨' => "\\langle",
        '⟩' => "\\rangle",
        '⌊' => "\\lfloor",
        '⌋' => "\\rfloor",
        '⌈' => "\\lceil",
        '⌉' => "\\rceil",
        // Number sets
        'ℝ' => "\\mathbb{R}",
        'ℕ' => "\\mathbb{N}",
        'ℤ' => "\\mathbb{Z}",
        'ℚ' => "\\mathbb{Q}",
        'ℂ' => "\\mathbb{C}",
        _ => return None,
    })
}
