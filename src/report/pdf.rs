//! Print conversion from the HTML report to a paginated PDF.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};

use crate::error::RenderError;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
/// Characters per line at body size within the margins.
const WRAP_COLUMNS: usize = 90;
const PT_TO_MM: f32 = 0.3528;

/// Visual weight of one printed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Title,
    Heading,
    Body,
}

impl LineStyle {
    fn font_size(self) -> f32 {
        match self {
            LineStyle::Title => 18.0,
            LineStyle::Heading => 13.0,
            LineStyle::Body => 10.0,
        }
    }

    fn leading_mm(self) -> f32 {
        self.font_size() * 1.5 * PT_TO_MM
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintLine {
    pub style: LineStyle,
    pub text: String,
}

/// Convert report markup to PDF bytes.
///
/// Any failure returns [`RenderError::PrintConversion`] with the markup
/// attached.
pub fn convert(markup: &str, title: &str) -> Result<Vec<u8>, RenderError> {
    let fail = |reason: String| RenderError::PrintConversion {
        reason,
        markup: markup.to_string(),
    };

    let lines = markup_to_lines(markup);
    if lines.is_empty() {
        return Err(fail("markup contains no printable text".to_string()));
    }

    let (doc, page, layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let regular = load_font(&doc, BuiltinFont::Helvetica).map_err(fail)?;
    let bold = load_font(&doc, BuiltinFont::HelveticaBold).map_err(fail)?;

    let mut current = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;

    for line in &lines {
        let leading = line.style.leading_mm();
        if line.style != LineStyle::Body {
            y -= leading * 0.5;
        }
        if y - leading < MARGIN_MM {
            let (next_page, next_layer) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            current = doc.get_page(next_page).get_layer(next_layer);
            y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
        y -= leading;

        let font = match line.style {
            LineStyle::Body => &regular,
            LineStyle::Title | LineStyle::Heading => &bold,
        };
        current.use_text(
            printable(&line.text),
            line.style.font_size(),
            Mm(MARGIN_MM),
            Mm(y),
            font,
        );
    }

    doc.save_to_bytes()
        .map_err(|e| fail(format!("failed to write PDF: {}", e)))
}

fn load_font(doc: &PdfDocumentReference, font: BuiltinFont) -> Result<IndirectFontRef, String> {
    doc.add_builtin_font(font)
        .map_err(|e| format!("failed to load builtin font: {}", e))
}

/// Builtin PDF fonts cover Latin-1 only.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) < 0x100 { c } else { '?' })
        .collect()
}

/// Flatten HTML into styled, wrapped lines of text.
///
/// Only the structure the HTML renderer emits is understood: headings,
/// paragraphs, list items, and table rows. Everything inside `<head>` is
/// skipped.
pub fn markup_to_lines(markup: &str) -> Vec<PrintLine> {
    let mut lines = Vec::new();
    let mut text = String::new();
    let mut cells: Vec<String> = Vec::new();
    let mut style = LineStyle::Body;
    let mut in_head = false;
    let mut rest = markup;

    while let Some(open) = rest.find('<') {
        if !in_head {
            text.push_str(&rest[..open]);
        }
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        let tag = rest[open + 1..open + close].trim().to_lowercase();
        rest = &rest[open + close + 1..];

        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace())
            .next()
            .unwrap_or("");
        let closing = tag.starts_with('/');

        match (name, closing) {
            ("head", false) => in_head = true,
            ("head", true) => in_head = false,
            ("h1", false) => style = LineStyle::Title,
            ("h2", false) => style = LineStyle::Heading,
            ("li", false) => text.push_str("- "),
            ("td" | "th", true) => cells.push(collapse(&text)),
            ("td" | "th", false) => text.clear(),
            ("tr", true) => {
                push_wrapped(&mut lines, LineStyle::Body, &cells.join("  |  "));
                cells.clear();
                text.clear();
            }
            ("h1" | "h2" | "p" | "li" | "footer", true) => {
                push_wrapped(&mut lines, style, &collapse(&text));
                text.clear();
                style = LineStyle::Body;
            }
            _ => {}
        }
    }

    lines
}

fn collapse(text: &str) -> String {
    unescape(&text.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn push_wrapped(lines: &mut Vec<PrintLine>, style: LineStyle, text: &str) {
    if text.is_empty() {
        return;
    }

    let mut current = String::new();
    for word in text.split(' ') {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > WRAP_COLUMNS
        {
            lines.push(PrintLine {
                style,
                text: std::mem::take(&mut current),
            });
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(PrintLine {
            style,
            text: current,
        });
    }
}
