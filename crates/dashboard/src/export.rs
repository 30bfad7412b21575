//! PDF export of the loaded messages
//!
//! Renders one table (Time, Sender, Message, Platform, Group, Type) on
//! landscape A4 pages using the built-in Helvetica fonts.

use anyhow::{Context, Result, anyhow};
use chrono::{Local, TimeZone};
use log::info;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use std::path::Path;

use crate::models::Message;

const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 10.0;
const ROW_HEIGHT: f32 = 6.0;
const TITLE_SIZE: f32 = 14.0;
const HEADER_SIZE: f32 = 9.0;
const BODY_SIZE: f32 = 8.0;

/// Column titles, x offsets from the left margin (mm) and max characters
const COLUMNS: [(&str, f32, usize); 6] = [
    ("Time", 0.0, 22),
    ("Sender", 36.0, 24),
    ("Message", 76.0, 80),
    ("Platform", 196.0, 12),
    ("Group", 218.0, 24),
    ("Type", 258.0, 8),
];

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Table cells for one message, with times shown in `tz`
pub fn export_row<Tz: TimeZone>(message: &Message, tz: &Tz) -> [String; 6]
where
    Tz::Offset: std::fmt::Display,
{
    let text = message
        .content
        .as_deref()
        .or(message.caption.as_deref())
        .unwrap_or("");

    [
        message
            .timestamp
            .with_timezone(tz)
            .format(TIME_FORMAT)
            .to_string(),
        message.sender.clone(),
        text.to_string(),
        message.platform.label().to_string(),
        message.whatsapp_group.clone().unwrap_or_default(),
        message.message_type.as_str().to_string(),
    ]
}

/// Make text printable with a built-in font and fit it into `max_chars`
pub fn fit_cell(text: &str, max_chars: usize) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            c if (c as u32) > 0xFF || c.is_control() => '?',
            c => c,
        })
        .collect();

    if cleaned.chars().count() <= max_chars {
        return cleaned;
    }
    let mut cut: String = cleaned.chars().take(max_chars.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Render messages (in the given order) to PDF bytes, times in the local zone
pub fn render_pdf(messages: &[Message]) -> Result<Vec<u8>> {
    render_pdf_in(messages, &Local)
}

/// Render messages to PDF bytes with times shown in `tz`
pub fn render_pdf_in<Tz: TimeZone>(messages: &[Message], tz: &Tz) -> Result<Vec<u8>>
where
    Tz::Offset: std::fmt::Display,
{
    let (doc, page, layer) =
        PdfDocument::new("Chat Messages", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");

    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("Failed to load PDF font: {:?}", e))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow!("Failed to load PDF font: {:?}", e))?,
    };

    let mut current = doc.get_page(page).get_layer(layer);
    current.use_text(
        format!("Chat Messages ({})", messages.len()),
        TITLE_SIZE,
        Mm(MARGIN),
        Mm(PAGE_HEIGHT - MARGIN - 4.0),
        &fonts.bold,
    );
    let mut y = PAGE_HEIGHT - MARGIN - 14.0;
    draw_header(&current, &fonts, y);
    y -= ROW_HEIGHT;

    for message in messages {
        if y < MARGIN {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            current = doc.get_page(page).get_layer(layer);
            y = PAGE_HEIGHT - MARGIN - 4.0;
            draw_header(&current, &fonts, y);
            y -= ROW_HEIGHT;
        }

        let row = export_row(message, tz);
        for ((_, x, max_chars), cell) in COLUMNS.iter().zip(row.iter()) {
            current.use_text(
                fit_cell(cell, *max_chars),
                BODY_SIZE,
                Mm(MARGIN + x),
                Mm(y),
                &fonts.regular,
            );
        }
        y -= ROW_HEIGHT;
    }

    doc.save_to_bytes()
        .map_err(|e| anyhow!("Failed to serialize PDF: {:?}", e))
}

fn draw_header(layer: &PdfLayerReference, fonts: &Fonts, y: f32) {
    for (title, x, _) in COLUMNS {
        layer.use_text(title, HEADER_SIZE, Mm(MARGIN + x), Mm(y), &fonts.bold);
    }
}

/// Write all `messages` to a PDF file at `path`. Returns the row count.
pub fn export_pdf(messages: &[Message], path: &Path) -> Result<usize> {
    let bytes = render_pdf(messages)?;
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write PDF: {}", path.display()))?;
    info!("Exported {} messages to {}", messages.len(), path.display());
    Ok(messages.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, Utc};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_export_row_columns() {
        let message = Message::builder("1", "alice")
            .content("Kudu spotted")
            .whatsapp_group("Kudu Hunters")
            .timestamp(at("2024-05-01T10:00:00Z"))
            .build();
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();

        let row = export_row(&message, &tz);
        assert_eq!(
            row,
            [
                "2024-05-01 12:00:00".to_string(),
                "alice".to_string(),
                "Kudu spotted".to_string(),
                "WhatsApp".to_string(),
                "Kudu Hunters".to_string(),
                "text".to_string(),
            ]
        );
    }

    #[test]
    fn test_export_row_uses_caption_for_images() {
        let message = Message::builder("2", "bob")
            .image("file-1", "photo")
            .caption("Sunset")
            .build();
        let row = export_row(&message, &Utc);
        assert_eq!(row[2], "Sunset");
        assert_eq!(row[4], "");
        assert_eq!(row[5], "image");
    }

    #[test]
    fn test_fit_cell() {
        assert_eq!(fit_cell("short", 10), "short");
        assert_eq!(fit_cell("line one\nline two", 40), "line one line two");
        assert_eq!(fit_cell("abcdefghijkl", 8), "abcde...");
        assert_eq!(fit_cell("Gr\u{fc}\u{df}e \u{1F98C}", 20), "Gr\u{fc}\u{df}e ?");
    }

    #[test]
    fn test_export_writes_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.pdf");
        let messages: Vec<Message> = (0..60)
            .map(|i| {
                Message::builder(format!("m{}", i), "carol")
                    .content(format!("message number {}", i))
                    .build()
            })
            .collect();

        assert_eq!(export_pdf(&messages, &path).unwrap(), 60);
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_export_empty() {
        let bytes = render_pdf(&[]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
