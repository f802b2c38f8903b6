//! PDF text extraction
//!
//! Walks each page's content stream with lopdf and collects the operands of
//! the text-showing operators (`Tj`, `TJ`, `'`, `"`). Line-positioning
//! operators become newlines so paragraphs survive extraction.

use crate::errors::{AppError, Result};
use lopdf::content::Content;
use lopdf::{Document, Object};
use std::path::Path;
use tracing::{debug, warn};

/// Extract the text of every page, pages joined with `\n`
pub fn extract_pdf_text(path: &Path) -> Result<String> {
    let doc = Document::load(path).map_err(|e| AppError::Extraction {
        message: format!("Failed to load PDF {}: {}", path.display(), e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for (page_num, page_id) in pages {
        match doc
            .get_page_content(page_id)
            .and_then(|content| Content::decode(&content))
        {
            Ok(content) => {
                text.push_str(&content_text(&content));
                text.push('\n');
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to read page content, skipping");
            }
        }
    }

    Ok(text)
}

/// Text shown by the operators of one content stream
fn content_text(content: &Content) -> String {
    let mut text = String::new();

    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tj" => push_operands(&mut text, &operation.operands),
            "TJ" => {
                for operand in &operation.operands {
                    if let Object::Array(items) = operand {
                        push_operands(&mut text, items);
                    }
                }
            }
            "'" | "\"" => {
                text.push('\n');
                push_operands(&mut text, &operation.operands);
            }
            "Td" | "TD" | "T*" => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            "ET" => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push(' ');
                }
            }
            _ => {}
        }
    }

    text
}

fn push_operands(text: &mut String, operands: &[Object]) {
    for operand in operands {
        if let Object::String(bytes, _) = operand {
            text.push_str(&decode_pdf_string(bytes));
        }
    }
}

/// Decode a PDF string: UTF-16BE when it carries a BOM, Latin-1 otherwise
fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    fn write_pdf(path: &Path, lines: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
        ];
        for line in lines {
            operations.push(Operation::new("Td", vec![0.into(), (-14).into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_extract_lines_from_generated_pdf() {
        let path = std::env::temp_dir().join(format!("docchat-{}.pdf", uuid::Uuid::new_v4()));
        write_pdf(&path, &["Valve inspection schedule", "Quarterly by safety team"]);

        let text = extract_pdf_text(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(text.contains("Valve inspection schedule\nQuarterly by safety team"));
    }

    #[test]
    fn test_load_failure_is_extraction_error() {
        let path = std::env::temp_dir().join(format!("docchat-{}.pdf", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"not a pdf").unwrap();

        let result = extract_pdf_text(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(AppError::Extraction { .. })));
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string(b"caf\xe9"), "café");
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
    }
}
