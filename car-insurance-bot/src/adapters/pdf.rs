use async_trait::async_trait;
use intake_flow::{AdapterError, DocumentRenderer};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::path::{Path, PathBuf};
use tracing::info;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const FONT_SIZE: i64 = 10;
const LEADING: i64 = 14;
const LINE_WIDTH_CHARS: usize = 80;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

/// Lays plain text out on A4 pages in a monospace font
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfRenderer;

impl PdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentRenderer for PdfRenderer {
    async fn render(&self, text: &str, output_path: &Path) -> Result<PathBuf, AdapterError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let lines = wrap_lines(text, LINE_WIDTH_CHARS);
        let path = output_path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || write_pdf(&lines, &path))
            .await
            .map_err(|e| AdapterError::Render(format!("render task panicked: {e}")))??;

        info!(path = %output_path.display(), pages, "policy document rendered");
        Ok(output_path.to_path_buf())
    }
}

/// Hard-wraps every paragraph at `width` characters, preferring spaces
fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word;
            while word.chars().count() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let split = word
                    .char_indices()
                    .nth(width)
                    .map(|(i, _)| i)
                    .unwrap_or(word.len());
                lines.push(word[..split].to_string());
                word = &word[split..];
            }
            if word.is_empty() {
                continue;
            }
            let separator = usize::from(!current.is_empty());
            let needed = current.chars().count() + separator + word.chars().count();
            if needed > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines
}

/// WinAnsi covers Latin-1; anything outside it prints as '?'
fn encode_line(line: &str) -> Vec<u8> {
    line.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn page_content(lines: &[String]) -> Result<Vec<u8>, AdapterError> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), Object::Integer(FONT_SIZE)]),
        Operation::new("TL", vec![Object::Integer(LEADING)]),
        Operation::new(
            "Td",
            vec![
                Object::Integer(MARGIN),
                Object::Integer(PAGE_HEIGHT - MARGIN),
            ],
        ),
    ];
    for line in lines {
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(encode_line(line))],
        ));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));

    Content { operations }
        .encode()
        .map_err(|e| AdapterError::Render(e.to_string()))
}

fn write_pdf(lines: &[String], path: &Path) -> Result<usize, AdapterError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let empty = [String::new()];
    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![&empty[..]]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };

    let mut kids: Vec<Object> = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(chunk)?));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(chunks.len() as i64),
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(PAGE_WIDTH),
            Object::Integer(PAGE_HEIGHT),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    doc.save(path)
        .map_err(|e| AdapterError::Render(format!("failed to write {}: {e}", path.display())))?;
    Ok(chunks.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_respects_width_and_paragraphs() {
        let lines = wrap_lines("POLICY\n\nholder name is John Doe", 10);
        assert_eq!(lines, vec!["POLICY", "", "holder", "name is", "John Doe"]);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
    }

    #[test]
    fn long_words_are_split() {
        let lines = wrap_lines("VIN WDB1234567890ABCDE", 8);
        assert_eq!(lines, vec!["VIN", "WDB12345", "67890ABC", "DE"]);
    }

    #[test]
    fn non_latin_characters_are_replaced() {
        assert_eq!(encode_line("Café Ж"), vec![b'C', b'a', b'f', 0xE9, b' ', b'?']);
    }

    #[tokio::test]
    async fn renders_multipage_policy() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("Documents").join("InsurancePolicy_42.pdf");
        let text = (1..=120)
            .map(|i| format!("Clause {i}: coverage applies."))
            .collect::<Vec<_>>()
            .join("\n");

        let written = PdfRenderer::new().render(&text, &output).await?;

        assert_eq!(written, output);
        let bytes = std::fs::read(&output)?;
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load(&output)?;
        assert_eq!(doc.get_pages().len(), 120usize.div_ceil(LINES_PER_PAGE));
        Ok(())
    }

    #[tokio::test]
    async fn empty_text_still_produces_a_page() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("empty.pdf");

        PdfRenderer::new().render("", &output).await?;

        assert_eq!(Document::load(&output)?.get_pages().len(), 1);
        Ok(())
    }
}
