use crate::models::document::ContentType;
use anyhow::{bail, Context, Result};

#[derive(Debug)]
pub struct ParsedDocument {
    pub content: String,
    pub page_count: Option<usize>,
}

/// Parses raw bytes of PDF/DOCX/HTML/TXT into plain text. Content-type is
/// inferred from the filename suffix with an explicit override allowed.
pub struct DocumentParser;

impl DocumentParser {
    pub fn parse(bytes: &[u8], content_type: ContentType) -> Result<ParsedDocument> {
        validate_bytes(bytes, content_type)?;
        match content_type {
            ContentType::Pdf => Self::parse_pdf(bytes),
            ContentType::Docx => Self::parse_docx(bytes),
            ContentType::Html => Self::parse_html(bytes),
            ContentType::Txt => Self::parse_text(bytes),
        }
    }

    fn parse_pdf(bytes: &[u8]) -> Result<ParsedDocument> {
        let doc = lopdf::Document::load_mem(bytes).context("corrupt PDF")?;
        let page_count = doc.get_pages().len();

        let mut content = String::new();
        for page_num in 1..=page_count {
            if let Ok(text) = doc.extract_text(&[page_num as u32]) {
                content.push_str(&text);
                content.push('\n');
            }
        }

        Ok(ParsedDocument {
            content,
            page_count: Some(page_count),
        })
    }

    fn parse_docx(bytes: &[u8]) -> Result<ParsedDocument> {
        use docx_rs::*;

        let docx = read_docx(bytes).context("corrupt DOCX")?;
        let mut content = String::new();

        for child in docx.document.children {
            if let DocumentChild::Paragraph(para) = child {
                for child in para.children {
                    if let ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let RunChild::Text(text) = child {
                                content.push_str(&text.text);
                            }
                        }
                    }
                }
                content.push('\n');
            }
        }

        Ok(ParsedDocument {
            content,
            page_count: None,
        })
    }

    fn parse_html(bytes: &[u8]) -> Result<ParsedDocument> {
        let (text, _, had_errors) = encoding_rs::UTF_8.decode(bytes);
        if had_errors {
            bail!("unsupported encoding in HTML document");
        }
        let document = scraper::Html::parse_document(&text);
        let body_selector = scraper::Selector::parse("body").ok();
        let mut content = String::new();

        let root = match &body_selector {
            Some(sel) => document.select(sel).next(),
            None => None,
        };

        match root {
            Some(body) => {
                for node in body.text() {
                    content.push_str(node);
                    content.push(' ');
                }
            }
            None => {
                for node in document.root_element().text() {
                    content.push_str(node);
                    content.push(' ');
                }
            }
        }

        Ok(ParsedDocument {
            content,
            page_count: None,
        })
    }

    fn parse_text(bytes: &[u8]) -> Result<ParsedDocument> {
        let (text, _, had_errors) = encoding_rs::UTF_8.decode(bytes);
        if had_errors {
            bail!("unsupported text encoding");
        }
        Ok(ParsedDocument {
            content: text.into_owned(),
            page_count: None,
        })
    }
}

/// Rejects bytes whose sniffed magic number contradicts the declared
/// content-type, and unconditionally rejects executables, regardless of
/// what extension a caller attached to the upload.
fn validate_bytes(bytes: &[u8], declared: ContentType) -> Result<()> {
    const BLOCKED_MIME: &[&str] = &[
        "application/x-executable",
        "application/x-mach-binary",
        "application/x-msdownload",
        "application/x-sharedlib",
    ];

    let Some(kind) = infer::get(bytes) else {
        // No strong signature (plain text and many HTML fragments fall
        // here) — trust the declared type, there is nothing to sniff.
        return Ok(());
    };

    if BLOCKED_MIME.contains(&kind.mime_type()) {
        bail!("executable content is not an accepted document type");
    }

    let sniffed_matches_declared = match declared {
        ContentType::Pdf => kind.extension() == "pdf",
        ContentType::Docx => matches!(kind.extension(), "docx" | "zip"),
        // infer has no reliable positive signature for HTML/plain text;
        // absence of a contradicting binary signature is enough.
        ContentType::Html | ContentType::Txt => true,
    };

    if !sniffed_matches_declared {
        bail!(
            "declared content-type {:?} does not match sniffed type {}",
            declared,
            kind.mime_type()
        );
    }

    Ok(())
}

/// Trims, Unicode-normalizes (NFC-adjacent via char-by-char recomposition is
/// out of scope for this stack; whitespace collapsing is the practical
/// normalization the chunker contract asks for) and collapses whitespace
/// runs, per §4.1's "text is trimmed... whitespace runs collapsed."
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = false;
    for c in raw.trim().chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  hello   world\n\tfoo  "), "hello world foo");
    }

    #[test]
    fn parse_text_roundtrips() {
        let doc = DocumentParser::parse(b"hello world", ContentType::Txt).unwrap();
        assert_eq!(doc.content, "hello world");
    }

    #[test]
    fn parse_html_extracts_body_text() {
        let html = b"<html><head><title>t</title></head><body><p>Hello</p><p>World</p></body></html>";
        let doc = DocumentParser::parse(html, ContentType::Html).unwrap();
        assert!(doc.content.contains("Hello"));
        assert!(doc.content.contains("World"));
    }

    #[test]
    fn rejects_elf_binary_disguised_as_text() {
        let elf_magic = [0x7f, b'E', b'L', b'F', 0, 0, 0, 0];
        let result = DocumentParser::parse(&elf_magic, ContentType::Txt);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_pdf_content_type_mismatch() {
        let png_magic = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        let result = DocumentParser::parse(&png_magic, ContentType::Pdf);
        assert!(result.is_err());
    }
}
