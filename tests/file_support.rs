//! Multi-format ingest tests: PDF and DOCX byte-level parsing through the
//! structure extractor, independent of any network-backed LLM call.

use contractiq::models::DocumentKind;
use contractiq::structure;

/// Minimal valid PDF containing the text "spec test phrase".
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 44 >> stream\nBT /F1 12 Tf 100 700 Td (spec test phrase) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o1).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o2).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o3).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o4).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o5).as_bytes());
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Minimal docx (ZIP) containing word/document.xml with <w:t>office test phrase</w:t>.
fn minimal_docx_with_phrase() -> Vec<u8> {
    minimal_docx_with_text("office test phrase")
}

fn minimal_docx_with_text(phrase: &str) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            phrase
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[tokio::test]
async fn pdf_structure_extraction_covers_the_only_page() {
    let document_id = "doc-pdf-1";
    let bytes = minimal_pdf_with_phrase();

    let result = structure::extract_structure(document_id, DocumentKind::Pdf, &bytes, None)
        .await
        .expect("pdf structure extraction should succeed");

    assert_eq!(result.page_count, 1);
    assert!(
        result.chunks.iter().any(|c| c.text.contains("spec test phrase")),
        "expected a chunk containing the page's text, got: {:?}",
        result.chunks.iter().map(|c| &c.text).collect::<Vec<_>>()
    );
    assert!(result.chunks.iter().all(|c| c.page_number == 1));
}

#[tokio::test]
async fn docx_structure_extraction_covers_the_only_page() {
    let document_id = "doc-docx-1";
    let bytes = minimal_docx_with_phrase();

    let result = structure::extract_structure(document_id, DocumentKind::Docx, &bytes, None)
        .await
        .expect("docx structure extraction should succeed");

    assert_eq!(result.page_count, 1);
    assert!(
        result.chunks.iter().any(|c| c.text.contains("office test phrase")),
        "expected a chunk containing the paragraph text, got: {:?}",
        result.chunks.iter().map(|c| &c.text).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn corrupt_pdf_bytes_fail_extraction_cleanly() {
    let result = structure::extract_structure("doc-bad", DocumentKind::Pdf, b"not a valid pdf", None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn docx_missing_document_xml_fails_extraction_cleanly() {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<xml/>").unwrap();
        zip.finish().unwrap();
    }

    let result = structure::extract_structure("doc-bad-docx", DocumentKind::Docx, &buf, None).await;
    assert!(result.is_err());
}

#[test]
fn document_kind_from_extension_matches_allowed_types() {
    assert_eq!(DocumentKind::from_extension("pdf"), Some(DocumentKind::Pdf));
    assert_eq!(DocumentKind::from_extension("PDF"), Some(DocumentKind::Pdf));
    assert_eq!(DocumentKind::from_extension("docx"), Some(DocumentKind::Docx));
    assert_eq!(DocumentKind::from_extension("txt"), None);
}
