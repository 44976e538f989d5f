//! DOCX writer with RTL paragraph support (spec section 4.8, supplemented
//! feature 11.1). Grounded in the original `create_docx.py`: a metadata
//! section, body paragraphs grouped a few sentences at a time, and a
//! table of chunk timings, rendered right-to-left whenever the
//! configured language is in `config::RTL_LANGUAGES`.

use std::path::Path;

use docx_rs::{AlignmentType, Docx, Paragraph, Run, Table, TableCell, TableRow};

use crate::config::RTL_LANGUAGES;
use crate::error::{AutosubError, Result};
use crate::model::{MergedTimeline, RunManifest};

/// Number of sentences grouped into one DOCX paragraph, matching
/// `create_docx.py`'s "every 4-5 sentences" chunking of `full_text`.
const SENTENCES_PER_PARAGRAPH: usize = 4;

fn is_rtl(language: &str) -> bool {
    RTL_LANGUAGES.contains(&language)
}

fn split_into_paragraphs(full_text: &str) -> Vec<String> {
    let sentences: Vec<&str> = full_text.split(". ").collect();
    let mut paragraphs = Vec::new();
    let mut current: Vec<String> = Vec::new();

    let n = sentences.len();
    for (i, sentence) in sentences.iter().enumerate() {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let mut s = sentence.to_string();
        if i < n - 1 && !s.ends_with('.') {
            s.push('.');
        }
        current.push(s);
        if current.len() >= SENTENCES_PER_PARAGRAPH {
            paragraphs.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs
}

pub fn write(
    path: &Path,
    manifest: &RunManifest,
    timeline: &MergedTimeline,
    language: &str,
) -> Result<()> {
    let rtl = is_rtl(language);
    let alignment = if rtl { AlignmentType::Right } else { AlignmentType::Left };

    let mut doc = Docx::new();

    doc = doc.add_paragraph(
        Paragraph::new()
            .add_run(Run::new().add_text("Audio Transcription").bold().size(32))
            .align(AlignmentType::Center),
    );

    doc = doc.add_paragraph(
        Paragraph::new().add_run(Run::new().add_text(format!("Run: {}", manifest.run_id))),
    );
    doc = doc.add_paragraph(Paragraph::new().add_run(Run::new().add_text(format!(
        "Duration: {:.1} minutes",
        manifest.source.duration_sec / 60.0
    ))));
    doc = doc.add_paragraph(Paragraph::new().add_run(Run::new().add_text(format!(
        "Words: {}  Characters: {}",
        timeline.totals.words, timeline.totals.chars
    ))));
    doc = doc.add_paragraph(Paragraph::new().add_run(Run::new().add_text(format!(
        "Chunks: {}",
        manifest.plan_chunk_count
    ))));

    let paragraphs = split_into_paragraphs(&timeline.full_text);
    if paragraphs.is_empty() {
        doc = doc.add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text("(no transcription content)"))
                .align(alignment),
        );
    } else {
        for text in paragraphs {
            doc = doc.add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text(text).size(24))
                    .align(alignment),
            );
        }
    }

    if let Some(blocks) = &timeline.speaker_blocks {
        let mut rows = vec![TableRow::new(vec![
            TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("Speaker"))),
            TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("Start"))),
            TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("End"))),
        ])];
        for block in blocks.iter().take(50) {
            rows.push(TableRow::new(vec![
                TableCell::new()
                    .add_paragraph(Paragraph::new().add_run(Run::new().add_text(block.speaker.clone()))),
                TableCell::new().add_paragraph(
                    Paragraph::new().add_run(Run::new().add_text(format!("{:.1}s", block.start_sec))),
                ),
                TableCell::new().add_paragraph(
                    Paragraph::new().add_run(Run::new().add_text(format!("{:.1}s", block.end_sec))),
                ),
            ]));
        }
        doc = doc.add_table(Table::new(rows));
    }

    let bytes: Vec<u8> = Vec::new();
    let mut cursor = std::io::Cursor::new(bytes);
    doc.build()
        .pack(&mut cursor)
        .map_err(|e| AutosubError::Store(format!("docx build failed: {e}")))?;

    super::atomic_write(path, cursor.get_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtl_languages_match_spec_set() {
        assert!(is_rtl("he"));
        assert!(is_rtl("ar"));
        assert!(!is_rtl("en"));
    }

    #[test]
    fn splits_into_groups_of_four_sentences() {
        let text = "a. b. c. d. e. f";
        let paragraphs = split_into_paragraphs(text);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0], "a. b. c. d.");
        assert_eq!(paragraphs[1], "e. f");
    }

    #[test]
    fn empty_text_produces_no_paragraphs() {
        assert!(split_into_paragraphs("").is_empty());
    }
}
