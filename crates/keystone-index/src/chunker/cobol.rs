//! COBOL chunking by DIVISION markers, with the PROCEDURE DIVISION re-split by SECTION.

use std::sync::LazyLock;

use regex::Regex;

use super::Chunk;
use crate::languages::Lang;

static DIVISION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]{0,7}(IDENTIFICATION|ENVIRONMENT|DATA|PROCEDURE)\s+DIVISION\.").unwrap()
});

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]{0,7}([\w-]+)[ \t]+SECTION\.").unwrap());

const FRAGMENT_TAG: &str = "fragment";

pub(super) fn chunk(file_path: &str, source: &str, lang: Lang) -> Vec<Chunk> {
    let markers: Vec<(usize, String)> = DIVISION_RE
        .captures_iter(source)
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            Some((start, name))
        })
        .collect();

    if markers.is_empty() {
        return vec![Chunk::new(file_path, lang, FRAGMENT_TAG, source)];
    }

    let mut chunks = Vec::new();
    let preamble = source[..markers[0].0].trim();
    if !preamble.is_empty() {
        chunks.push(Chunk::new(file_path, lang, "preamble", preamble));
    }

    let last = markers.len() - 1;
    for (i, (start, name)) in markers.iter().enumerate() {
        let end = markers.get(i + 1).map_or(source.len(), |(next, _)| *next);
        let text = source[*start..end].trim();
        if text.is_empty() {
            continue;
        }

        if i == last && name == "procedure" {
            split_sections(file_path, text, lang, &mut chunks);
        } else {
            chunks.push(Chunk::new(file_path, lang, format!("{name}_division"), text));
        }
    }

    chunks
}

/// Leading text before the first section becomes `procedure_code`, each
/// `NAME SECTION.` span a `procedure_section`. No sections: the division stays whole.
fn split_sections(file_path: &str, division: &str, lang: Lang, out: &mut Vec<Chunk>) {
    let sections: Vec<(usize, String)> = SECTION_RE
        .captures_iter(division)
        .filter_map(|caps| Some((caps.get(0)?.start(), caps.get(1)?.as_str().to_string())))
        .collect();

    if sections.is_empty() {
        out.push(Chunk::new(file_path, lang, "procedure_division", division));
        return;
    }

    let head = division[..sections[0].0].trim();
    if !head.is_empty() {
        out.push(Chunk::new(file_path, lang, "procedure_code", head));
    }

    for (i, (start, name)) in sections.iter().enumerate() {
        let end = sections.get(i + 1).map_or(division.len(), |(next, _)| *next);
        let text = division[*start..end].trim();
        if text.is_empty() {
            continue;
        }
        let mut chunk = Chunk::new(file_path, lang, "procedure_section", text);
        chunk.metadata.section = Some(name.to_ascii_uppercase());
        out.push(chunk);
    }
}
