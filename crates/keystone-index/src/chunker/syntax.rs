//! Syntax-aware chunking via tree-sitter: one chunk per outermost semantic unit.

use tree_sitter::{Node, Parser};

use super::{Chunk, ChunkerConfig, non_ws_len};
use crate::languages::Lang;

const GLOBAL_CODE_TAG: &str = "global_code";

struct Unit {
    start_byte: usize,
    end_byte: usize,
    start_line: usize,
    end_line: usize,
    tag: &'static str,
    name: Option<String>,
}

struct UnitCtx<'a> {
    source: &'a str,
    lang: Lang,
    config: &'a ChunkerConfig,
}

/// Returns an empty vec when the grammar is unavailable, parsing fails, or
/// no units are found. The caller turns that into the whole-file chunk.
pub(super) fn chunk(file_path: &str, source: &str, lang: Lang, config: &ChunkerConfig) -> Vec<Chunk> {
    let Some(grammar) = lang.grammar() else {
        tracing::debug!(file = %file_path, lang = %lang, "no grammar, indexing whole file");
        return Vec::new();
    };

    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar) {
        tracing::warn!(file = %file_path, "set_language failed: {e}");
        return Vec::new();
    }
    let Some(tree) = parser.parse(source, None) else {
        tracing::warn!(file = %file_path, "tree-sitter parse failed, indexing whole file");
        return Vec::new();
    };

    let ctx = UnitCtx {
        source,
        lang,
        config,
    };
    let mut units = Vec::new();
    collect_units(&ctx, &tree.root_node(), &mut units);
    if units.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::with_capacity(units.len() * 2);
    let mut last_end = 0;
    for unit in units {
        push_gap(file_path, source, lang, last_end, unit.start_byte, &mut chunks);

        let mut chunk = Chunk::new(
            file_path,
            lang,
            unit.tag,
            &source[unit.start_byte..unit.end_byte],
        )
        .with_lines(unit.start_line, unit.end_line);
        chunk.metadata.name = unit.name;
        chunks.push(chunk);
        last_end = unit.end_byte;
    }
    push_gap(file_path, source, lang, last_end, source.len(), &mut chunks);

    chunks
}

/// Depth-first walk collecting outermost units in source order. Non-units are
/// descended into; oversized units are descended into when they nest units.
fn collect_units(ctx: &UnitCtx<'_>, parent: &Node, out: &mut Vec<Unit>) {
    let child_count = u32::try_from(parent.named_child_count()).unwrap_or(u32::MAX);

    for i in 0..child_count {
        let Some(child) = parent.named_child(i) else {
            continue;
        };

        let Some(tag) = ctx.lang.unit_tag(&child) else {
            collect_units(ctx, &child, out);
            continue;
        };

        let size = non_ws_len(&ctx.source[child.byte_range()]);
        let definition = ctx.lang.wrapped_definition(&child).unwrap_or(child);
        if size > ctx.config.max_unit_size && has_nested_unit(ctx.lang, &definition) {
            tracing::trace!(kind = child.kind(), size, "splitting oversized unit");
            collect_units(ctx, &child, out);
            continue;
        }

        out.push(Unit {
            start_byte: child.start_byte(),
            end_byte: child.end_byte(),
            start_line: child.start_position().row + 1,
            end_line: child.end_position().row + 1,
            tag,
            name: ctx.lang.entity_name(&child, ctx.source),
        });
    }
}

fn has_nested_unit(lang: Lang, node: &Node) -> bool {
    let child_count = u32::try_from(node.named_child_count()).unwrap_or(u32::MAX);
    (0..child_count)
        .filter_map(|i| node.named_child(i))
        .any(|child| lang.unit_tag(&child).is_some() || has_nested_unit(lang, &child))
}

/// Emit text between units as `global_code`, trimmed, with its line span.
/// Gaps made only of closing delimiters are dropped.
fn push_gap(file_path: &str, source: &str, lang: Lang, start: usize, end: usize, out: &mut Vec<Chunk>) {
    if start >= end {
        return;
    }
    let gap = &source[start..end];
    if is_delimiter_only(gap) {
        return;
    }

    let lead = gap.len() - gap.trim_start().len();
    let trimmed = gap.trim();
    let text_start = start + lead;
    let text_end = text_start + trimmed.len();
    let start_line = line_at(source, text_start);
    let end_line = start_line + source[text_start..text_end].matches('\n').count();

    out.push(Chunk::new(file_path, lang, GLOBAL_CODE_TAG, trimmed).with_lines(start_line, end_line));
}

fn is_delimiter_only(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_whitespace() || matches!(c, '}' | ')' | ';'))
}

fn line_at(source: &str, byte: usize) -> usize {
    source[..byte].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{FILE_TAG, chunk_file, non_ws};
    use proptest::prelude::*;

    fn run(path: &str, source: &str, lang: Lang) -> Vec<Chunk> {
        chunk_file(path, source, lang, &ChunkerConfig::default())
    }

    #[test]
    fn java_class_is_one_unit() {
        let source = "package billing;\n\npublic class Invoice {\n    int total() { return 0; }\n}\n";
        let chunks = run("Invoice.java", source, Lang::Java);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind(), "global_code");
        assert_eq!(chunks[0].text, "package billing;");
        assert_eq!(chunks[1].kind(), "class");
        assert_eq!(chunks[1].metadata.name.as_deref(), Some("Invoice"));
        assert_eq!(chunks[1].metadata.start_line, Some(3));
        assert_eq!(chunks[1].metadata.end_line, Some(5));
    }

    #[test]
    fn oversized_class_splits_into_methods() {
        let body: String = (0..40)
            .map(|i| format!("    int method{i}(int a) {{ return a + {i} * 1000000; }}\n"))
            .collect();
        let source = format!("public class Big {{\n    private int field;\n{body}}}\n");
        let config = ChunkerConfig { max_unit_size: 200 };
        let chunks = chunk_file("Big.java", &source, Lang::Java, &config);

        let functions = chunks.iter().filter(|c| c.kind() == "function").count();
        assert_eq!(functions, 40);
        assert_eq!(chunks[0].kind(), "global_code");
        assert!(chunks[0].text.starts_with("public class Big"));
        assert!(chunks[0].text.contains("private int field;"));
        // closing brace of the class is a delimiter-only gap
        assert_eq!(chunks.last().map(Chunk::kind), Some("function"));
    }

    #[test]
    fn c_functions_and_structs() {
        let source = "#include <stdio.h>\n\nstruct point { int x; int y; };\n\nstatic int add(int a, int b) {\n    return a + b;\n}\n";
        let chunks = run("math.c", source, Lang::C);

        let kinds: Vec<&str> = chunks.iter().map(Chunk::kind).collect();
        assert_eq!(kinds, vec!["global_code", "struct", "function"]);
        assert_eq!(chunks[2].metadata.name.as_deref(), Some("add"));
        assert_eq!(chunks[2].metadata.start_line, Some(5));
        assert_eq!(chunks[2].metadata.end_line, Some(7));
    }

    #[test]
    fn c_forward_declaration_is_not_a_unit() {
        let source = "struct point;\nint count;\n";
        let chunks = run("decl.h", source, Lang::C);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind(), FILE_TAG);
        assert_eq!(chunks[0].text, source);
    }

    #[test]
    fn no_units_falls_back_to_whole_file() {
        let source = "SELECT * FROM accounts WHERE id = 1;\n";
        let chunks = run("report.sql", source, Lang::Generic);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind(), FILE_TAG);
        assert_eq!(chunks[0].text, source);
        assert_eq!(chunks[0].metadata.start_line, None);
    }

    #[test]
    fn gap_line_numbers_are_one_based() {
        let source = "class A {}\n\nint stray = 1;\n\nclass B {}\n";
        let chunks = run("A.java", source, Lang::Java);
        let gap = chunks.iter().find(|c| c.kind() == "global_code").unwrap();
        assert_eq!(gap.text, "int stray = 1;");
        assert_eq!(gap.metadata.start_line, Some(3));
        assert_eq!(gap.metadata.end_line, Some(3));
    }

    #[test]
    fn units_and_gaps_keep_all_content() {
        let source = "import java.util.List;\n\nclass A {\n  void f() {}\n}\n\ninterface B { void g(); }\n";
        let chunks = run("A.java", source, Lang::Java);
        let joined: String = chunks.iter().map(|c| non_ws(&c.text)).collect();
        assert_eq!(joined, non_ws(source));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn python_two_functions_with_lines() {
        let source = "def first(a):\n    return a\n\n\ndef second(b):\n    x = b * 2\n    return x\n";
        let chunks = run("foo.py", source, Lang::Python);

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.kind() == "function"));
        assert_eq!(chunks[0].metadata.name.as_deref(), Some("first"));
        assert_eq!((chunks[0].metadata.start_line, chunks[0].metadata.end_line), (Some(1), Some(2)));
        assert_eq!((chunks[1].metadata.start_line, chunks[1].metadata.end_line), (Some(5), Some(7)));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn python_decorator_stays_with_definition() {
        let source = "@cached\ndef load():\n    return 1\n";
        let chunks = run("cache.py", source, Lang::Python);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind(), "function");
        assert!(chunks[0].text.starts_with("@cached"));
        assert_eq!(chunks[0].metadata.name.as_deref(), Some("load"));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn oversized_decorated_function_stays_whole() {
        let source = "@retry(times=3)\ndef settle(batch):\n    total = sum(batch)\n    post(total)\n    return total\n";
        let config = ChunkerConfig { max_unit_size: 20 };
        let chunks = chunk_file("settle.py", source, Lang::Python, &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind(), "function");
        assert!(chunks[0].text.starts_with("@retry(times=3)"));
        assert_eq!(chunks[0].metadata.name.as_deref(), Some("settle"));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn oversized_decorated_class_splits_into_methods() {
        let source = "@dataclass\nclass Ledger:\n    def post(self, amount):\n        self.total += amount\n\n    def close(self):\n        return self.total\n";
        let config = ChunkerConfig { max_unit_size: 20 };
        let chunks = chunk_file("ledger.py", source, Lang::Python, &config);
        let names: Vec<_> = chunks
            .iter()
            .filter(|c| c.kind() == "function")
            .filter_map(|c| c.metadata.name.as_deref())
            .collect();
        assert_eq!(names, vec!["post", "close"]);
    }

    #[cfg(feature = "lang-rust")]
    #[test]
    fn rust_impl_named_by_type() {
        let source = "struct Foo;\n\nimpl Foo {\n    fn bar(&self) {}\n}\n";
        let chunks = run("lib.rs", source, Lang::Rust);
        let kinds: Vec<&str> = chunks.iter().map(Chunk::kind).collect();
        assert_eq!(kinds, vec!["struct", "impl"]);
        assert_eq!(chunks[1].metadata.name.as_deref(), Some("Foo"));
    }

    /// Non-whitespace text minus the closing delimiters a dropped gap may hold.
    fn significant(text: &str) -> String {
        non_ws(text)
            .chars()
            .filter(|c| !matches!(c, '}' | ')' | ';'))
            .collect()
    }

    proptest! {
        #[test]
        fn java_chunks_cover_source_once(
            parts in proptest::collection::vec(
                prop_oneof![
                    Just("import java.util.List;".to_string()),
                    Just("class A { int x; void f() { if (x > 0) { x--; } } }".to_string()),
                    Just("interface B { void g(); }".to_string()),
                    Just("enum C { ON, OFF }".to_string()),
                    Just("public class D {\n  D() {}\n  int h(int a) { return a * 2; }\n}".to_string()),
                    Just("}".to_string()),
                    "[a-z0-9 ;=(){}]{0,24}",
                ],
                0..10,
            ),
            max_unit_size in 10usize..400,
        ) {
            let source = parts.join("\n");
            let config = ChunkerConfig { max_unit_size };
            let chunks = chunk_file("Gen.java", &source, Lang::Java, &config);
            let joined: String = chunks.iter().map(|c| significant(&c.text)).collect();
            prop_assert_eq!(joined, significant(&source));
            prop_assert_eq!(&chunks, &chunk_file("Gen.java", &source, Lang::Java, &config));
        }

        #[cfg(feature = "lang-python")]
        #[test]
        fn python_chunks_cover_source_once(
            parts in proptest::collection::vec(
                prop_oneof![
                    Just("import os".to_string()),
                    Just("def f(a):\n    return a + 1".to_string()),
                    Just("@cached\ndef g():\n    x = 1\n    return x".to_string()),
                    Just("class K:\n    def m(self):\n        pass\n    def n(self):\n        return 2".to_string()),
                    Just("    stray_indent = 3".to_string()),
                    "[a-z0-9 =():]{0,20}",
                ],
                0..10,
            ),
            max_unit_size in 10usize..400,
        ) {
            let source = parts.join("\n");
            let config = ChunkerConfig { max_unit_size };
            let chunks = chunk_file("gen.py", &source, Lang::Python, &config);
            let joined: String = chunks.iter().map(|c| significant(&c.text)).collect();
            prop_assert_eq!(joined, significant(&source));
            prop_assert_eq!(&chunks, &chunk_file("gen.py", &source, Lang::Python, &config));
        }
    }
}
