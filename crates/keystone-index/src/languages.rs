//! Language detection, chunking strategy dispatch and tree-sitter grammar registry.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

/// Language class of a source artifact. Each class is bound to one [`Strategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Java,
    Python,
    C,
    Rust,
    JavaScript,
    TypeScript,
    Go,
    /// Pro*C: C with embedded `EXEC SQL` statements.
    ProC,
    Cobol,
    Shell,
    Document,
    /// Configuration and data formats, indexed whole.
    Data,
    /// Anything the extension table does not know. Parsed with the Java grammar.
    Generic,
}

/// How a file of a given language is cut into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Syntax,
    CobolDivisions,
    EmbeddedSql,
    Paragraphs,
    WholeFile,
}

impl Lang {
    /// Identifier used in chunk metadata and config.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::Python => "python",
            Self::C => "c",
            Self::Rust => "rust",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::ProC => "proc",
            Self::Cobol => "cobol",
            Self::Shell => "shell",
            Self::Document => "document",
            Self::Data => "data",
            Self::Generic => "generic",
        }
    }

    #[must_use]
    pub fn strategy(self) -> Strategy {
        match self {
            Self::Java
            | Self::Python
            | Self::C
            | Self::Rust
            | Self::JavaScript
            | Self::TypeScript
            | Self::Go
            | Self::Generic => Strategy::Syntax,
            Self::ProC => Strategy::EmbeddedSql,
            Self::Cobol => Strategy::CobolDivisions,
            Self::Shell | Self::Document => Strategy::Paragraphs,
            Self::Data => Strategy::WholeFile,
        }
    }

    /// Get the tree-sitter grammar. Returns `None` if the
    /// corresponding feature is not enabled or the language has no grammar.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            Self::Java | Self::Generic => Some(tree_sitter_java::LANGUAGE.into()),
            Self::C => Some(tree_sitter_c::LANGUAGE.into()),
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Chunk tag for a node that forms a semantic unit, `None` otherwise.
    ///
    /// Wrapper nodes (decorators, `export`, `typedef`) take the tag of the
    /// definition they wrap so the wrapper text stays inside the unit.
    #[must_use]
    pub fn unit_tag(self, node: &Node) -> Option<&'static str> {
        if let Some(inner) = self.wrapped_definition(node) {
            return self.unit_tag(&inner);
        }
        match (self, node.kind()) {
            (
                Self::Java | Self::Generic,
                "method_declaration" | "constructor_declaration",
            )
            | (Self::Python, "function_definition")
            | (Self::Rust, "function_item")
            | (
                Self::JavaScript | Self::TypeScript,
                "function_declaration" | "generator_function_declaration" | "method_definition",
            )
            | (Self::Go, "function_declaration" | "method_declaration") => Some("function"),
            (Self::C, "function_definition") => Some("function"),
            (Self::Java | Self::Generic, "class_declaration" | "record_declaration")
            | (Self::Python, "class_definition")
            | (Self::JavaScript | Self::TypeScript, "class_declaration" | "abstract_class_declaration") => {
                Some("class")
            }
            (Self::Java | Self::Generic | Self::TypeScript, "interface_declaration") => {
                Some("interface")
            }
            (Self::Java | Self::Generic | Self::TypeScript, "enum_declaration")
            | (Self::Rust, "enum_item") => Some("enum"),
            (Self::C, "struct_specifier" | "union_specifier")
                if node.child_by_field_name("body").is_some() =>
            {
                Some("struct")
            }
            (Self::C, "enum_specifier") if node.child_by_field_name("body").is_some() => {
                Some("enum")
            }
            (Self::Rust, "struct_item") => Some("struct"),
            (Self::Rust, "trait_item") => Some("trait"),
            (Self::Rust, "impl_item") => Some("impl"),
            (Self::Rust, "mod_item") if node.child_by_field_name("body").is_some() => {
                Some("module")
            }
            (Self::Rust, "macro_definition") => Some("macro"),
            (Self::Rust, "type_item")
            | (Self::TypeScript, "type_alias_declaration")
            | (Self::Go, "type_declaration") => Some("type"),
            _ => None,
        }
    }

    /// The definition inside a wrapper node (decorator, `export`, `typedef`).
    pub(crate) fn wrapped_definition<'t>(self, node: &Node<'t>) -> Option<Node<'t>> {
        let field = match (self, node.kind()) {
            (Self::Python, "decorated_definition") => "definition",
            (Self::JavaScript | Self::TypeScript, "export_statement") => "declaration",
            (Self::C, "type_definition") => "type",
            _ => return None,
        };
        node.child_by_field_name(field)
    }

    /// Name of the entity a unit defines, when the grammar exposes one.
    #[must_use]
    pub fn entity_name(self, node: &Node, source: &str) -> Option<String> {
        if let Some(inner) = self.wrapped_definition(node) {
            // `typedef struct { .. } Name;` is named by its declarator
            if self == Self::C
                && inner.child_by_field_name("name").is_none()
                && let Some(decl) = node.child_by_field_name("declarator")
            {
                return Some(source[decl.byte_range()].to_string());
            }
            return self.entity_name(&inner, source);
        }

        if self == Self::C && node.kind() == "function_definition" {
            return c_declarator_name(node, source);
        }

        if self == Self::Go && node.kind() == "type_declaration" {
            let spec = node.named_child(0)?;
            let name = spec.child_by_field_name("name")?;
            return Some(source[name.byte_range()].to_string());
        }

        // tree-sitter-rust: impl_item uses "type" field, most others use "name"
        node.child_by_field_name("name")
            .or_else(|| node.child_by_field_name("type"))
            .map(|n| source[n.byte_range()].to_string())
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Follow `declarator` fields through pointer and function declarators to the identifier.
fn c_declarator_name(node: &Node, source: &str) -> Option<String> {
    let mut current = node.child_by_field_name("declarator")?;
    for _ in 0..8 {
        match current.kind() {
            "identifier" | "field_identifier" => {
                return Some(source[current.byte_range()].to_string());
            }
            _ => current = current.child_by_field_name("declarator")?,
        }
    }
    None
}

/// Detect language from file extension. Overrides map lowercase extensions
/// (without the dot) to a language and win over the built-in table.
///
/// Files with an unknown or missing extension map to [`Lang::Generic`].
#[must_use]
pub fn detect_language<S: std::hash::BuildHasher>(
    path: &Path,
    overrides: &HashMap<String, Lang, S>,
) -> Lang {
    let Some(ext) = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
    else {
        return Lang::Generic;
    };

    if let Some(lang) = overrides.get(&ext) {
        return *lang;
    }

    match ext.as_str() {
        "java" => Lang::Java,
        "py" | "pyi" => Lang::Python,
        "c" | "h" | "cpp" | "hpp" | "cc" => Lang::C,
        "rs" => Lang::Rust,
        "js" | "jsx" | "mjs" | "cjs" => Lang::JavaScript,
        "ts" | "tsx" | "mts" | "cts" => Lang::TypeScript,
        "go" => Lang::Go,
        "pc" | "ppc" | "ph" => Lang::ProC,
        "cbl" | "cob" | "pco" | "cpy" => Lang::Cobol,
        "sh" | "bash" | "zsh" | "ksh" => Lang::Shell,
        "md" | "txt" | "rst" => Lang::Document,
        "json" | "toml" | "yaml" | "yml" | "xml" | "ini" | "properties" | "cfg" => Lang::Data,
        _ => Lang::Generic,
    }
}
