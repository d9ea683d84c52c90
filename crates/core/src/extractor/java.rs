//! Java reference extractor: `tree-sitter-java` walked the way
//! `codescope-server/src/ast.rs::walk_node` walks its own symbol tree, but
//! emitting CLASS/FUNCTION/BLOCK [`IndexUnit`]s with the body-collapsing and
//! triviality rules the duplication engine needs instead of a flat symbol
//! catalogue.

use tree_sitter::{Node, Parser};

use super::{is_trivial_accessor_name, LanguageExtractor, BLOCK_MIN_LINES_CONSTANT};
use crate::error::{DryError, Result};
use crate::types::{DryConfig, IndexUnit, UnitKind};

pub struct JavaExtractor {
    language: tree_sitter::Language,
}

impl JavaExtractor {
    pub fn new() -> Result<Self> {
        Ok(JavaExtractor { language: tree_sitter_java::LANGUAGE.into() })
    }
}

struct ExtractCtx<'a> {
    rel_path: &'a str,
    bytes: &'a [u8],
    comment_ranges: &'a [(usize, usize)],
    config: &'a DryConfig,
    units: Vec<IndexUnit>,
}

impl LanguageExtractor for JavaExtractor {
    fn supports(&self, rel_path: &str) -> bool {
        rel_path.ends_with(".java")
    }

    fn extract(&self, rel_path: &str, source: &str, config: &DryConfig) -> Result<Vec<IndexUnit>> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).map_err(|e| DryError::ParseFailure {
            path: rel_path.to_string(),
            detail: e.to_string(),
        })?;
        let tree = parser.parse(source, None).ok_or_else(|| DryError::ParseFailure {
            path: rel_path.to_string(),
            detail: "tree-sitter produced no parse tree".to_string(),
        })?;

        let bytes = source.as_bytes();
        let comment_ranges = collect_comment_ranges(&tree.root_node());

        let mut ctx = ExtractCtx {
            rel_path,
            bytes,
            comment_ranges: &comment_ranges,
            config,
            units: Vec::new(),
        };
        find_classes(&tree.root_node(), &mut ctx);
        Ok(ctx.units)
    }

    fn label(&self, unit: &IndexUnit) -> String {
        match unit.kind {
            UnitKind::Class => unit.file_path.clone(),
            UnitKind::Function => format!("{}(arity:{})", unit.name, super::parse_arity(&unit.code)),
            UnitKind::Block => sha1_hex(&normalize_for_hash(&unit.code)),
        }
    }
}

fn find_classes(node: &Node, ctx: &mut ExtractCtx) {
    if node.kind() == "class_declaration" {
        handle_class(node, None, ctx);
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        find_classes(&child, ctx);
    }
}

fn handle_class(class_node: &Node, parent_class_id: Option<String>, ctx: &mut ExtractCtx) {
    let class_name = field_text(class_node, "name", ctx.bytes).unwrap_or_default();
    let body = class_node.child_by_field_name("body");

    if let Some(body_node) = &body {
        if is_dto_class(body_node, ctx.bytes) {
            return;
        }
    }

    let start_line = class_node.start_position().row as u32 + 1;
    let end_line = class_node.end_position().row as u32 + 1;
    let id = IndexUnit::make_id(UnitKind::Class, &class_name, start_line, end_line);
    let emit = end_line - start_line + 1 >= ctx.config.min_lines;

    // A class too small to emit still has its functions attributed to the
    // nearest *real* enclosing class, never to an id nobody stores.
    let child_parent_id = if emit { Some(id.clone()) } else { parent_class_id };

    if emit {
        if let Some(body_node) = &body {
            let mut splices = collect_method_body_spans(body_node)
                .into_iter()
                .map(|(start, end)| Splice { start, end, replacement: " { }" })
                .collect::<Vec<_>>();
            for &(cs, ce) in ctx.comment_ranges {
                if cs >= class_node.start_byte()
                    && ce <= class_node.end_byte()
                    && !splices.iter().any(|s| cs >= s.start && ce <= s.end)
                {
                    splices.push(Splice { start: cs, end: ce, replacement: "" });
                }
            }
            let code = apply_splices(ctx.bytes, class_node.start_byte(), class_node.end_byte(), splices);
            ctx.units.push(IndexUnit {
                id,
                name: class_name.clone(),
                file_path: ctx.rel_path.to_string(),
                start_line,
                end_line,
                code,
                kind: UnitKind::Class,
                parent_id: None,
                embedding: None,
                children: Vec::new(),
            });
        }
    }

    let Some(body_node) = body else { return };
    let mut cursor = body_node.walk();
    for child in body_node.children(&mut cursor) {
        match child.kind() {
            "method_declaration" | "constructor_declaration" => {
                handle_method(&child, child_parent_id.clone(), &class_name, ctx);
            }
            "class_declaration" => handle_class(&child, child_parent_id.clone(), ctx),
            _ => {}
        }
    }
}

fn handle_method(node: &Node, parent_class_id: Option<String>, class_name: &str, ctx: &mut ExtractCtx) {
    let simple_name = match field_text(node, "name", ctx.bytes) {
        Some(n) if !n.is_empty() => n,
        _ => return,
    };

    let start_line = node.start_position().row as u32 + 1;
    let end_line = node.end_position().row as u32 + 1;
    let too_small = end_line - start_line + 1 < ctx.config.min_lines;

    if is_trivial_accessor_name(&simple_name) || too_small {
        return;
    }

    let qualified_name = format!("{class_name}.{simple_name}");
    let id = IndexUnit::make_id(UnitKind::Function, &qualified_name, start_line, end_line);
    let code = strip_comments_only(node, ctx);

    ctx.units.push(IndexUnit {
        id: id.clone(),
        name: qualified_name.clone(),
        file_path: ctx.rel_path.to_string(),
        start_line,
        end_line,
        code,
        kind: UnitKind::Function,
        parent_id: parent_class_id,
        embedding: None,
        children: Vec::new(),
    });

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            collect_blocks(&child, &id, &qualified_name, ctx);
        }
    }
}

fn collect_blocks(node: &Node, parent_function_id: &str, function_qualified_name: &str, ctx: &mut ExtractCtx) {
    if node.kind() == "block" {
        let start_line = node.start_position().row as u32 + 1;
        let end_line = node.end_position().row as u32 + 1;
        let line_count = end_line - start_line + 1;
        let min_block = ctx.config.min_block_lines.max(BLOCK_MIN_LINES_CONSTANT);
        if line_count >= min_block {
            let id = IndexUnit::make_id(UnitKind::Block, function_qualified_name, start_line, end_line);
            let code = strip_comments_only(node, ctx);
            ctx.units.push(IndexUnit {
                id,
                name: "block".to_string(),
                file_path: ctx.rel_path.to_string(),
                start_line,
                end_line,
                code,
                kind: UnitKind::Block,
                parent_id: Some(parent_function_id.to_string()),
                embedding: None,
                children: Vec::new(),
            });
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_blocks(&child, parent_function_id, function_qualified_name, ctx);
    }
}

fn is_dto_class(body: &Node, bytes: &[u8]) -> bool {
    let mut has_field = false;
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        match child.kind() {
            "field_declaration" => has_field = true,
            "line_comment" | "block_comment" => {}
            "method_declaration" => {
                let name = child
                    .child_by_field_name("name")
                    .and_then(|n| n.utf8_text(bytes).ok())
                    .unwrap_or("");
                if !is_trivial_accessor_name(name) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    has_field
}

fn field_text(node: &Node, field: &str, bytes: &[u8]) -> Option<String> {
    node.child_by_field_name(field).and_then(|n| n.utf8_text(bytes).ok()).map(str::to_string)
}

fn collect_comment_ranges(root: &Node) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    collect_comment_ranges_rec(root, &mut ranges);
    ranges.sort_unstable();
    ranges
}

fn collect_comment_ranges_rec(node: &Node, ranges: &mut Vec<(usize, usize)>) {
    if matches!(node.kind(), "line_comment" | "block_comment") {
        ranges.push((node.start_byte(), node.end_byte()));
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_comment_ranges_rec(&child, ranges);
    }
}

fn collect_method_body_spans(node: &Node) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    collect_method_body_spans_rec(node, &mut spans);
    spans
}

fn collect_method_body_spans_rec(node: &Node, spans: &mut Vec<(usize, usize)>) {
    if matches!(node.kind(), "method_declaration" | "constructor_declaration") {
        if let Some(body) = node.child_by_field_name("body") {
            spans.push((body.start_byte(), body.end_byte()));
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_method_body_spans_rec(&child, spans);
    }
}

struct Splice {
    start: usize,
    end: usize,
    replacement: &'static str,
}

fn apply_splices(bytes: &[u8], region_start: usize, region_end: usize, mut splices: Vec<Splice>) -> String {
    splices.sort_by_key(|s| s.start);
    let mut out = String::with_capacity(region_end.saturating_sub(region_start));
    let mut cursor = region_start;
    for s in splices {
        if s.start < cursor {
            continue;
        }
        out.push_str(&String::from_utf8_lossy(&bytes[cursor..s.start]));
        out.push_str(s.replacement);
        cursor = s.end;
    }
    out.push_str(&String::from_utf8_lossy(&bytes[cursor..region_end]));
    out
}

fn strip_comments_only(node: &Node, ctx: &ExtractCtx) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    let splices = ctx
        .comment_ranges
        .iter()
        .filter(|&&(cs, ce)| cs >= start && ce <= end)
        .map(|&(cs, ce)| Splice { start: cs, end: ce, replacement: "" })
        .collect();
    apply_splices(ctx.bytes, start, end, splices)
}

fn normalize_for_hash(code: &str) -> String {
    code.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn sha1_hex(input: &str) -> String {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> DryConfig {
        DryConfig { min_lines: 1, min_block_lines: 1, ..DryConfig::default() }
    }

    #[test]
    fn extracts_class_and_function() {
        let src = r#"
public class Calculator {
    public int add(int a, int b) {
        int result = a + b;
        return result;
    }
}
"#;
        let ex = JavaExtractor::new().unwrap();
        let units = ex.extract("Calculator.java", src, &cfg()).unwrap();
        let class = units.iter().find(|u| u.kind == UnitKind::Class).expect("class unit");
        assert_eq!(class.name, "Calculator");
        assert!(class.code.contains("{ }"), "method body should be collapsed: {}", class.code);

        let func = units.iter().find(|u| u.kind == UnitKind::Function).expect("function unit");
        assert_eq!(func.name, "Calculator.add");
        assert_eq!(func.parent_id.as_deref(), Some(class.id.as_str()));
        assert_eq!(ex.label(func), "Calculator.add(arity:2)");
    }

    #[test]
    fn skips_trivial_accessors() {
        let src = r#"
public class Point {
    private int x;
    public int getX() { return x; }
    public void setX(int x) { this.x = x; }
}
"#;
        let ex = JavaExtractor::new().unwrap();
        let units = ex.extract("Point.java", src, &cfg()).unwrap();
        // Pure field + trivial accessors -> DTO, skipped entirely.
        assert!(units.is_empty(), "expected DTO skip, got {units:?}");
    }

    #[test]
    fn non_trivial_class_keeps_non_trivial_methods_only() {
        let src = r#"
public class Widget {
    private int x;
    public int getX() { return x; }
    public int compute(int y) {
        return x * y + 1;
    }
}
"#;
        let ex = JavaExtractor::new().unwrap();
        let units = ex.extract("Widget.java", src, &cfg()).unwrap();
        let names: Vec<&str> = units.iter().filter(|u| u.kind == UnitKind::Function).map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Widget.compute"]);
    }

    #[test]
    fn comments_are_stripped() {
        let src = r#"
public class Commented {
    // a line comment
    public int compute(int y) {
        /* block comment */
        return y + 1;
    }
}
"#;
        let ex = JavaExtractor::new().unwrap();
        let units = ex.extract("Commented.java", src, &cfg()).unwrap();
        let func = units.iter().find(|u| u.kind == UnitKind::Function).unwrap();
        assert!(!func.code.contains("line comment"));
        assert!(!func.code.contains("block comment"));
    }

    #[test]
    fn block_label_is_order_invariant_under_reformatting() {
        let ex = JavaExtractor::new().unwrap();
        let a = IndexUnit {
            id: "BLOCK:x:1-3".into(),
            name: "block".into(),
            file_path: "A.java".into(),
            start_line: 1,
            end_line: 3,
            code: "if (x) {\n  foo();\n}".into(),
            kind: UnitKind::Block,
            parent_id: None,
            embedding: None,
            children: Vec::new(),
        };
        let b = IndexUnit { code: "if   (x)   {\nfoo( ) ;\n}".into(), ..a.clone() };
        assert_eq!(ex.label(&a), ex.label(&b));
    }
}
