//! YAML document stream codec
//!
//! Splits a multi-document stream into [`Node`]s, keeping the comment lines
//! that surround each document and the line numbers the document occupied.
//!
//! Only head and foot comments survive a round trip. Comments inside a
//! document (on their own line or after a value) are handed to serde_yaml
//! with the body and dropped there.

use serde_yaml::Value;

use crate::error::Result;
use crate::node::Node;

/// Parse a (possibly multi-document) YAML stream
///
/// Empty documents are skipped. Leading `#` lines become the head comment,
/// trailing `#` lines at column 0 the foot comment. Indented trailing `#`
/// lines may belong to a block scalar and stay in the body.
pub fn parse_documents(input: &str) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    let mut chunk: Vec<(usize, &str)> = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        if is_document_separator(line) {
            if let Some(node) = parse_chunk(&chunk)? {
                nodes.push(node);
            }
            chunk.clear();
            continue;
        }
        chunk.push((idx + 1, line));
    }

    if let Some(node) = parse_chunk(&chunk)? {
        nodes.push(node);
    }

    Ok(nodes)
}

fn is_document_separator(line: &str) -> bool {
    let rest = match line.strip_prefix("---") {
        Some(rest) => rest,
        None => return line.trim_end() == "...",
    };
    rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t')
}

fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let text = trimmed.strip_prefix('#')?;
    Some(text.strip_prefix(' ').unwrap_or(text))
}

fn parse_chunk(chunk: &[(usize, &str)]) -> Result<Option<Node>> {
    let is_content = |line: &str| !line.trim().is_empty() && comment_text(line).is_none();
    // Block scalar content is always indented, so a column 0 `#` is a comment
    let is_body = |line: &str| !line.trim().is_empty() && !line.starts_with('#');

    let Some(first) = chunk.iter().position(|(_, l)| is_content(l)) else {
        return Ok(None);
    };
    let last = chunk
        .iter()
        .rposition(|(_, l)| is_body(l))
        .unwrap_or(first);
    // Blank lines before the foot comment belong to the body (`|+` keeps them)
    let end = chunk[last + 1..]
        .iter()
        .position(|(_, l)| l.starts_with('#'))
        .map_or(chunk.len(), |offset| last + 1 + offset);

    let mut body = String::new();
    for (_, line) in &chunk[first..end] {
        body.push_str(line);
        body.push('\n');
    }

    let value: Value = serde_yaml::from_str(&body)?;
    if value.is_null() {
        return Ok(None);
    }

    let mut node = Node::new(value);
    node.set_position(chunk[first].0, last - first + 1);

    let head: Vec<&str> = chunk[..first]
        .iter()
        .filter_map(|(_, l)| comment_text(l))
        .collect();
    if !head.is_empty() {
        node.set_head_comment(head.join("\n"));
    }

    let foot: Vec<&str> = chunk[end..]
        .iter()
        .filter_map(|(_, l)| comment_text(l))
        .collect();
    if !foot.is_empty() {
        node.set_foot_comment(foot.join("\n"));
    }

    Ok(Some(node))
}

/// Render a single node as YAML, including its comments
pub fn to_yaml(node: &Node) -> Result<String> {
    let mut out = String::new();
    if let Some(head) = node.head_comment() {
        push_comment(&mut out, head);
    }
    out.push_str(&serde_yaml::to_string(node.value())?);
    if let Some(foot) = node.foot_comment() {
        push_comment(&mut out, foot);
    }
    Ok(out)
}

fn push_comment(out: &mut String, comment: &str) {
    for line in comment.lines() {
        if line.is_empty() {
            out.push_str("#\n");
        } else {
            out.push_str("# ");
            out.push_str(line);
            out.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multi_document_stream() {
        let input = r#"# Source: chart/templates/cm.yaml
apiVersion: v1
kind: ConfigMap
metadata:
  name: one
---
---

apiVersion: v1
kind: Secret
metadata:
  name: two
# trailing note
"#;
        let nodes = parse_documents(input).unwrap();
        assert_eq!(nodes.len(), 2);

        assert_eq!(nodes[0].name(), "one");
        assert_eq!(nodes[0].head_comment(), Some("Source: chart/templates/cm.yaml"));
        assert_eq!(nodes[0].line(), 2);
        assert_eq!(nodes[0].line_count(), 4);

        assert_eq!(nodes[1].name(), "two");
        assert_eq!(nodes[1].line(), 9);
        assert_eq!(nodes[1].foot_comment(), Some("trailing note"));
    }

    #[test]
    fn test_separator_with_trailing_text_is_not_content() {
        assert!(is_document_separator("---"));
        assert!(is_document_separator("--- # comment"));
        assert!(is_document_separator("..."));
        assert!(!is_document_separator("----"));
        assert!(!is_document_separator("  ---"));
    }

    #[test]
    fn test_empty_stream() {
        assert!(parse_documents("").unwrap().is_empty());
        assert!(parse_documents("---\n# only a comment\n---\n").unwrap().is_empty());
    }

    #[test]
    fn test_to_yaml_includes_comments() {
        let mut node = Node::from_yaml("kind: A\nmetadata:\n  name: x\n").unwrap();
        node.set_head_comment("Source: a.yaml");
        let yaml = to_yaml(&node).unwrap();
        assert!(yaml.starts_with("# Source: a.yaml\nkind: A\n"));
    }

    #[test]
    fn test_block_scalar_keeps_trailing_newline() {
        let input = "kind: ConfigMap\ndata:\n  run.sh: |\n    echo hi\n";
        let nodes = parse_documents(input).unwrap();
        assert_eq!(nodes[0].value()["data"]["run.sh"].as_str(), Some("echo hi\n"));

        let input = "kind: ConfigMap\ndata:\n  run.sh: |\n    echo hi\n---\nkind: Other\n";
        let nodes = parse_documents(input).unwrap();
        assert_eq!(nodes[0].value()["data"]["run.sh"].as_str(), Some("echo hi\n"));
    }

    #[test]
    fn test_indented_hash_line_stays_in_block_scalar() {
        let input = "kind: ConfigMap\ndata:\n  run.sh: |\n    echo hi\n    # done\n# foot\n";
        let nodes = parse_documents(input).unwrap();
        assert_eq!(
            nodes[0].value()["data"]["run.sh"].as_str(),
            Some("echo hi\n# done\n")
        );
        assert_eq!(nodes[0].foot_comment(), Some("foot"));
        assert_eq!(nodes[0].line_count(), 5);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(parse_documents("kind: [unterminated\n").is_err());
    }
}
