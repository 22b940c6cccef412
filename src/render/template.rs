//! Compiled template representation and compiler.
//!
//! A template source string is parsed once (on cold load, or on cache
//! miss in [`crate::site::TemplateStore`]) into a flat `Vec<TemplateNode>`
//! so the render hot path is a single linear walk with no parsing or
//! reflection per request.

use bytes::Bytes;

use crate::error::TemplateError;

/// A compiled template, ready to be rendered against any number of
/// [`crate::render::RenderContext`]s.
#[derive(Debug)]
pub struct CompiledTemplate {
    pub nodes: Vec<TemplateNode>,
    /// Rough output size used to size the render buffer's initial
    /// allocation; computed once at compile time from the literal bytes.
    pub estimated_size: usize,
}

#[derive(Debug, Clone)]
pub enum TemplateNode {
    Literal(Bytes),
    Primitive(PrimitiveKind, PrimitiveArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Keyword,
    KeywordEmoji,
    Title,
    Paragraph,
    Image,
    InternalLinks,
    CanonicalPath,
    CssClass,
    Emoji,
}

#[derive(Debug, Clone, Default)]
pub struct PrimitiveArgs {
    pub encoding_mix_ratio: f64,
    pub link_count: usize,
    pub emoji_min: usize,
    pub emoji_max: usize,
}

/// Tag syntax in template source: `{{keyword}}`, `{{keyword_emoji}}`,
/// `{{title}}`, `{{paragraph}}`, `{{image}}`, `{{links:8}}`, `{{path}}`,
/// `{{css_class}}`, `{{emoji}}`. Anything outside `{{ }}` is a literal,
/// copied byte-for-byte.
pub fn compile(
    source: &str,
    encoding_mix_ratio: f64,
    emoji_min: usize,
    emoji_max: usize,
) -> Result<CompiledTemplate, TemplateError> {
    let mut nodes = Vec::new();
    let mut estimated_size = 0;
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            let literal = &rest[..start];
            estimated_size += literal.len();
            nodes.push(TemplateNode::Literal(Bytes::copy_from_slice(
                literal.as_bytes(),
            )));
        }
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or_else(|| TemplateError::Compile("unterminated tag".to_string()))?;
        let tag = after_open[..end].trim();
        nodes.push(compile_tag(tag, encoding_mix_ratio, emoji_min, emoji_max)?);
        estimated_size += 64;
        rest = &after_open[end + 2..];
    }
    if !rest.is_empty() {
        estimated_size += rest.len();
        nodes.push(TemplateNode::Literal(Bytes::copy_from_slice(
            rest.as_bytes(),
        )));
    }

    Ok(CompiledTemplate {
        nodes,
        estimated_size,
    })
}

fn compile_tag(
    tag: &str,
    encoding_mix_ratio: f64,
    emoji_min: usize,
    emoji_max: usize,
) -> Result<TemplateNode, TemplateError> {
    let mut parts = tag.splitn(2, ':');
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    let args = PrimitiveArgs {
        encoding_mix_ratio,
        link_count: arg.and_then(|a| a.parse().ok()).unwrap_or(8),
        emoji_min,
        emoji_max,
    };

    let kind = match name {
        "keyword" => PrimitiveKind::Keyword,
        "keyword_emoji" => PrimitiveKind::KeywordEmoji,
        "title" => PrimitiveKind::Title,
        "paragraph" => PrimitiveKind::Paragraph,
        "image" => PrimitiveKind::Image,
        "links" => PrimitiveKind::InternalLinks,
        "path" => PrimitiveKind::CanonicalPath,
        "css_class" => PrimitiveKind::CssClass,
        "emoji" => PrimitiveKind::Emoji,
        other => {
            return Err(TemplateError::Compile(format!("unknown tag: {other}")));
        }
    };
    Ok(TemplateNode::Primitive(kind, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_literal_and_primitive_mix() {
        let compiled = compile("<h1>{{title}}</h1><p>{{paragraph}}</p>", 0.5, 0, 2).unwrap();
        assert_eq!(compiled.nodes.len(), 5);
    }

    #[test]
    fn links_tag_parses_count_argument() {
        let compiled = compile("{{links:12}}", 0.5, 0, 2).unwrap();
        match &compiled.nodes[0] {
            TemplateNode::Primitive(PrimitiveKind::InternalLinks, args) => {
                assert_eq!(args.link_count, 12);
            }
            _ => panic!("expected internal links primitive"),
        }
    }

    #[test]
    fn keyword_emoji_tag_carries_configured_bounds() {
        let compiled = compile("{{keyword_emoji}}", 0.5, 1, 3).unwrap();
        match &compiled.nodes[0] {
            TemplateNode::Primitive(PrimitiveKind::KeywordEmoji, args) => {
                assert_eq!((args.emoji_min, args.emoji_max), (1, 3));
            }
            _ => panic!("expected keyword_emoji primitive"),
        }
    }

    #[test]
    fn css_class_and_emoji_tags_compile() {
        let compiled = compile("{{css_class}}{{emoji}}", 0.5, 0, 2).unwrap();
        assert!(matches!(
            compiled.nodes[0],
            TemplateNode::Primitive(PrimitiveKind::CssClass, _)
        ));
        assert!(matches!(
            compiled.nodes[1],
            TemplateNode::Primitive(PrimitiveKind::Emoji, _)
        ));
    }

    #[test]
    fn unknown_tag_fails_to_compile() {
        assert!(compile("{{bogus}}", 0.5, 0, 2).is_err());
    }

    #[test]
    fn unterminated_tag_fails_to_compile() {
        assert!(compile("{{keyword", 0.5, 0, 2).is_err());
    }
}
