//! Page rendering: walking a compiled template against a [`RenderContext`]
//! drawn from the object pools, within the latency budget described in
//! spec §7.

pub mod entities;
pub mod links;
pub mod template;

use bytes::{Bytes, BytesMut};

use crate::error::RenderError;
use crate::pool::{derived, RenderInputs};
use crate::spider::SpiderKind;

use template::{CompiledTemplate, PrimitiveKind, TemplateNode};

/// Everything the render path needs to produce one page body. Built fresh
/// per request from whatever the object pools hand back; never touches
/// Postgres or Redis directly.
pub struct RenderContext<'a> {
    pub domain: &'a str,
    pub path: &'a str,
    pub spider_kind: SpiderKind,
    pub inputs: &'a RenderInputs,
}

/// Walks a compiled template's node list once, writing literal bytes
/// verbatim and expanding primitives inline. No interpreter, no
/// reflection: this is the loop the whole latency budget in spec §7 is
/// built around.
pub fn render(template: &CompiledTemplate, ctx: &RenderContext<'_>) -> Result<Bytes, RenderError> {
    let mut buf = BytesMut::with_capacity(template.estimated_size);
    for node in &template.nodes {
        match node {
            TemplateNode::Literal(bytes) => buf.extend_from_slice(bytes),
            TemplateNode::Primitive(kind, args) => expand_primitive(&mut buf, *kind, args, ctx)?,
        }
    }
    Ok(buf.freeze())
}

fn expand_primitive(
    buf: &mut BytesMut,
    kind: PrimitiveKind,
    args: &template::PrimitiveArgs,
    ctx: &RenderContext<'_>,
) -> Result<(), RenderError> {
    match kind {
        PrimitiveKind::Keyword => {
            let value = ctx.inputs.next_keyword()?;
            entities::write_encoded(buf, &value, args.encoding_mix_ratio);
        }
        PrimitiveKind::KeywordEmoji => {
            let keyword = ctx.inputs.next_keyword()?;
            let count = derived::emoji_count(args.emoji_min, args.emoji_max);
            let mut emojis = Vec::with_capacity(count);
            for _ in 0..count {
                emojis.push(ctx.inputs.next_emoji()?);
            }
            let value = derived::join_keyword_with_emojis(&keyword, &emojis);
            entities::write_encoded(buf, &value, args.encoding_mix_ratio);
        }
        PrimitiveKind::Title => {
            let value = ctx.inputs.next_title()?;
            entities::write_encoded(buf, &value, args.encoding_mix_ratio);
        }
        PrimitiveKind::Paragraph => {
            let value = ctx.inputs.next_paragraph()?;
            entities::write_encoded(buf, &value, args.encoding_mix_ratio);
        }
        PrimitiveKind::Image => {
            let value = ctx.inputs.next_image()?;
            buf.extend_from_slice(value.as_bytes());
        }
        PrimitiveKind::CssClass => {
            let value = ctx.inputs.next_css_class()?;
            buf.extend_from_slice(value.as_bytes());
        }
        PrimitiveKind::Emoji => {
            let value = ctx.inputs.next_emoji()?;
            buf.extend_from_slice(value.as_bytes());
        }
        PrimitiveKind::InternalLinks => {
            links::write_links(buf, ctx.domain, ctx.inputs, args.link_count)?;
        }
        PrimitiveKind::CanonicalPath => {
            buf.extend_from_slice(ctx.path.as_bytes());
        }
    }
    Ok(())
}
