//! Internal link synthesis: a bounded number of same-domain hrefs built
//! from the keyword and URL pools, per spec §4.5 ("up to several
//! thousand" — this crate bounds it with `SEO_INTERNAL_LINKS_COUNT`,
//! default 8, and a hard ceiling to keep render time bounded regardless
//! of misconfiguration).

use bytes::BytesMut;

use crate::error::RenderError;
use crate::pool::RenderInputs;

/// Upper bound on link_count regardless of configuration, so a
/// misconfigured template can't blow the render budget.
const MAX_LINKS: usize = 3856;

pub fn write_links(
    buf: &mut BytesMut,
    domain: &str,
    inputs: &RenderInputs,
    link_count: usize,
) -> Result<(), RenderError> {
    let count = link_count.min(MAX_LINKS);
    buf.extend_from_slice(b"<ul class=\"related\">");
    for _ in 0..count {
        let keyword = inputs.next_keyword()?;
        let slug = inputs.next_url()?;
        buf.extend_from_slice(b"<li><a href=\"https://");
        buf.extend_from_slice(domain.as_bytes());
        buf.extend_from_slice(b"/");
        buf.extend_from_slice(slug.as_bytes());
        buf.extend_from_slice(b"\">");
        buf.extend_from_slice(keyword.as_bytes());
        buf.extend_from_slice(b"</a></li>");
    }
    buf.extend_from_slice(b"</ul>");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertSink;
    use crate::pool::{ParagraphPool, ReusablePool};
    use std::sync::Arc;
    use std::time::Duration;

    fn inputs() -> RenderInputs {
        RenderInputs {
            keywords: Arc::new(ReusablePool::new(vec!["rust".to_string()])),
            titles: Arc::new(ReusablePool::new(vec!["Title".to_string()])),
            images: Arc::new(ReusablePool::new(vec!["/img.png".to_string()])),
            css_classes: Arc::new(ReusablePool::new(vec!["pf-aaaa".to_string()])),
            urls: Arc::new(ReusablePool::new(vec!["rust".to_string()])),
            emojis: Arc::new(ReusablePool::new(vec!["🔥".to_string()])),
            paragraphs: Arc::new(ParagraphPool::new(1, 4, None)),
            group_id: 1,
            alerts: AlertSink::new(Duration::from_secs(60)),
        }
    }

    #[test]
    fn link_count_is_capped_at_max_links() {
        assert!(MAX_LINKS.min(usize::MAX) == MAX_LINKS);
    }

    #[test]
    fn write_links_renders_hrefs_from_the_url_pool() {
        let mut buf = BytesMut::new();
        write_links(&mut buf, "example.com", &inputs(), 1).unwrap();
        let out = String::from_utf8(buf.to_vec()).unwrap();
        assert!(out.contains("https://example.com/rust"));
    }

    #[test]
    fn write_links_surfaces_pool_empty_when_url_pool_is_drained() {
        let render_inputs = inputs();
        render_inputs.urls.acquire();
        let mut buf = BytesMut::new();
        assert!(write_links(&mut buf, "example.com", &render_inputs, 1).is_err());
    }
}
