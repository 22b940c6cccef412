use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use pagefabric::alerts::AlertSink;
use pagefabric::pool::{ParagraphPool, RenderInputs, ReusablePool};
use pagefabric::render::template::compile;
use pagefabric::render::{render, RenderContext};
use pagefabric::spider::SpiderKind;

fn bench_render(c: &mut Criterion) {
    let template = compile(
        "<html><head><title>{{title}}</title></head><body>\
         <h1>{{keyword}}</h1><p>{{paragraph}}</p>{{links:8}}</body></html>",
        0.5,
        0,
        2,
    )
    .unwrap();

    let paragraphs = Arc::new(ParagraphPool::new(1, 64, None));

    let inputs = RenderInputs {
        keywords: Arc::new(ReusablePool::new(vec![
            "rust web server".to_string(),
            "async runtime".to_string(),
            "object pool".to_string(),
        ])),
        titles: Arc::new(ReusablePool::new(vec!["Rust Performance Guide".to_string()])),
        images: Arc::new(ReusablePool::new(vec!["/img/rust.png".to_string()])),
        css_classes: Arc::new(ReusablePool::new(vec!["pf-aaaa1111".to_string()])),
        urls: Arc::new(ReusablePool::new(vec!["rust-web-server".to_string()])),
        emojis: Arc::new(ReusablePool::new(vec!["🔥".to_string()])),
        paragraphs: Arc::clone(&paragraphs),
        group_id: 1,
        alerts: AlertSink::new(Duration::from_secs(60)),
    };

    let ctx = RenderContext {
        domain: "example.com",
        path: "/rust-web-server",
        spider_kind: SpiderKind::Google,
        inputs: &inputs,
    };

    c.bench_function("render_page", |b| {
        b.iter_batched(
            || {
                let _ = paragraphs.sender().try_send((
                    1,
                    "Rust gives you control without giving up safety.".to_string(),
                ));
            },
            |_| render(&template, &ctx).unwrap(),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("entity_encode_title", |b| {
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(128);
            pagefabric::render::entities::write_encoded(&mut buf, "Rust Performance Guide", 0.5);
        });
    });
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
