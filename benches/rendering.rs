use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use blobmail::index::cache::MetadataCache;
use blobmail::index::codec;
use blobmail::index::mailbox::MailboxIndex;
use blobmail::parser::content::ContentExtractor;
use blobmail::parser::mime::parse_mime;
use blobmail::store::backend::ObjectBackend;
use blobmail::store::memory::MemoryBackend;

const HTML_MESSAGE: &str = concat!(
    "From: news@example.com\r\n",
    "Subject: Weekly digest\r\n",
    "MIME-Version: 1.0\r\n",
    "Content-Type: multipart/mixed; boundary=\"sep\"\r\n",
    "\r\n",
    "--sep\r\n",
    "Content-Type: text/html; charset=utf-8\r\n",
    "\r\n",
    "<html><body><h1>Digest</h1><!-- tracking -->",
    "<p>Read more at https://example.com/a and https://example.com/b</p>",
    "<script>track()</script><img src=\"https://example.com/p.gif\">",
    "<a href=\"https://example.com/c\">https://example.com/c</a></body></html>\r\n",
    "--sep\r\n",
    "Content-Type: application/pdf\r\n",
    "Content-Transfer-Encoding: base64\r\n",
    "\r\n",
    "JVBERi0xLjQK\r\n",
    "--sep--\r\n",
);

fn bench_extract_content(c: &mut Criterion) {
    let extractor = ContentExtractor::new();
    c.bench_function("extract_html_content", |b| {
        b.iter(|| {
            let mime = parse_mime(HTML_MESSAGE.as_bytes());
            extractor.extract(&mime)
        })
    });
}

fn bench_list_mailbox(c: &mut Criterion) {
    let backend = Arc::new(MemoryBackend::with_page_size(100));
    for i in 0..1000 {
        let key = format!("email/{i:05}");
        backend.insert(&key, HTML_MESSAGE.as_bytes().to_vec());
        let tags = codec::encode(Some("news@example.com"), Some("Weekly digest"), None);
        backend.put_object_tags(&key, &tags).unwrap();
    }
    let index = MailboxIndex::new(backend, Arc::new(MetadataCache::new(2048, None)));

    c.bench_function("list_1000_cached", |b| {
        b.iter(|| index.list("email/").unwrap())
    });
}

criterion_group!(benches, bench_extract_content, bench_list_mailbox);
criterion_main!(benches);
