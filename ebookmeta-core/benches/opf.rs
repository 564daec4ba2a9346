//! OPF metadata extraction benchmarks

use criterion::{criterion_group, criterion_main, Criterion};
use ebookmeta_core::handler::EpubContainer;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

fn sample_epub(subjects: usize) -> Vec<u8> {
    let subjects: String = (0..subjects)
        .map(|i| format!("    <dc:subject>Subject {i}</dc:subject>\n"))
        .collect();
    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf" unique-identifier="BookId" version="2.0">
  <metadata>
    <dc:title>Benchmark</dc:title>
    <dc:creator opf:role="aut">Someone</dc:creator>
    <dc:identifier id="BookId" opf:scheme="uuid">urn:uuid:00000000-0000-4000-8000-000000000000</dc:identifier>
{subjects}    <meta name="calibre:series" content="Bench"/>
    <meta name="cover" content="cover"/>
  </metadata>
  <manifest>
    <item id="cover" href="cover.jpg" media-type="image/jpeg"/>
  </manifest>
</package>"#
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in [
        ("mimetype", "application/epub+zip"),
        ("META-INF/container.xml", CONTAINER_XML),
        ("OEBPS/content.opf", opf.as_str()),
    ] {
        writer.start_file(name, FileOptions::default()).unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn opf_benchmark(c: &mut Criterion) {
    let small = sample_epub(5);
    let large = sample_epub(500);

    c.bench_function("opf_properties_small", |b| {
        b.iter(|| {
            let container = EpubContainer::open(std::hint::black_box(small.clone())).unwrap();
            container.package().properties()
        })
    });

    c.bench_function("opf_properties_large", |b| {
        b.iter(|| {
            let container = EpubContainer::open(std::hint::black_box(large.clone())).unwrap();
            container.package().properties()
        })
    });
}

criterion_group!(benches, opf_benchmark);
criterion_main!(benches);
