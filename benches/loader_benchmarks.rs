use criterion::{black_box, criterion_group, criterion_main, Criterion};
use retail_pipeline::loader::{partition, SourceReader};

const HEADER: &str =
    "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country\n";

fn source_bytes(rows: usize) -> Vec<u8> {
    let mut source = String::from(HEADER);
    for i in 0..rows {
        let customer = if i % 4 == 0 { "" } else { "17850" };
        source.push_str(&format!(
            "{},85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,12/1/2010 8:26,2.55,{customer},United Kingdom\n",
            536_365 + i
        ));
    }
    source.into_bytes()
}

fn benchmark_extraction(c: &mut Criterion) {
    let bytes = source_bytes(10_250);
    let reader = SourceReader::default();
    c.bench_function("extract_10k_rows", |b| {
        b.iter(|| reader.read_from(black_box(bytes.as_slice())))
    });
}

fn benchmark_partition(c: &mut Criterion) {
    let records = SourceReader::default()
        .read_from(source_bytes(10_250).as_slice())
        .expect("benchmark source parses");
    c.bench_function("partition_10k_rows", |b| {
        b.iter(|| partition(black_box(&records), 5_000).map(<[_]>::len).sum::<usize>())
    });
}

criterion_group!(benches, benchmark_extraction, benchmark_partition);
criterion_main!(benches);
