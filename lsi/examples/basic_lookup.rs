//! Builds an index over a small unsorted relation and runs an equality and
//! a lower-bound lookup against it. Run with `RUST_LOG=debug` to see the
//! `fit`/`lookup` tracing output.

use lsi::{Lsi, LsiConf};
use lsi_model::LinearModel;

fn main() {
    tracing_subscriber::fmt::init();

    let base: Vec<u64> = vec![40, 10, 30, 10, 20, 50, 10];

    let mut index: Lsi<u64, LinearModel> =
        Lsi::new(LsiConf::new().with_fingerprint_bits(8));
    index.fit(base.iter().copied());

    println!("index: {}", index.name());
    println!("byte_size: {}", index.byte_size());

    let mut hits: Vec<usize> = index.lookup::<false>(&base, 10).collect();
    hits.sort_unstable();
    println!("positions holding 10: {hits:?}");
    assert_eq!(hits, vec![1, 3, 6]);

    let mut it = index.lookup::<true>(&base, 25);
    let pos = it.next().expect("a key >= 25 exists");
    println!("first key >= 25 is at position {pos}, value {}", base[pos]);

    println!("base_data_accesses: {}", index.base_data_accesses());
    println!("false_positive_accesses: {}", index.false_positive_accesses());
}
