//! Concrete end-to-end scenarios, run with a fixed RNG seed for
//! reproducibility.

use lsi::{Lsi, LsiConf};
use lsi_model::LinearModel;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

const SEED: u64 = 42;

fn rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(SEED)
}

/// S1 — sequential keys, shuffled, every equality lookup resolves back to
/// its original position.
#[test]
fn s1_sequential_shuffled() {
    let mut rng = rng();
    let mut base: Vec<u64> = (20000..20000 + 100_000u64).collect();
    base.shuffle(&mut rng);

    let mut lsi: Lsi<u64, LinearModel> = Lsi::new(LsiConf::new());
    lsi.fit(base.iter().copied());

    for &key in base.iter() {
        let mut it = lsi.lookup::<false>(&base, key);
        let pos = it.next().expect("every key in base must be found");
        assert_eq!(base[pos], key);
    }
}

/// S2 — duplicates: each key `i*i` appears a random (seeded) number of
/// times; equality lookups must enumerate exactly that many positions.
#[test]
fn s2_duplicates() {
    let mut rng = rng();
    let mut base: Vec<u64> = Vec::new();
    let mut counts = std::collections::HashMap::new();
    for i in 0..2000u64 {
        let key = i * i;
        let count = rng.gen_range(0..10) + 1;
        counts.insert(key, count);
        for _ in 0..count {
            base.push(key);
        }
    }
    base.shuffle(&mut rng);

    let mut lsi: Lsi<u64, LinearModel> = Lsi::new(LsiConf::new());
    lsi.fit(base.iter().copied());

    for (&key, &expected_count) in counts.iter() {
        let positions: Vec<usize> = lsi.lookup::<false>(&base, key).collect();
        assert_eq!(positions.len(), expected_count, "key {key}");
        for p in &positions {
            assert_eq!(base[*p], key);
        }
    }
}

/// S3 — lower-bound with holes: fit on the first 90% of a shuffled key
/// range, then query held-out keys.
#[test]
fn s3_lower_bound_with_holes() {
    let mut rng = rng();
    let mut all_keys: Vec<u64> = (20000..120000u64).collect();
    all_keys.shuffle(&mut rng);

    let split = all_keys.len() * 9 / 10;
    let (trained, held_out) = all_keys.split_at(split);
    let base: Vec<u64> = trained.to_vec();

    let mut lsi: Lsi<u64, LinearModel> = Lsi::new(LsiConf::new());
    lsi.fit(base.iter().copied());

    let max_trained_key = *base.iter().max().unwrap();

    for &key in held_out.iter().take(2000) {
        let mut it = lsi.lookup::<true>(&base, key);
        if key <= max_trained_key {
            let pos = it.next();
            if let Some(pos) = pos {
                assert!(base[pos] >= key);
            }
        } else {
            assert!(it.is_end());
        }
    }
}

/// S4 — fingerprint widths: equality lookups remain correct for several
/// fingerprint widths, and filtered-candidate pressure should not increase
/// as the fingerprint gets wider.
#[test]
fn s4_fingerprint_widths() {
    let mut rng = rng();
    let mut base: Vec<u64> = (20000..20000 + 20_000u64).collect();
    base.shuffle(&mut rng);

    let mut prev_false_positives = u64::MAX;
    for &f in &[4u8, 8, 16] {
        let mut lsi: Lsi<u64, LinearModel> =
            Lsi::new(LsiConf::new().with_fingerprint_bits(f));
        lsi.fit(base.iter().copied());

        for &key in base.iter().step_by(97) {
            let mut it = lsi.lookup::<false>(&base, key);
            let pos = it.next().expect("key must be found");
            assert_eq!(base[pos], key);
        }

        let fps = lsi.false_positive_accesses();
        assert!(fps <= prev_false_positives, "f={f} fps={fps} prev={prev_false_positives}");
        prev_false_positives = fps;
    }
}

/// S5 — linear vs. binary equivalence: identical results under forced-linear
/// and binary search modes over the same data and queries.
#[test]
fn s5_linear_vs_binary_equivalence() {
    let mut rng = rng();
    let mut base: Vec<u64> = (0..50_000u64).map(|_| rng.gen_range(0..100_000)).collect();
    base.sort_unstable();
    base.shuffle(&mut rng);

    let mut binary: Lsi<u64, LinearModel> = Lsi::new(LsiConf::new());
    binary.fit(base.iter().copied());

    let mut linear: Lsi<u64, LinearModel> = Lsi::new(LsiConf::new().with_forced_linear(true));
    linear.fit(base.iter().copied());

    for &key in base.iter().step_by(211) {
        let eq_binary: Vec<usize> = binary.lookup::<false>(&base, key).collect();
        let eq_linear: Vec<usize> = linear.lookup::<false>(&base, key).collect();
        assert_eq!(eq_binary, eq_linear, "equality mismatch for key {key}");

        let mut lb_binary = binary.lookup::<true>(&base, key);
        let mut lb_linear = linear.lookup::<true>(&base, key);
        assert_eq!(lb_binary.next(), lb_linear.next(), "lower-bound mismatch for key {key}");
    }
}

/// S6 — PermVector width sweep: random-access and iterator access agree
/// with the source vector, for every width from 1 to 64 and several sizes.
#[test]
fn s6_permvector_width_sweep() {
    use lsi::PermVector;

    let mut rng = rng();
    for width in 1u8..=64 {
        for &n in &[0usize, 10, 1000, 100_000] {
            // keys drawn from [0, 2^(w-1)); PermVector derives its own width
            // from the data, which may end up narrower than `width` for
            // small samples - this checks read-after-write agreement, not
            // the exact width chosen.
            let upper_exclusive: u64 = 1u64 << (width - 1);
            let positions: Vec<u64> = (0..n).map(|_| rng.gen_range(0..upper_exclusive)).collect();
            let pv = PermVector::build(&positions, None);
            assert_eq!(pv.len(), n);
            for (i, &expected) in positions.iter().enumerate() {
                assert_eq!(pv.position(i), expected, "width={width} n={n} i={i}");
            }
            let via_iter: Vec<u64> = pv.iter().map(|(p, _)| p).collect();
            assert_eq!(via_iter, positions, "width={width} n={n}");
        }
    }
}
