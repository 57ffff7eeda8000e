//! End-to-end recovery tests: encode a block set, lose blocks, decode, and
//! compare every original payload by index.

use cauchy256::{decode, encode, init, Block, BlockMut, Params, VERSION};
use rand::seq::SliceRandom;
use rand::Rng;

/// Deterministic payloads so failures reproduce.
fn patterned_originals(original_count: usize, block_bytes: usize) -> Vec<Vec<u8>> {
    (0..original_count)
        .map(|i| {
            (0..block_bytes)
                .map(|j| ((i * 131 + j * 7 + 5) % 256) as u8)
                .collect()
        })
        .collect()
}

fn encode_pool(params: &Params, orig: &[Vec<u8>]) -> Vec<(u8, Vec<u8>)> {
    let blocks: Vec<Block> = orig
        .iter()
        .enumerate()
        .map(|(i, data)| Block::new(i as u8, data))
        .collect();
    let mut recovery = vec![0u8; params.recovery_count() * params.block_bytes()];
    encode(params, &blocks, &mut recovery).unwrap();

    let mut pool: Vec<(u8, Vec<u8>)> = orig
        .iter()
        .enumerate()
        .map(|(i, data)| (i as u8, data.clone()))
        .collect();
    for i in 0..params.recovery_count() {
        let start = i * params.block_bytes();
        pool.push((
            params.recovery_block_index(i),
            recovery[start..start + params.block_bytes()].to_vec(),
        ));
    }
    pool
}

/// Decode the given subset of the pool and check that every original payload
/// is present under its index, with received originals untouched.
fn assert_recovers(params: &Params, orig: &[Vec<u8>], subset: &mut [(u8, Vec<u8>)]) {
    let mut received: Vec<BlockMut> = subset
        .iter_mut()
        .map(|(index, data)| BlockMut::new(*index, data))
        .collect();
    decode(params, &mut received).unwrap();

    for (i, expected) in orig.iter().enumerate() {
        let block = received
            .iter()
            .find(|b| b.index == i as u8)
            .unwrap_or_else(|| panic!("original {i} missing after decode"));
        assert_eq!(&block.data[..], &expected[..], "original {i} corrupted");
    }
}

#[test]
fn exhaustive_small_parameters() {
    init(VERSION).unwrap();

    // Every (n, m) up to 9 total blocks, every n-subset of the pool. Block
    // size 13 keeps the word-at-a-time XOR tails in play.
    for n in 1..=5usize {
        for m in 1..=4usize {
            let total = n + m;
            if total > 9 {
                continue;
            }
            let params = Params::new(n, m, 13).unwrap();
            let orig = patterned_originals(n, 13);
            let pool = encode_pool(&params, &orig);

            for mask in 0u32..(1 << total) {
                if mask.count_ones() as usize != n {
                    continue;
                }
                let mut subset: Vec<(u8, Vec<u8>)> = (0..total)
                    .filter(|bit| mask & (1 << bit) != 0)
                    .map(|bit| pool[bit].clone())
                    .collect();
                assert_recovers(&params, &orig, &mut subset);
            }
        }
    }
}

#[test]
fn large_random_blocks() {
    // N=10, M=6, 64 KiB blocks, random data, six erasures.
    let mut rng = rand::thread_rng();
    let params = Params::new(10, 6, 65536).unwrap();
    let orig: Vec<Vec<u8>> = (0..10)
        .map(|_| (0..65536).map(|_| rng.gen()).collect())
        .collect();
    let pool = encode_pool(&params, &orig);

    // All six originals 0..6 erased, then a mixed pattern.
    let patterns: [&[usize]; 2] = [
        &[6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
        &[0, 2, 3, 5, 7, 8, 9, 11, 13, 14],
    ];
    for kept in patterns {
        let mut subset: Vec<(u8, Vec<u8>)> =
            kept.iter().map(|&bit| pool[bit].clone()).collect();
        assert_recovers(&params, &orig, &mut subset);
    }
}

#[test]
fn shuffled_pool_recovery() {
    // Take a random n-subset of the shuffled pool, several rounds.
    let mut rng = rand::thread_rng();
    let params = Params::new(20, 10, 64).unwrap();
    let orig = patterned_originals(20, 64);
    let pool = encode_pool(&params, &orig);

    for _ in 0..16 {
        let mut shuffled = pool.clone();
        shuffled.shuffle(&mut rng);
        shuffled.truncate(20);
        assert_recovers(&params, &orig, &mut shuffled);
    }
}

#[test]
fn max_field_capacity() {
    // N + M = 256, the largest legal geometry.
    let params = Params::new(200, 56, 16).unwrap();
    let orig = patterned_originals(200, 16);
    let pool = encode_pool(&params, &orig);

    // Drop the first 56 originals and decode from the remainder plus every
    // recovery block.
    let mut subset: Vec<(u8, Vec<u8>)> = (56..256).map(|bit| pool[bit].clone()).collect();
    assert_recovers(&params, &orig, &mut subset);
}
