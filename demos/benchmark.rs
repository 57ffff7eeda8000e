//! Encode/decode throughput measurement: 100 originals + 30 recoveries at
//! 1296 bytes per block, the classic packet-FEC shape.

use cauchy256::{decode, encode, Block, BlockMut, Params};
use std::time::Instant;

fn main() {
    let block_bytes = 1296;
    let original_count = 100;
    let recovery_count = 30;
    let trials = 1000;

    let params = Params::new(original_count, recovery_count, block_bytes).unwrap();
    let data_size = original_count * block_bytes;

    let orig: Vec<Vec<u8>> = (0..original_count)
        .map(|i| {
            (0..block_bytes)
                .map(|j| ((i * block_bytes + j) % 256) as u8)
                .collect()
        })
        .collect();

    // Encode benchmark
    let mut recovery = vec![0u8; recovery_count * block_bytes];
    let start = Instant::now();
    for _ in 0..trials {
        let blocks: Vec<Block> = orig
            .iter()
            .enumerate()
            .map(|(i, data)| Block::new(i as u8, data))
            .collect();
        encode(&params, &blocks, &mut recovery).unwrap();
    }
    let encode_us = start.elapsed().as_micros() as f64 / trials as f64;
    println!(
        "encode: {:.1} us per call, {:.0} MB/s",
        encode_us,
        data_size as f64 / encode_us
    );

    // Decode benchmark: the worst case, all 30 recovery blocks in use.
    let start = Instant::now();
    for _ in 0..trials {
        let mut payloads: Vec<(u8, Vec<u8>)> = Vec::with_capacity(original_count);
        for i in 0..recovery_count {
            let begin = i * block_bytes;
            payloads.push((
                params.recovery_block_index(i),
                recovery[begin..begin + block_bytes].to_vec(),
            ));
        }
        for i in recovery_count..original_count {
            payloads.push((i as u8, orig[i].clone()));
        }

        let mut blocks: Vec<BlockMut> = payloads
            .iter_mut()
            .map(|(index, data)| BlockMut::new(*index, data))
            .collect();
        decode(&params, &mut blocks).unwrap();
    }
    let decode_us = start.elapsed().as_micros() as f64 / trials as f64;
    println!(
        "decode ({} erasures): {:.1} us per call, {:.0} MB/s",
        recovery_count,
        decode_us,
        data_size as f64 / decode_us
    );
}
