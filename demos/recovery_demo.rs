//! Encode a block pool, lose random blocks, and recover the originals.
//!
//! Run with:
//!
//! ```text
//! cargo run --example recovery_demo -- --originals 12 --recoveries 4
//! ```

use anyhow::{bail, Context, Result};
use cauchy256::{decode, encode, init, Block, BlockMut, Params, VERSION};
use clap::Parser;
use rand::seq::SliceRandom;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(about = "Cauchy MDS erasure coding: lossy-pool recovery walkthrough")]
struct Args {
    /// Number of original data blocks
    #[arg(long, default_value_t = 12)]
    originals: usize,

    /// Number of recovery blocks
    #[arg(long, default_value_t = 4)]
    recoveries: usize,

    /// Bytes per block
    #[arg(long, default_value_t = 1200)]
    block_bytes: usize,

    /// Rounds of shuffle-drop-recover to run
    #[arg(long, default_value_t = 5)]
    rounds: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
    let args = Args::parse();

    init(VERSION).context("library version handshake failed")?;
    let params = Params::new(args.originals, args.recoveries, args.block_bytes)
        .context("invalid encoder parameters")?;

    // Original data: a recognizable per-block byte pattern.
    let orig: Vec<Vec<u8>> = (0..args.originals)
        .map(|i| {
            (0..args.block_bytes)
                .map(|j| ((i * 251 + j) % 256) as u8)
                .collect()
        })
        .collect();

    let blocks: Vec<Block> = orig
        .iter()
        .enumerate()
        .map(|(i, data)| Block::new(i as u8, data))
        .collect();
    let mut recovery = vec![0u8; args.recoveries * args.block_bytes];
    encode(&params, &blocks, &mut recovery).context("encode failed")?;
    info!(
        originals = args.originals,
        recoveries = args.recoveries,
        block_bytes = args.block_bytes,
        "encoded block pool"
    );

    // Everything that could arrive over the wire: originals plus recoveries.
    let mut pool: Vec<(u8, Vec<u8>)> = orig
        .iter()
        .enumerate()
        .map(|(i, data)| (i as u8, data.clone()))
        .collect();
    for i in 0..args.recoveries {
        let start = i * args.block_bytes;
        pool.push((
            params.recovery_block_index(i),
            recovery[start..start + args.block_bytes].to_vec(),
        ));
    }

    let mut rng = rand::thread_rng();
    for round in 0..args.rounds {
        // The channel loses `recoveries` blocks at random; whatever arrives
        // first fills the decode set.
        let mut arrived = pool.clone();
        arrived.shuffle(&mut rng);
        arrived.truncate(args.originals);

        let lost_originals = (0..args.originals as u8)
            .filter(|i| arrived.iter().all(|(index, _)| index != i))
            .count();

        let mut received: Vec<BlockMut> = arrived
            .iter_mut()
            .map(|(index, data)| BlockMut::new(*index, data))
            .collect();
        decode(&params, &mut received).context("decode failed")?;

        for (i, expected) in orig.iter().enumerate() {
            let Some(block) = received.iter().find(|b| b.index == i as u8) else {
                bail!("round {round}: original {i} missing after decode");
            };
            if &block.data[..] != &expected[..] {
                bail!("round {round}: original {i} corrupted after decode");
            }
        }
        info!(round, lost_originals, "all originals verified");
    }

    info!("done");
    Ok(())
}
