//! RNN: Learning a Fixed Sequence
//!
//! Run with: cargo run -p bptt-net --example rnn_sequence
//! Set `RUST_LOG=bptt_net=debug` to see every backward pass.
//!
//! This example demonstrates:
//! - Building an RNN layer from a config
//! - Unrolling over five steps with shared weights
//! - Backpropagation through time with clipping and Adagrad
//! - Reading the learned tensors back as JSON

use bptt_core::Vector;
use bptt_net::{RecurrentLayer, RnnConfig, RnnLayer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

fn column(values: &[f64]) -> Vec<Vector> {
    values.iter().map(|&v| Vector::from([v])).collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== RNN: Learning a Fixed Sequence ===\n");

    // -------------------------------------------------------------------------
    // 1. Layer
    // -------------------------------------------------------------------------
    println!("1. Layer");
    println!("--------");
    let config = RnnConfig::new(1, 10, 1, 5);
    println!("{}", serde_json::to_string_pretty(&config)?);
    let mut layer = RnnLayer::new(config, &mut StdRng::seed_from_u64(42))?;
    println!();

    // -------------------------------------------------------------------------
    // 2. Training
    // -------------------------------------------------------------------------
    println!("2. Training");
    println!("-----------");
    let batch = column(&[0.1, 0.2, 0.3, 0.4, 0.5]);
    let expected = column(&[0.1, 0.2, 0.3, 0.2, 0.1]);

    for iteration in 1..=1000 {
        layer.forward(&batch)?;
        let loss = layer.backward(&expected)?;
        if iteration % 200 == 0 {
            println!("  iteration {:4}: loss = {:.6}", iteration, loss.sum());
        }
    }
    println!();

    // -------------------------------------------------------------------------
    // 3. Result
    // -------------------------------------------------------------------------
    println!("3. Result");
    println!("---------");
    let outputs = layer.forward(&batch)?;
    for (t, (y, e)) in outputs.iter().zip(&expected).enumerate() {
        println!("  t={}: output {:+.4}  expected {:+.4}", t, y[0], e[0]);
    }
    println!();
    println!("Snapshot:\n{}", layer.snapshot().to_json()?);

    Ok(())
}
