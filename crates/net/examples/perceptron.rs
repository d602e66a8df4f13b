//! Perceptrons: A Two-Layer Feed-Forward Network
//!
//! Run with: cargo run -p bptt-net --example perceptron
//!
//! This example demonstrates:
//! - Building dense layers of perceptron cells
//! - Training with a per-output loss
//! - Tracing snapshots of every weight tensor

use bptt_core::{Init, Vector};
use bptt_diff::{ActivationKind, LearningModule, LearningRate, Loss};
use bptt_net::{DenseLayer, Network};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Perceptrons: A Two-Layer Network ===\n");

    let mut rng = StdRng::seed_from_u64(4);
    let module = LearningModule::new(ActivationKind::Sigmoid, LearningRate::uniform(0.5));
    let weights = Init::Uniform { min: -1.0, max: 1.0 };
    let biases = Init::Constant(0.0);

    let mut net = Network::new(Loss::Squared)
        .with_layer(DenseLayer::perceptrons(0, 2, 4, module, &weights, &biases, &mut rng)?)?
        .with_layer(DenseLayer::perceptrons(1, 4, 1, module, &weights, &biases, &mut rng)?)?
        .with_log_interval(1000);

    // logical OR
    let data = [
        (Vector::from([0.0, 0.0]), Vector::from([0.0])),
        (Vector::from([0.0, 1.0]), Vector::from([1.0])),
        (Vector::from([1.0, 0.0]), Vector::from([1.0])),
        (Vector::from([1.0, 1.0]), Vector::from([1.0])),
    ];

    for epoch in 1..=2000 {
        let mut total = 0.0;
        for (x, e) in &data {
            total += net.train(x, e)?.loss.sum();
        }
        if epoch % 400 == 0 {
            println!("  epoch {:4}: loss = {:.6}", epoch, total);
        }
    }
    println!();

    for (x, e) in &data {
        let y = net.predict(x)?;
        println!("  {:?} -> {:.4} (expected {})", x.as_slice(), y[0], e[0]);
    }
    println!();
    println!("Snapshot:\n{}", net.snapshot().to_json()?);

    Ok(())
}
