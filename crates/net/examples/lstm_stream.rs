//! LSTM: Next-Step Prediction on a Stream
//!
//! Run with: cargo run -p bptt-net --example lstm_stream
//! Set `RUST_LOG=bptt_net=info` for periodic progress lines.
//!
//! This example demonstrates:
//! - Loading a network config from JSON
//! - Windowing a stream into (input, expected) pairs
//! - Predicting once the prediction window is full

use bptt_core::Vector;
use bptt_net::RecurrentNetworkConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"{
    "layer": {
        "kind": "lstm",
        "input_dim": 1,
        "hidden_dim": 12,
        "output_dim": 1,
        "unroll": 6,
        "rate": { "weights": 0.05, "biases": 0.05 }
    },
    "log_interval": 500
}"#;

fn wave(k: usize) -> Vector {
    Vector::from([0.5 * (0.25 * k as f64).sin()])
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== LSTM: Next-Step Prediction on a Stream ===\n");

    let config = RecurrentNetworkConfig::from_json(CONFIG)?;
    let mut net = config.build(&mut StdRng::seed_from_u64(7))?;

    println!("1. Training on 4000 samples");
    println!("---------------------------");
    let mut window = 0.0;
    for k in 0..4000 {
        let t = net.train(wave(k))?;
        window += t.loss.sum();
        if (k + 1) % 500 == 0 {
            println!("  sample {:4}: mean loss {:.5}", k + 1, window / 500.0);
            window = 0.0;
        }
    }
    println!();

    println!("2. Predicting");
    println!("-------------");
    for k in 4000..4016 {
        let y = net.predict(wave(k))?;
        println!("  x={:+.4}  next={:+.4}  predicted={:+.4}", wave(k)[0], wave(k + 1)[0], y[0]);
    }

    Ok(())
}
