use std::{env, error::Error, path::PathBuf, time::Instant};

use embed::{CancelFlag, EmbedConfig, EngineFactory, GenerationOptions};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let count: usize = env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(1_000);
    // Stop early after this many vectors to show cooperative cancellation.
    let stop_after: Option<usize> = env::args().nth(2).and_then(|arg| arg.parse().ok());

    let cfg = EmbedConfig {
        model_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("models")
            .join("all-MiniLM-L6-v2"),
        ..EmbedConfig::default()
    };
    let engine = EngineFactory::new().open(&cfg)?;

    let docs = (0..count).map(|i| format!("document number {i} about topic {}", i % 17));
    let cancel = CancelFlag::new();
    let mut stream = engine.generate_stream(docs, &GenerationOptions::default(), cancel.clone())?;
    println!("{count} documents in {} chunks", stream.total_chunks());

    let start = Instant::now();
    let mut ok = 0usize;
    let mut failed = 0usize;
    while let Some(item) = stream.next().await {
        match item {
            Ok(_) => ok += 1,
            Err(err) => {
                failed += 1;
                eprintln!("error: {err}");
            }
        }
        if stop_after == Some(ok) {
            cancel.cancel();
        }
    }

    println!(
        "embedded {ok}, failed {failed}, final state {:?} in {:?}",
        stream.state(),
        start.elapsed()
    );
    Ok(())
}
