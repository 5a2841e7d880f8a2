use std::{env, error::Error, path::PathBuf};

use embed::{CancelFlag, EmbedConfig, EngineFactory, GenerationOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut texts: Vec<String> = env::args().skip(1).collect();
    if texts.is_empty() {
        texts = vec!["hello world".into(), "goodbye".into()];
    }

    let cfg = match env::var_os("EMBED_CONFIG") {
        Some(path) => EmbedConfig::from_file(path)?,
        None => EmbedConfig {
            model_dir: default_model_dir(),
            ..EmbedConfig::default()
        },
    };

    let engine = EngineFactory::new().open(&cfg)?;
    let meta = engine.metadata();
    println!(
        "provider: {} model: {} dim: {}",
        meta.provider_name, meta.model_id, meta.dimensions
    );

    let vectors = engine
        .generate(texts, &GenerationOptions::default(), &CancelFlag::new())
        .await?;

    for v in &vectors {
        println!(
            "{:?} -> norm {:.4}, first values {:?}",
            v.text(),
            v.norm(),
            &v.as_slice()[..v.dim().min(6)]
        );
    }
    if vectors.len() >= 2 {
        println!("cosine(0, 1) = {:.4}", vectors[0].dot(&vectors[1]));
    }

    engine.dispose();
    Ok(())
}

fn default_model_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("models")
        .join("all-MiniLM-L6-v2")
}
