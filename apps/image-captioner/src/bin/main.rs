use analytics_tracing::init_tracing_to_stderr;
use image_captioner::{run, CaptionConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing_to_stderr(); // loads .env first so RUST_LOG from it applies

    let caption = run(CaptionConfig::default()).await?;
    println!("{caption}");

    Ok(())
}
