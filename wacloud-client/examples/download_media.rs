//! Resolve and download a media object.
//!
//! ```sh
//! WA_ACCESS_TOKEN=... WA_APP_SECRET=... cargo run -p wacloud-client --features tracing --example download_media -- <media-id> <out-file>
//! ```

use std::time::Duration;

use anyhow::Context;
use wacloud_client::{Client, RetryPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let media_id = args.next().context("usage: download_media <media-id> <out-file>")?;
    let out = args.next().context("usage: download_media <media-id> <out-file>")?;

    let mut builder = Client::builder(wacloud_client::DEFAULT_BASE_URL)
        .access_token(std::env::var("WA_ACCESS_TOKEN").context("WA_ACCESS_TOKEN is not set")?)
        .timeout(Duration::from_secs(30));
    if let Ok(secret) = std::env::var("WA_APP_SECRET") {
        builder = builder.app_secret(secret).secure_requests(true);
    }
    let client = builder.build()?;

    let policy = RetryPolicy::attempts(4).base_delay(Duration::from_millis(250));
    let media = client.download_media(&media_id, &policy).await?;
    tokio::fs::write(&out, &media.data).await?;

    println!(
        "wrote {} bytes ({}) to {out}",
        media.data.len(),
        media.content_type.as_deref().unwrap_or(&media.info.mime_type)
    );
    Ok(())
}
