use anyhow::Result;
use serde::{Deserialize, Serialize};

use stinger::{JobOpts, Queue, Worker, WorkerOpts};

#[derive(Debug, Serialize, Deserialize)]
struct ProcessorData {
    name: String,
    age: u8,
}

fn test_processor(data: ProcessorData) -> Result<String, String> {
    println!("Processing: {:?}", data);

    Ok("Done".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stinger=debug".into()),
        )
        .init();

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());

    let queue = Queue::new("new-queue", &redis_url).await?;
    queue
        .add(
            "greet",
            &ProcessorData {
                name: "Ada".to_string(),
                age: 36,
            },
            &JobOpts::default(),
        )
        .await?;

    let mut worker = Worker::new(
        "new-queue",
        &redis_url,
        WorkerOpts::default(),
        test_processor,
    )
    .await?;

    worker.run().await?;

    Ok(())
}
