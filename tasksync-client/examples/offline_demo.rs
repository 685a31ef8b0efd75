use clap::Parser;
use std::time::Duration;
use tasksync_client::{ClientConfig, TaskClient, TaskDraft, TaskFilter, TransportConfig};

#[derive(Parser)]
#[command(name = "offline-demo")]
#[command(about = "Create a task locally and watch it sync", long_about = None)]
struct Cli {
    /// Server base URL
    #[arg(short, long, default_value = "http://localhost:8080/v1")]
    server: String,

    /// Local store file
    #[arg(short, long, default_value = "demo_tasks.json")]
    database: String,

    /// Authentication token
    #[arg(short, long)]
    token: Option<String>,

    /// Task text to create
    #[arg(default_value = "Buy milk")]
    text: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tasksync_client=debug".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig {
        transport: TransportConfig {
            base_url: cli.server,
            api_key: cli.token,
            ..TransportConfig::default()
        },
        store_path: cli.database.into(),
        ..ClientConfig::default()
    };

    let client = TaskClient::new(config).await?;
    let mut events = client.subscribe();

    // The create returns as soon as the store is durable, reachable server
    // or not.
    let task = client.create_task(TaskDraft::new(cli.text)).await?;
    println!("created {} ({})", task.text, task.id);

    let status = client.status().await;
    println!(
        "online: {}, pending: {}",
        status.online, status.pending_count
    );

    if client.sync_and_wait(Duration::from_secs(10)).await {
        while let Ok(event) = events.try_recv() {
            println!("event: {event:?}");
        }
    } else {
        println!("server unreachable, the task will sync on reconnect");
    }

    for task in client.list_tasks(&TaskFilter::default()).await {
        let mark = if task.completed { "x" } else { " " };
        println!("[{mark}] {} ({})", task.text, task.id);
    }
    Ok(())
}
