use clap::Parser;
use tracing_subscriber::EnvFilter;
use wranglebot_client_rs::error::Result;
use wranglebot_client_rs::query::Filters;
use wranglebot_client_rs::{Config, ConnectOptions, WrangleBot};

/// Simple program to test the WrangleBot client: sign in, connect and watch a job.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The URL of the WrangleBot server (e.g., http://localhost:3200)
    #[arg(short, long)]
    url: String,

    /// The username to sign in with
    #[arg(short = 'n', long)]
    username: String,

    /// The password to sign in with
    #[arg(short, long)]
    password: String,

    /// Library to list tasks of once connected
    #[arg(short, long)]
    library: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    let client = WrangleBot::new(Config::new(&args.url))?;
    client.on(|event| println!("Event: {}", event));

    let token = client.sign_in(&args.username, &args.password).await?;
    println!("Signed in, token has {} characters.", token.len());

    client.connect(ConnectOptions::with_token(token)).await?;
    if let Some(user) = client.user().await {
        println!("Connected as {} ({}).", user.username(), user.short_code());
    }

    client
        .subscribe("transcode", "demo", |data| {
            println!("Transcode progress: {}", data);
        })
        .await?;

    match &args.library {
        Some(library) => {
            let tasks = client
                .query()
                .library()
                .one(library)
                .tasks()
                .many(Filters::default())
                .fetch()
                .await?;
            println!("Tasks of {}: {:#}", library, tasks);
        }
        None => {
            let libraries = client.query().library().many(Filters::default()).fetch().await?;
            println!("Libraries: {:#}", libraries);
        }
    }

    // Wait some time for pushes to arrive.
    tokio::time::sleep(std::time::Duration::from_secs(10)).await;

    client.disconnect().await;
    Ok(())
}
