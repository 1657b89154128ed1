use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use shardha_config::{Config, Properties, Role};
use tokio::net::TcpListener;
use tracing::info;

use crate::backend::memory::{serve, MemoryNode};
use crate::{Error, HaClient, Outcome};

/// shardha is a high-availability client over two sharded Redis clusters.
#[derive(Parser, Debug)]
#[command(name = "shardha", version)]
pub struct Cli {
    /// Path to the configuration file. Default: "shardha.toml"
    #[arg(short, long, default_value = "shardha.toml")]
    pub config: PathBuf,
    /// Properties file with `primary.` and `secondary.` keys, used
    /// instead of the TOML file.
    #[arg(short, long)]
    pub properties: Option<PathBuf>,
    /// Subcommand.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Check configuration for errors.
    Configcheck,

    /// Append values to a list.
    Rpush {
        key: String,
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Prepend values to a list.
    Lpush {
        key: String,
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Pop the head of a list.
    Lpop { key: String },

    /// Pop the tail of a list.
    Rpop { key: String },

    /// Pop the head of a list, waiting for an element.
    Blpop {
        key: String,
        /// Seconds to wait.
        #[arg(short, long, default_value_t = 1)]
        timeout: u64,
    },

    /// Remove occurrences of a value from a list.
    Lrem {
        key: String,
        count: i64,
        value: String,
    },

    /// Print list elements.
    Lrange {
        key: String,
        #[arg(default_value_t = 0, allow_negative_numbers = true)]
        start: i64,
        #[arg(default_value_t = -1, allow_negative_numbers = true)]
        stop: i64,
        /// Read the secondary cluster.
        #[arg(short, long)]
        secondary: bool,
    },

    /// Print list length.
    Llen {
        key: String,
        /// Read the secondary cluster.
        #[arg(short, long)]
        secondary: bool,
    },

    /// Print connection pool state for every node as JSON.
    State,

    /// Serve an in-memory node, for local testing.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 6379)]
        port: u16,
    },
}

/// Load config from the properties file if given, TOML otherwise.
pub fn config(args: &Cli) -> Result<Config, Error> {
    let config = match args.properties {
        Some(ref path) => Config::from_properties(&Properties::load(path)?)?,
        None => Config::load(&args.config)?,
    };
    Ok(config)
}

/// Run a subcommand.
pub async fn run(args: Cli) -> Result<(), Error> {
    if let Commands::Serve { ref host, port } = args.command {
        let listener = TcpListener::bind((host.as_str(), port)).await?;
        info!("serving in-memory node on {}:{}", host, port);
        return serve(listener, MemoryNode::default()).await;
    }

    let config = config(&args)?;

    if let Commands::Configcheck = args.command {
        info!("configuration is valid");
        return Ok(());
    }

    let ha = HaClient::connect(&config).await?;
    let role = |secondary: bool| {
        if secondary {
            Role::Secondary
        } else {
            Role::Primary
        }
    };

    match args.command {
        Commands::Rpush { key, values } => println!("{}", ha.rpush_many(key, &values).await?),
        Commands::Lpush { key, values } => println!("{}", ha.lpush_many(key, &values).await?),
        Commands::Lpop { key } => print_value(ha.lpop(key).await),
        Commands::Rpop { key } => print_value(ha.rpop(key).await),
        Commands::Blpop { key, timeout } => {
            print_value(ha.blpop(key, Duration::from_secs(timeout)).await)
        }
        Commands::Lrem { key, count, value } => println!("{}", ha.lrem(key, count, value).await?),
        Commands::Lrange {
            key,
            start,
            stop,
            secondary,
        } => {
            let values = ha
                .client(role(secondary))
                .lrange(key, start, stop)
                .await
                .into_result()?;
            for value in values.unwrap_or_default() {
                print_value(Some(value));
            }
        }
        Commands::Llen { key, secondary } => match ha.client(role(secondary)).llen(key).await {
            Outcome::Value(len) => println!("{}", len),
            Outcome::Empty => println!("0"),
            Outcome::Failed(err) => return Err(err),
        },
        Commands::State => {
            let state = serde_json::json!({
                "primary": ha.primary().state(),
                "secondary": ha.secondary().state(),
            });
            let state =
                serde_json::to_string_pretty(&state).map_err(|err| Error::Codec(err.to_string()))?;
            println!("{}", state);
        }
        Commands::Configcheck | Commands::Serve { .. } => (),
    }

    ha.shutdown();

    Ok(())
}

fn print_value(value: Option<Bytes>) {
    match value {
        Some(value) => println!("{}", String::from_utf8_lossy(&value)),
        None => println!("(nil)"),
    }
}
