//! CLI entry point for wikigraph.

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use wikigraph_adapter::{parse_values, Adapter};
use wikigraph_core::{AdapterConfig, EntityId};

use wikigraph_cli::commands::{build_query, parse_assignments, select};
use wikigraph_cli::config::{load_schema, LoggingConfig};

#[derive(Parser)]
#[command(name = "wikigraph")]
#[command(about = "Relational models stored in a Wikibase graph")]
struct Cli {
    /// Config file prefix (default: wikigraph).
    #[arg(short, long, default_value = "wikigraph")]
    config: String,

    /// Model schema file.
    #[arg(short, long, default_value = "schema.toml")]
    schema: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct QueryArgs {
    /// Model to query.
    model: String,

    /// Filter such as `age>30`, `author.name=Ada`, `name in Ada,Alan`,
    /// `nickname is null`. Repeatable; all must hold.
    #[arg(short = 'w', long = "where")]
    filters: Vec<String>,

    /// Sort path; prefix with `-` for descending. Repeatable.
    #[arg(short, long)]
    order: Vec<String>,

    #[arg(long)]
    limit: Option<u64>,

    #[arg(long)]
    offset: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a query and print matching rows.
    Query(QueryArgs),

    /// Print the SPARQL a query translates to.
    Translate(QueryArgs),

    /// Count the rows matching a query's filters.
    Count(QueryArgs),

    /// List the models stored in this namespace with their type items.
    Models,

    /// Print one row by entity id.
    Get { model: String, id: String },

    /// Create a row from `field=value` assignments.
    Create {
        model: String,
        values: Vec<String>,

        /// Unique field to deduplicate on: return the existing row if one
        /// already holds the same value.
        #[arg(long)]
        key: Option<String>,
    },

    /// Update fields of a row. `field=null` removes a value.
    Update {
        model: String,
        id: String,
        values: Vec<String>,
    },

    /// Delete a row.
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging = LoggingConfig::load(&cli.config)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        fmt().with_env_filter(filter).json().with_writer(std::io::stderr).init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    let config = AdapterConfig::load(&cli.config)?;
    let schema = load_schema(&cli.schema)?;
    let adapter = Adapter::connect(config, schema).await?;

    let output = run(&adapter, cli.command).await;
    if let Err(e) = adapter.shutdown().await {
        tracing::warn!(error = %e, "Logout failed");
    }
    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}

async fn run(adapter: &Adapter, command: Command) -> anyhow::Result<serde_json::Value> {
    let schema = adapter.schema();
    let output = match command {
        Command::Query(args) => {
            let query = build_query(schema, &args.model, &args.filters, &args.order, args.limit, args.offset)?;
            select(adapter, &args.model, &query).await?
        }
        Command::Translate(args) => {
            let query = build_query(schema, &args.model, &args.filters, &args.order, args.limit, args.offset)?;
            serde_json::Value::String(adapter.translate(&args.model, &query).await?)
        }
        Command::Count(args) => {
            let query = build_query(schema, &args.model, &args.filters, &args.order, args.limit, args.offset)?;
            serde_json::json!({"model": args.model, "count": adapter.count(&args.model, &query).await?})
        }
        Command::Models => {
            let models = adapter.stored_models().await?;
            serde_json::Value::Array(
                models
                    .into_iter()
                    .map(|(model, item)| serde_json::json!({"model": model, "type_item": item.to_string()}))
                    .collect(),
            )
        }
        Command::Get { model, id } => match adapter.get(&model, &EntityId::new(id)).await? {
            Some(row) => row.to_json(),
            None => serde_json::Value::Null,
        },
        Command::Create { model, values, key } => {
            let values = parse_values(schema, &model, parse_assignments(&values)?)?;
            match key {
                Some(key) => {
                    let (id, created) = adapter.create_with_natural_key(&model, &values, &key).await?;
                    serde_json::json!({"id": id, "created": created})
                }
                None => {
                    let id = adapter.create(&model, &values).await?;
                    serde_json::json!({"id": id, "created": true})
                }
            }
        }
        Command::Update { model, id, values } => {
            let values = parse_values(schema, &model, parse_assignments(&values)?)?;
            let changed = adapter.update(&model, &EntityId::new(id.clone()), &values).await?;
            serde_json::json!({"id": id, "changed": changed})
        }
        Command::Delete { id } => {
            adapter.delete(&EntityId::new(id.clone())).await?;
            serde_json::json!({"id": id, "deleted": true})
        }
    };
    Ok(output)
}
