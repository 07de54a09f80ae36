//! workreg CLI — operator interface to a work-item registry.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use workreg::config::Config;
use workreg::model::{AgentKind, NewWorkItem, Status, WorkItemPatch};
use workreg::registry::Registry;
use workreg::store::FileStore;
use workreg::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "workreg", about = "Resilient work-item registry")]
struct Cli {
    /// Agent kind whose keyspace to operate on (pm, dev, qa, ta, ux)
    #[arg(long, default_value = "dev")]
    kind: AgentKind,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a work item
    Create {
        /// Item description
        description: String,
        /// Assignee
        #[arg(long)]
        assignee: Option<String>,
        /// Priority (higher = more urgent)
        #[arg(long)]
        priority: Option<i32>,
        /// Module context key (for assignee suggestions)
        #[arg(long)]
        module: Option<String>,
        /// Comma-separated dependency ids
        #[arg(long)]
        deps: Option<String>,
        /// Pre-fill unset fields from the hint engine
        #[arg(long)]
        hints: bool,
    },
    /// Show a work item
    Show { id: String },
    /// List all work items in the keyspace
    List,
    /// Apply a partial update to a work item
    Update {
        id: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        /// pending | in_progress | completed | blocked
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<i32>,
    },
    /// Delete a work item (idempotent)
    Delete { id: String },
    /// Resolve a conflict between two stored items
    Resolve { id_a: String, id_b: String },
    /// Suggest fields for a prospective item
    Suggest {
        description: String,
        #[arg(long)]
        module: Option<String>,
    },
    /// Record module maintainers (comma-separated owners)
    SetMaintainers { module: String, owners: String },
    /// Show failure-guard health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "workreg".to_string(),
    })?;

    let store = Arc::new(FileStore::open(&config.store_path).await?);
    let registry = Registry::new(cli.kind, store, config.registry);

    match cli.command {
        Command::Create {
            description,
            assignee,
            priority,
            module,
            deps,
            hints,
        } => {
            let mut new = NewWorkItem::new(description);
            if let Some(who) = assignee {
                new = new.assigned_to(who);
            }
            if let Some(p) = priority {
                new = new.priority(p);
            }
            if let Some(m) = module {
                new = new.context("module", serde_json::json!(m));
            }
            if let Some(deps) = deps {
                new = new.dependencies(deps.split(',').map(str::to_string).collect());
            }

            let id = if hints {
                registry.create_with_hints(new).await?
            } else {
                registry.create(new).await?
            };
            println!("Created: {id}");
        }
        Command::Show { id } => match registry.get(&id).await? {
            Some(item) => print_item(&item),
            None => println!("Not found: {id}"),
        },
        Command::List => {
            let items = registry.list().await?;
            if items.is_empty() {
                println!("No work items.");
                return Ok(());
            }
            println!(
                "{:<40}  {:<12}  {:<4}  DESCRIPTION",
                "ID", "STATUS", "PRI"
            );
            println!("{}", "-".repeat(100));
            for item in &items {
                let desc: String = item.description.chars().take(40).collect();
                println!(
                    "{:<40}  {:<12}  {:<4}  {}",
                    item.id, item.status, item.priority, desc
                );
            }
            println!("\n{} item(s)", items.len());
        }
        Command::Update {
            id,
            description,
            assignee,
            status,
            priority,
        } => {
            let mut patch = WorkItemPatch::default();
            if let Some(d) = description {
                patch = patch.description(d);
            }
            if let Some(a) = assignee {
                patch = patch.assigned_to(a);
            }
            if let Some(s) = status {
                patch = patch.status(parse_status(&s)?);
            }
            if let Some(p) = priority {
                patch = patch.priority(p);
            }
            let item = registry.update(&id, patch).await?;
            print_item(&item);
        }
        Command::Delete { id } => {
            registry.delete(&id).await?;
            println!("Deleted: {id}");
        }
        Command::Resolve { id_a, id_b } => {
            let a = registry
                .get(&id_a)
                .await?
                .ok_or_else(|| anyhow::anyhow!("not found: {id_a}"))?;
            let b = registry
                .get(&id_b)
                .await?
                .ok_or_else(|| anyhow::anyhow!("not found: {id_b}"))?;
            let resolution = registry.resolve_conflict(&a, &b);
            println!(
                "Winner: {} ({}, similarity {:.2})",
                resolution.winner.id,
                resolution.reason.as_str(),
                resolution.similarity
            );
        }
        Command::Suggest {
            description,
            module,
        } => {
            let mut context = serde_json::Map::new();
            if let Some(m) = module {
                context.insert("module".to_string(), serde_json::json!(m));
            }
            let s = registry.suggest_fields(&description, &context).await?;
            println!("Priority:     {}", s.priority);
            println!(
                "Assigned to:  {}",
                s.assigned_to.as_deref().unwrap_or("-")
            );
            println!(
                "Dependencies: {}",
                if s.dependencies.is_empty() {
                    "-".to_string()
                } else {
                    s.dependencies.join(", ")
                }
            );
        }
        Command::SetMaintainers { module, owners } => {
            registry.set_module_maintainers(&module, &owners).await?;
            println!("Maintainers for {module}: {owners}");
        }
        Command::Health => {
            let health = registry.guard_health();
            println!("Circuit:          {}", health.state);
            println!("Failure streak:   {}", health.consecutive_failures);
            println!("Free permits:     {}", health.available_permits);
        }
    }

    Ok(())
}

fn parse_status(s: &str) -> anyhow::Result<Status> {
    match s {
        "pending" => Ok(Status::Pending),
        "in_progress" => Ok(Status::InProgress),
        "completed" => Ok(Status::Completed),
        "blocked" => Ok(Status::Blocked),
        _ => anyhow::bail!("invalid status: {s}"),
    }
}

fn print_item(item: &workreg::model::WorkItem) {
    println!("ID:           {}", item.id);
    println!("Description:  {}", item.description);
    println!("Status:       {}", item.status);
    println!("Priority:     {}", item.priority);
    println!(
        "Assigned to:  {}",
        item.assigned_to.as_deref().unwrap_or("-")
    );
    if !item.dependencies.is_empty() {
        println!("Dependencies: {}", item.dependencies.join(", "));
    }
    if !item.context.is_empty() {
        println!(
            "Context:      {}",
            serde_json::to_string(&item.context).unwrap_or_default()
        );
    }
    println!("Created:      {}", item.created_at);
    println!("Updated:      {}", item.updated_at);
}
