//! `cm`: command-line client for the company manager API.
//!
//! # Usage
//!
//! ```
//! cm --url http://localhost:5000 companies list
//! cm customers add --name Wile --email wile@example.com --company Acme
//! cm employees query 'LastName.StartsWith("Mc")'
//! ```

mod client;

use std::{fmt::Display, path::PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use client::{ApiClient, Remote};
use cm_core::{entity, identity::hydrate, model};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "cm", about = "Command-line client for the company manager API")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the server (default: http://localhost:5000).
  #[arg(long, env = "CM_URL")]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Companies and their customers.
  #[command(subcommand)]
  Companies(CompanyCommand),
  #[command(subcommand)]
  Customers(CustomerCommand),
  #[command(subcommand)]
  Employees(EmployeeCommand),
}

#[derive(Subcommand, Debug)]
enum CompanyCommand {
  List,
  /// Filter with a predicate, e.g. `Name.StartsWith("A")`.
  Query { predicate: String },
  Get { id: i64 },
  Add {
    #[arg(long)]
    name:        String,
    #[arg(long)]
    address:     Option<String>,
    #[arg(long)]
    description: Option<String>,
  },
  /// Delete the company with this exact name.
  Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum CustomerCommand {
  List,
  Query { predicate: String },
  Get { id: i64 },
  Add {
    #[arg(long)]
    name:    String,
    #[arg(long)]
    email:   String,
    /// Name of the owning company.
    #[arg(long)]
    company: String,
  },
  Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum EmployeeCommand {
  List,
  Query { predicate: String },
  Get { id: i64 },
  Add {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name:  String,
    #[arg(long)]
    email:      String,
    /// Name of the employing company.
    #[arg(long)]
    company:    String,
  },
  Delete { id: i64 },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let base_url = args
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| "http://localhost:5000".to_string());

  let client = ApiClient::new(base_url)?;
  match args.command {
    Command::Companies(cmd) => companies(&client, cmd).await,
    Command::Customers(cmd) => customers(&client, cmd).await,
    Command::Employees(cmd) => employees(&client, cmd).await,
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn companies(client: &ApiClient, cmd: CompanyCommand) -> Result<()> {
  match cmd {
    CompanyCommand::List => print_companies(&client.list::<model::Company>().await?),
    CompanyCommand::Query { predicate } => {
      print_companies(&client.query::<model::Company>(&predicate).await?)
    }
    CompanyCommand::Get { id } => print_companies(&[client.get::<model::Company>(id).await?]),
    CompanyCommand::Add { name, address, description } => {
      let created = client
        .create(&model::Company { name, address, description, ..Default::default() })
        .await?;
      println!("Added company #{}", created.id);
    }
    CompanyCommand::Delete { name } => {
      let id = company_id(client, &name).await?;
      client.delete::<model::Company>(id).await?;
      println!("Deleted company #{id}");
    }
  }
  Ok(())
}

async fn customers(client: &ApiClient, cmd: CustomerCommand) -> Result<()> {
  match cmd {
    CustomerCommand::List => {
      print_all::<_, entity::Customer>(&client.list::<model::Customer>().await?)
    }
    CustomerCommand::Query { predicate } => {
      print_all::<_, entity::Customer>(&client.query::<model::Customer>(&predicate).await?)
    }
    CustomerCommand::Get { id } => {
      print_all::<_, entity::Customer>(&[client.get::<model::Customer>(id).await?])
    }
    CustomerCommand::Add { name, email, company } => {
      let company_id = company_id(client, &company).await?;
      let created = client
        .create(&model::Customer { company_id, name, email, ..Default::default() })
        .await?;
      println!("Added customer #{}", created.id);
    }
    CustomerCommand::Delete { id } => {
      client.delete::<model::Customer>(id).await?;
      println!("Deleted customer #{id}");
    }
  }
  Ok(())
}

async fn employees(client: &ApiClient, cmd: EmployeeCommand) -> Result<()> {
  match cmd {
    EmployeeCommand::List => {
      print_all::<_, entity::Employee>(&client.list::<model::Employee>().await?)
    }
    EmployeeCommand::Query { predicate } => {
      print_all::<_, entity::Employee>(&client.query::<model::Employee>(&predicate).await?)
    }
    EmployeeCommand::Get { id } => {
      print_all::<_, entity::Employee>(&[client.get::<model::Employee>(id).await?])
    }
    EmployeeCommand::Add { first_name, last_name, email, company } => {
      let company_id = company_id(client, &company).await?;
      let created = client
        .create(&model::Employee {
          company_id,
          first_name,
          last_name,
          email,
          ..Default::default()
        })
        .await?;
      println!("Added employee #{}", created.id);
    }
    EmployeeCommand::Delete { id } => {
      client.delete::<model::Employee>(id).await?;
      println!("Deleted employee #{id}");
    }
  }
  Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Look up a company id by exact name.
async fn company_id(client: &ApiClient, name: &str) -> Result<i64> {
  let predicate = format!("Name == {}", quote(name));
  let found: Vec<model::Company> = client.query(&predicate).await?;
  match found.first() {
    Some(company) => Ok(company.id),
    None => bail!("no company named {name:?}"),
  }
}

/// Render `text` as a predicate string literal.
fn quote(text: &str) -> String {
  format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn print_companies(companies: &[model::Company]) {
  for company in companies {
    println!("{}", hydrate::<entity::Company, _>(company));
    for customer in &company.customers {
      println!("  {}", hydrate::<entity::Customer, _>(customer));
    }
  }
}

/// Print each model through its entity's `Display`.
fn print_all<M, E>(models: &[M])
where
  M: Remote,
  E: Display + Default + cm_core::identity::CopyFrom<M>,
{
  if models.is_empty() {
    println!("No {} found.", M::ROUTE.to_lowercase());
  }
  for model in models {
    println!("{}", hydrate::<E, _>(model));
  }
}
