use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};

use haulsign::documents::Accessorial;
use haulsign::lifecycle::LifecycleService;
use haulsign::{
    init_telemetry, open_store, ActionRequest, Charges, Document, DocumentAction, DocumentId,
    DocumentStore, HaulsignConfig, LifecycleError, NewDocument, SignaturePad, SignerRole,
    Transition,
};

#[derive(Parser)]
#[command(name = "haulsign")]
#[command(about = "Signature capture and status lifecycle for rate confirmations and bills of lading")]
struct Cli {
    /// Print documents and results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    /// Rate confirmation
    Rc,
    /// Bill of lading
    Bol,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new document in its initial status
    Create {
        #[arg(value_enum)]
        kind: KindArg,
        /// Explicit document id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Base rate in cents
        #[arg(long, default_value = "0")]
        rate_cents: u64,
        /// Quantity the base rate applies to
        #[arg(long, default_value = "1")]
        quantity: u32,
        /// Accessorial charge as KIND=CENTS, e.g. detention=7500
        #[arg(long = "accessorial")]
        accessorials: Vec<String>,
    },
    /// Send a draft rate confirmation to the customer
    Send {
        id: String,
        #[arg(long)]
        expected_version: Option<u64>,
    },
    /// Capture a signature and apply the matching signing action
    Sign {
        id: String,
        /// customer, carrier, shipper or driver
        #[arg(long)]
        role: SignerRole,
        /// Typed signer name
        #[arg(long, default_value = "")]
        name: String,
        /// Stroke path as space separated "x,y" points (repeatable)
        #[arg(long = "stroke")]
        strokes: Vec<String>,
        #[arg(long)]
        expected_version: Option<u64>,
    },
    /// Accept a signed rate confirmation
    Accept {
        id: String,
        #[arg(long)]
        expected_version: Option<u64>,
    },
    /// Show one document and the actions it currently allows
    Show { id: String },
    /// List every stored document
    List,
    /// Show the audit trail of a document
    History { id: String },
    /// Replace the charges of a document that has not left its initial status
    Revise {
        id: String,
        #[arg(long)]
        rate_cents: u64,
        #[arg(long, default_value = "1")]
        quantity: u32,
        #[arg(long = "accessorial")]
        accessorials: Vec<String>,
        #[arg(long)]
        expected_version: Option<u64>,
    },
    /// Print the effective configuration as TOML
    ConfigShow,
}

type Service = LifecycleService<dyn DocumentStore>;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = haulsign::config()?;
    init_telemetry(&config.observability)?;

    let result = tokio::runtime::Runtime::new()?.block_on(async {
        let store = open_store(&config.store).await?;
        let service: Service = LifecycleService::from_config(store, &config.lifecycle);
        run(cli, config, &service).await
    });

    #[cfg(feature = "observability")]
    haulsign::lifecycle_metrics().log_stats();

    result
}

async fn run(cli: Cli, config: &HaulsignConfig, service: &Service) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Create {
            kind,
            id,
            rate_cents,
            quantity,
            accessorials,
        } => {
            let charges = parse_charges(rate_cents, quantity, &accessorials)?;
            let mut new = match kind {
                KindArg::Rc => NewDocument::rate_confirmation(charges),
                KindArg::Bol => NewDocument::bill_of_lading(charges),
            };
            if let Some(id) = id {
                new = new.with_id(DocumentId::parse(&id)?);
            }
            let document = service.create(new).await.map_err(present)?;
            print_document(&document, json)
        }
        Commands::Send {
            id,
            expected_version,
        } => {
            let request = request(&id, DocumentAction::Send, expected_version)?;
            let transition = submit(service, request).await?;
            print_transition(&transition, json)
        }
        Commands::Sign {
            id,
            role,
            name,
            strokes,
            expected_version,
        } => {
            let mut pad = SignaturePad::from_config(&config.signature)?;
            pad.set_name(name);
            for stroke in &strokes {
                pad.add_stroke(stroke.parse()?);
            }
            let signature = pad.submit(role).map_err(|e| present(e.into()))?;
            let request = request(&id, DocumentAction::for_role(role), expected_version)?
                .with_signature(signature);
            let transition = submit(service, request).await?;
            print_transition(&transition, json)
        }
        Commands::Accept {
            id,
            expected_version,
        } => {
            let request = request(&id, DocumentAction::Accept, expected_version)?;
            let transition = submit(service, request).await?;
            print_transition(&transition, json)
        }
        Commands::Show { id } => {
            let document = service.get(&DocumentId::parse(&id)?).await.map_err(present)?;
            print_document(&document, json)?;
            if !json {
                let signatures = [document.counterparty_signature(), document.owner_signature()];
                for signature in signatures.into_iter().flatten() {
                    println!("  {}", signature.audit_line());
                }
                let allowed: Vec<String> = service
                    .controller()
                    .allowed_actions(&document)
                    .iter()
                    .map(|action| action.to_string())
                    .collect();
                if allowed.is_empty() {
                    println!("  no further actions");
                } else {
                    println!("  allowed: {}", allowed.join(", "));
                }
            }
            Ok(())
        }
        Commands::List => {
            let documents = service.list().await.map_err(present)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&documents)?);
            } else if documents.is_empty() {
                println!("No documents");
            } else {
                for document in &documents {
                    println!("{}", document.summary());
                }
            }
            Ok(())
        }
        Commands::History { id } => {
            let document = service.get(&DocumentId::parse(&id)?).await.map_err(present)?;
            if json {
                println!("{}", serde_json::to_string_pretty(document.history())?);
                return Ok(());
            }
            println!("{}", document.summary());
            for record in document.history() {
                println!(
                    "  v{} {} {} -> {} {}{}",
                    record.version,
                    record.at.to_rfc3339(),
                    record.from,
                    record.to,
                    serde_json::to_string(&record.event)?,
                    record
                        .actor
                        .as_deref()
                        .map(|actor| format!(" by {actor}"))
                        .unwrap_or_default()
                );
            }
            Ok(())
        }
        Commands::Revise {
            id,
            rate_cents,
            quantity,
            accessorials,
            expected_version,
        } => {
            let charges = parse_charges(rate_cents, quantity, &accessorials)?;
            let transition = service
                .revise_charges(&DocumentId::parse(&id)?, charges, expected_version)
                .await
                .map_err(present)?;
            print_transition(&transition, json)
        }
        Commands::ConfigShow => {
            print!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}

fn request(id: &str, action: DocumentAction, expected_version: Option<u64>) -> Result<ActionRequest> {
    let request = ActionRequest::new(DocumentId::parse(id)?, action);
    Ok(match expected_version {
        Some(version) => request.expecting_version(version),
        None => request,
    })
}

/// A caller that pinned a version wants the conflict reported, not rebased
async fn submit(service: &Service, request: ActionRequest) -> Result<Transition> {
    let outcome = if request.expected_version.is_some() {
        service.execute(&request).await
    } else {
        service.execute_with_retry(&request).await
    };
    outcome.map_err(present)
}

fn parse_charges(rate_cents: u64, quantity: u32, accessorials: &[String]) -> Result<Charges> {
    let accessorials = accessorials
        .iter()
        .map(|raw| raw.parse::<Accessorial>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Charges::new(rate_cents, quantity, accessorials)?)
}

fn present(err: LifecycleError) -> anyhow::Error {
    anyhow!(err.user_message())
}

fn print_document(document: &Document, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(document)?);
    } else {
        println!("{}", document.summary());
    }
    Ok(())
}

fn print_transition(transition: &Transition, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&transition.notice)?);
    } else {
        println!("{}", transition.notice.message);
        if transition.notice.ready_for_acceptance {
            println!("  ready for acceptance");
        }
    }
    Ok(())
}

