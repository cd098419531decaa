#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for provisioning test portals and waiting for their mail

use chrono::Utc;
use clap::{Parser, Subcommand};
use portal_harness::portal::{PortalRecord, create_token};
use portal_harness::{
    DEFAULT_SENDER_TIMEOUT, DEFAULT_TIMEOUT, EmailMatch, MailChecker, MailConfig, PortalConfig,
    PortalSetup, SearchOptions,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "portal-cli")]
#[command(about = "Provision test portals and wait for their mail")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Wait for a message in INBOX
    WaitMail {
        /// Subject substring (case-insensitive)
        #[arg(long)]
        subject: String,

        /// Sender display-name substring (case-insensitive)
        #[arg(long)]
        sender: Option<String>,

        /// Require a body link to this portal
        #[arg(long, conflicts_with = "sender")]
        portal: Option<String>,

        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Move the match to the checked folder instead of flagging it
        #[arg(long)]
        move_out: bool,
    },

    /// Wait for a portal mail and print its confirmation link
    ExtractLink {
        #[arg(long)]
        subject: String,

        #[arg(long)]
        portal: String,

        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print a payment authorization token for the current second
    Token,

    /// Register, authenticate and activate a new portal
    Provision {
        /// Portal name prefix
        #[arg(long, default_value = portal_harness::portal::DEFAULT_PREFIX)]
        prefix: String,

        /// Also activate payment for this many seats
        #[arg(long)]
        payment: Option<u32>,
    },

    /// Clean up and delete a portal
    Teardown {
        /// Portal name as printed by `provision`
        #[arg(long)]
        name: String,

        /// Portal domain as printed by `provision`
        #[arg(long)]
        domain: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    match &args.command {
        Command::WaitMail {
            subject,
            sender,
            portal,
            timeout,
            move_out,
        } => {
            let default = if sender.is_some() {
                DEFAULT_SENDER_TIMEOUT
            } else {
                DEFAULT_TIMEOUT
            };
            let options = SearchOptions::new(seconds_or(*timeout, default), *move_out);
            cmd_wait_mail(&args, subject, sender.as_deref(), portal.as_deref(), options).await?;
        }
        Command::ExtractLink {
            subject,
            portal,
            timeout,
        } => {
            let options = SearchOptions::with_timeout(seconds_or(*timeout, DEFAULT_TIMEOUT));
            cmd_extract_link(&args, subject, portal, options).await?;
        }
        Command::Token => cmd_token(&args)?,
        Command::Provision { prefix, payment } => {
            cmd_provision(&args, prefix, *payment).await?;
        }
        Command::Teardown { name, domain } => cmd_teardown(name, domain).await?,
    }

    Ok(())
}

fn seconds_or(seconds: Option<u64>, default: Duration) -> Duration {
    seconds.map_or(default, Duration::from_secs)
}

async fn cmd_wait_mail(
    args: &Args,
    subject: &str,
    sender: Option<&str>,
    portal: Option<&str>,
    options: SearchOptions,
) -> anyhow::Result<()> {
    let checker = MailChecker::new(MailConfig::from_env()?);

    let found = match (sender, portal) {
        (_, Some(portal)) => {
            checker
                .find_by_subject_with_link(subject, portal, options)
                .await?
        }
        (Some(sender), None) => {
            checker
                .find_by_sender_and_subject(subject, sender, options)
                .await?
        }
        (None, None) => checker.find_by_subject(subject, options).await?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&found)?);
    } else {
        print_match(found.as_ref());
    }

    if found.is_none() {
        anyhow::bail!("No matching message within {:?}", options.timeout);
    }
    Ok(())
}

async fn cmd_extract_link(
    args: &Args,
    subject: &str,
    portal: &str,
    options: SearchOptions,
) -> anyhow::Result<()> {
    let checker = MailChecker::new(MailConfig::from_env()?);
    let link = checker.extract_link(subject, portal, options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&link)?);
    } else if let Some(link) = &link {
        println!("{link}");
    }

    if link.is_none() {
        anyhow::bail!("No confirmation link found");
    }
    Ok(())
}

fn cmd_token(args: &Args) -> anyhow::Result<()> {
    let config = PortalConfig::from_env()?;
    let secret = config
        .machine_key
        .ok_or_else(|| anyhow::anyhow!("MACHINEKEY not set"))?;
    let public_key = config
        .public_key
        .ok_or_else(|| anyhow::anyhow!("PKEY not set"))?;

    let token = create_token(&secret, &public_key, Utc::now())?;
    if args.json {
        println!("{}", serde_json::json!({ "token": token }));
    } else {
        println!("{token}");
    }
    Ok(())
}

async fn cmd_provision(args: &Args, prefix: &str, payment: Option<u32>) -> anyhow::Result<()> {
    let mut setup = PortalSetup::new(PortalConfig::from_env()?)?;
    let record = setup.setup_portal(prefix).await?;

    let outcome = match payment {
        Some(quantity) => Some(setup.payment()?.setup_payment(quantity).await?),
        None => None,
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "portal": record,
                "payment": outcome,
            }))?
        );
    } else {
        print_record(&record);
        if outcome.is_some() {
            println!("Payment: activated");
        }
    }
    Ok(())
}

async fn cmd_teardown(name: &str, domain: &str) -> anyhow::Result<()> {
    let mut setup = PortalSetup::new(PortalConfig::from_env()?)?;
    setup.attach(PortalRecord {
        name: name.to_string(),
        domain: domain.to_string(),
        admin_user_id: String::new(),
        token: None,
    });
    setup.authenticate().await?;
    setup.teardown().await?;

    println!("Deleted {name}");
    Ok(())
}

fn print_match(found: Option<&EmailMatch>) {
    let Some(found) = found else {
        println!("No matching message.");
        return;
    };

    println!("UID:     {}", found.uid);
    println!("Subject: {}", found.subject);
    if let Some(sender) = &found.sender {
        println!("From:    {sender}");
    }
}

fn print_record(record: &PortalRecord) {
    println!("Name:    {}", record.name);
    println!("Domain:  {}", record.domain);
    println!("Owner:   {}", record.admin_user_id);
}
