//! Account command - register, edit and retire shared accounts.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use super::open_service;
use crate::types::AccountFields;

#[derive(Args)]
pub struct AccountCmd {
    #[command(subcommand)]
    pub command: AccountSubCmd,
}

#[derive(Subcommand)]
pub enum AccountSubCmd {
    /// Add an account to a platform
    Add(AddCmd),

    /// Replace an account's credentials and PINs
    Edit(EditCmd),

    /// Delete an account, suspending purchases on its occupied slots
    Remove(RemoveCmd),

    /// Check whether an e-mail is already used on a platform
    Exists(ExistsCmd),
}

#[derive(Args)]
pub struct Credentials {
    /// Login e-mail of the shared account
    #[arg(long)]
    pub email: String,

    /// Login password of the shared account
    #[arg(long, env = "SLOTVAULT_ACCOUNT_PASSWORD")]
    pub password: String,

    /// Slot PINs in slot order; pass "" to leave a slot out (max 6)
    #[arg(long = "pin", required = true)]
    pub pins: Vec<String>,
}

impl Credentials {
    fn fields(&self) -> AccountFields {
        AccountFields {
            email: self.email.clone(),
            password: self.password.clone(),
            pins: self.pins.clone(),
        }
    }
}

#[derive(Args)]
pub struct AddCmd {
    /// Platform name (any alias works)
    pub platform: String,

    #[command(flatten)]
    pub credentials: Credentials,
}

#[derive(Args)]
pub struct EditCmd {
    /// Platform name (any alias works)
    pub platform: String,

    /// Account id
    pub account_id: String,

    #[command(flatten)]
    pub credentials: Credentials,
}

#[derive(Args)]
pub struct RemoveCmd {
    /// Platform name (any alias works)
    pub platform: String,

    /// Account id
    pub account_id: String,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Args)]
pub struct ExistsCmd {
    /// Platform name (any alias works)
    pub platform: String,

    /// E-mail to look for (case-insensitive)
    pub email: String,
}

impl AccountCmd {
    pub async fn run(&self) -> Result<()> {
        let service = open_service().await?;

        match &self.command {
            AccountSubCmd::Add(cmd) => {
                let account = service
                    .add_account(&cmd.platform, &cmd.credentials.fields())
                    .await
                    .context("Failed to add account")?;
                println!(
                    "Added {} to {} ({} slots)",
                    account.id,
                    service.canonicalize(&cmd.platform),
                    account.slots.len()
                );
            }
            AccountSubCmd::Edit(cmd) => {
                let account = service
                    .update_account(&cmd.platform, &cmd.account_id, &cmd.credentials.fields())
                    .await
                    .context("Failed to update account")?;
                let numbers: Vec<String> = account.slots.iter().map(|s| s.number.to_string()).collect();
                println!("Updated {} (slots {})", account.id, numbers.join(", "));
            }
            AccountSubCmd::Remove(cmd) => {
                if !cmd.yes {
                    println!(
                        "Delete account {} from {}? Purchases on its occupied slots will be suspended.",
                        cmd.account_id,
                        service.canonicalize(&cmd.platform)
                    );
                    print!("[y/N] ");
                    std::io::Write::flush(&mut std::io::stdout())?;

                    let mut input = String::new();
                    std::io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Aborted.");
                        return Ok(());
                    }
                }

                let report = service
                    .delete_account(&cmd.platform, &cmd.account_id)
                    .await
                    .context("Failed to delete account")?;
                println!(
                    "Deleted {} ({}): {} slots removed, {} purchases suspended",
                    report.account_id,
                    report.email,
                    report.slots_removed,
                    report.cascade.suspended.len()
                );
                for warning in &report.cascade.warnings {
                    eprintln!("warning: {}", warning);
                }
            }
            AccountSubCmd::Exists(cmd) => {
                let exists = service.account_email_exists(&cmd.platform, &cmd.email).await?;
                if exists {
                    println!("{} is registered on {}", cmd.email, service.canonicalize(&cmd.platform));
                } else {
                    println!("{} is not registered on {}", cmd.email, service.canonicalize(&cmd.platform));
                }
            }
        }

        Ok(())
    }
}
