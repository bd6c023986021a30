//! Customer command - register customers and manage balances.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use secrecy::SecretString;

use super::open_service;
use crate::types::{NewCustomer, PriceTier};

#[derive(Args)]
pub struct CustomerCmd {
    #[command(subcommand)]
    pub command: CustomerSubCmd,
}

#[derive(Subcommand)]
pub enum CustomerSubCmd {
    /// Register a customer with a zero balance
    Add(AddCmd),

    /// Add funds to a customer's balance
    Credit(CreditCmd),

    /// Show a customer's balance and price tier
    Show(ShowCmd),
}

#[derive(Args)]
pub struct AddCmd {
    /// Customer e-mail
    pub email: String,

    /// Display name
    #[arg(long, default_value = "")]
    pub name: String,

    /// Login password
    #[arg(long, env = "SLOTVAULT_CUSTOMER_PASSWORD")]
    pub password: String,

    /// Price list applied to purchases
    #[arg(long, value_enum, default_value_t = PriceTier::Retail)]
    pub tier: PriceTier,
}

#[derive(Args)]
pub struct CreditCmd {
    /// Customer e-mail
    pub email: String,

    /// Amount to add, in whole currency units
    pub amount: i64,
}

#[derive(Args)]
pub struct ShowCmd {
    /// Customer e-mail
    pub email: String,
}

impl CustomerCmd {
    pub async fn run(&self) -> Result<()> {
        let service = open_service().await?;

        match &self.command {
            CustomerSubCmd::Add(cmd) => {
                let customer = service
                    .register_customer(NewCustomer {
                        email: cmd.email.clone(),
                        name: cmd.name.clone(),
                        password: SecretString::from(cmd.password.clone()),
                        tier: cmd.tier,
                    })
                    .await
                    .context("Failed to register customer")?;
                println!("Registered {} ({}, {})", customer.email, customer.id, customer.tier);
            }
            CustomerSubCmd::Credit(cmd) => {
                let balance = service
                    .credit_balance(&cmd.email, cmd.amount)
                    .await
                    .context("Failed to credit balance")?;
                println!("{} balance: {}", cmd.email, balance);
            }
            CustomerSubCmd::Show(cmd) => {
                let customer = service.customer(&cmd.email).await?;
                println!("Email:    {}", customer.email);
                if !customer.name.is_empty() {
                    println!("Name:     {}", customer.name);
                }
                println!("Tier:     {}", customer.tier);
                println!("Balance:  {}", customer.balance);
                println!("Since:    {}", customer.created_at.format("%d/%m/%Y"));
            }
        }

        Ok(())
    }
}
