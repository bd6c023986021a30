//! CLI argument definitions.

use clap::{Parser, Subcommand};

use crate::commands::{
    AccountCmd, BuyCmd, ConfigCmd, CustomerCmd, InitCmd, InventoryCmd, PurchasesCmd, ReleaseCmd,
    StockCmd,
};

#[derive(Parser)]
#[command(name = "slotvault")]
#[command(about = "Slotvault - credential inventory and slot sales for shared streaming accounts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the local store
    Init(InitCmd),

    /// Show available slots per platform
    Stock(StockCmd),

    /// Show the accounts and slots of a platform
    Inventory(InventoryCmd),

    /// Add, edit or remove shared accounts
    Account(AccountCmd),

    /// Register customers and manage balances
    Customer(CustomerCmd),

    /// Sell a slot to a customer
    Buy(BuyCmd),

    /// Return an occupied slot to the pool
    Release(ReleaseCmd),

    /// List a customer's purchases
    Purchases(PurchasesCmd),

    /// Manage configuration (timeouts, slot term, aliases)
    Config(ConfigCmd),
}

impl Command {
    pub async fn execute(&self) -> anyhow::Result<()> {
        match self {
            Command::Init(cmd) => cmd.run().await,
            Command::Stock(cmd) => cmd.run().await,
            Command::Inventory(cmd) => cmd.run().await,
            Command::Account(cmd) => cmd.run().await,
            Command::Customer(cmd) => cmd.run().await,
            Command::Buy(cmd) => cmd.run().await,
            Command::Release(cmd) => cmd.run().await,
            Command::Purchases(cmd) => cmd.run().await,
            Command::Config(cmd) => cmd.run().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_buy() {
        let cli = Cli::try_parse_from([
            "slotvault",
            "buy",
            "Amazon Prime",
            "--customer",
            "a@x.com",
            "--request-id",
            "order-7",
        ])
        .unwrap();

        let Command::Buy(cmd) = cli.command else {
            panic!("expected buy");
        };
        assert_eq!(cmd.platform, "Amazon Prime");
        assert_eq!(cmd.customer, "a@x.com");
        assert_eq!(cmd.request_id.as_deref(), Some("order-7"));
        assert_eq!(cmd.price, None);
    }

    #[test]
    fn test_release_slot_must_be_in_range() {
        let ok = Cli::try_parse_from([
            "slotvault", "release", "Netflix", "acc-1", "6", "--customer", "a@x.com",
        ]);
        assert!(ok.is_ok());

        let out_of_range = Cli::try_parse_from([
            "slotvault", "release", "Netflix", "acc-1", "7", "--customer", "a@x.com",
        ]);
        assert!(out_of_range.is_err());
    }
}
