//! Basic example of using the `Dispatcher`.
//!
//! Run with: `cargo run --example basic`

use banking_core::Dispatcher;
use std::io::Cursor;

fn main() {
    // Initialize logger (optional, but shows what's happening)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Sample operations as CSV: two users open accounts, then move money
    let operations = r"op,user,account,to,kind,currency,amount
open,1,,,checking,USD,1000.00
open,1,,,savings,USD,500.00
open,2,,,checking,USD,250.00
transfer,1,1,2,,,200.00
transfer,1,2,3,,,50.00
transfer,2,3,1,,,25.00
transfer,2,1,3,,,10.00
";

    // Create a dispatcher and process the operations
    // (the last transfer is rejected: user 2 does not own account 1)
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .process_operations(Cursor::new(operations))
        .expect("Failed to process operations");

    // Export results to stdout
    println!("\n=== Final Account State ===");
    dispatcher
        .export_accounts(std::io::stdout())
        .expect("Failed to export accounts");
}
