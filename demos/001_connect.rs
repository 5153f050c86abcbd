//! Connecting to a wallet UI through a popup.
//!
//! Demonstrates:
//! - Building a Wallet against an in-memory host
//! - Opening the connect popup and reading the shared accounts
//! - The popup being closed on success and on refusal
//!
//! Usage:
//!   cargo run --example 001_connect
//!   cargo run --example 001_connect -- --debug
//!   cargo run --example 001_connect -- --reject

mod common;

// ============================================================================
// Imports
// ============================================================================

use common::{Args, FRAME_URL};
use wallet_bridge::host::MemoryHost;
use wallet_bridge::{Result, Wallet};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== 001: Connect ===\n");

    // ========================================================================
    // Create Wallet
    // ========================================================================

    println!("[1] Creating wallet...");
    println!("    Frame URL: {FRAME_URL}");

    let (host, inbound) = MemoryHost::with_peer(common::wallet_ui(args.reject));
    let wallet = Wallet::builder()
        .frame_url(FRAME_URL)
        .build(host.clone(), inbound)?;

    println!("    ✓ Wallet ready\n");

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[2] Connecting...");

    match wallet.connect().await {
        Ok(accounts) => {
            println!("    ✓ {} account(s) shared", accounts.len());
            for account in &accounts {
                println!("      - {}", account.address);
            }
        }
        Err(e) if e.is_remote() => println!("    ✗ Refused: {e}"),
        Err(e) => return Err(e),
    }

    println!("    Open windows: {}\n", host.open_windows().len());

    wallet.close();
    println!("=== Done ===");
    Ok(())
}
