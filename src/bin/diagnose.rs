//! Diagnostic tool - Check configuration before starting the sync loop
//!
//! Run with: cargo run --bin diagnose

use nomsync::Config;
use std::env;

fn main() {
    println!("🔍 NOMSYNC DIAGNOSTIC CHECK\n");

    // Load .env
    dotenvy::dotenv().ok();

    println!("═══════════════════════════════════════════════════");
    println!("                  CONFIGURATION                     ");
    println!("═══════════════════════════════════════════════════\n");

    // Optional settings
    let checks = [
        ("CHAIN_ID", "1", "Chain the contracts live on"),
        ("READ_TIMEOUT_SECS", "10", "Per-read timeout inside a sync cycle (0 = off)"),
        ("BLOCK_POLL_INTERVAL_MS", "4000", "How often to ask for a new block"),
        ("GAS_API_TIMEOUT_SECS", "5", "Etherscan gas tracker timeout"),
    ];

    for (key, default, desc) in checks {
        let value = env::var(key).unwrap_or_else(|_| default.to_string());
        let is_default = env::var(key).is_err();
        let marker = if is_default { "(default)" } else { "(from .env)" };
        println!("  {}: {} {}", key, value, marker);
        println!("    └─ {}\n", desc);
    }

    // RPC check
    let rpc = env::var("RPC_URL").unwrap_or_else(|_| "NOT SET".to_string());
    let rpc_display = if rpc.chars().count() > 50 {
        let head: String = rpc.chars().take(30).collect();
        format!("{}...", head)
    } else {
        rpc.clone()
    };
    println!("  RPC_URL: {}", rpc_display);

    println!("\n═══════════════════════════════════════════════════");
    println!("                 REQUIRED ADDRESSES                 ");
    println!("═══════════════════════════════════════════════════\n");

    for key in ["BONDING_CONTRACT_ADDRESS", "TOKEN_CONTRACT_ADDRESS", "ACCOUNT_ADDRESS"] {
        let set = env::var(key).map(|v| !v.trim().is_empty()).unwrap_or(false);
        println!("  {:<26} {}", format!("{}:", key), if set { "✅ Set" } else { "❌ Not set" });
    }
    let etherscan = env::var("ETHERSCAN_API_KEY").is_ok();
    println!(
        "  {:<26} {}",
        "ETHERSCAN_API_KEY:",
        if etherscan { "✅ Set" } else { "➖ Not set (gas tiers from RPC)" }
    );

    println!("\n═══════════════════════════════════════════════════");
    println!("                     STATUS                         ");
    println!("═══════════════════════════════════════════════════\n");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("  ❌ Could not load configuration: {}", e);
            return;
        }
    };

    match config.validate() {
        Ok(()) => {
            println!("  ✅ Configuration is valid");
            println!("     → `nomsync watch` will sync every new block");
            match config.read_timeout() {
                Some(timeout) => println!("     → Reads slower than {:?} drop the cycle", timeout),
                None => println!("     → Reads have no timeout"),
            }
            println!();
            config.print_summary();
        }
        Err(e) => {
            println!("  ❌ {}", e);
            println!("     → The sync loop will refuse to start.");
            println!("     → Offline quotes still work: nomsync quote buy 1 --supply 20000000");
        }
    }

    println!("\n✅ Diagnostic complete!\n");
}
