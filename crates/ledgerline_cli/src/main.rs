//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `ledgerline_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use ledgerline_core::db::{migrations::latest_version, open_db_in_memory};

fn main() {
    println!("ledgerline_core version={}", ledgerline_core::core_version());
    println!("ledgerline_core schema_version={}", latest_version());

    match open_db_in_memory() {
        Ok(_) => println!("ledgerline_core db_probe=ok"),
        Err(err) => {
            eprintln!("ledgerline_core db_probe=error error={err}");
            std::process::exit(1);
        }
    }
}
