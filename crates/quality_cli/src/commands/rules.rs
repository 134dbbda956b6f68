use anyhow::Result;
use colored::*;
use quality_engine::Registry;

pub fn execute() -> Result<u8> {
    let registry = Registry::with_builtins();

    println!("{}", "Registered rule kinds:".bold());
    for kind in registry.kinds() {
        println!("  {}", kind);
    }

    Ok(0)
}
