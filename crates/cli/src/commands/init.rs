//! `papertriage init` — write a default config file.

use std::error::Error;
use std::path::Path;

use papertriage_config::TriageConfig;

pub fn run(config_path: &Path) -> Result<(), Box<dyn Error>> {
    println!("📄 Paper Triage — Setup");
    println!("=======================\n");

    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete it and re-run init.\n");
        return Ok(());
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, TriageConfig::default_toml())?;

    println!("✅ Created config at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set input_folders and archive_dir in {}", config_path.display());
    println!("   2. Point [llm] at your model (Ollama works out of the box)");
    println!("   3. Run: papertriage doctor");
    println!("   4. Run: papertriage run --dry-run\n");

    Ok(())
}
