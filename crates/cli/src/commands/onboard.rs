//! `sgr-research onboard`: First-time setup.

use std::path::Path;

use sgr_research_config::AppConfig;

pub async fn run(config_path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let default_path = AppConfig::config_dir().join("config.toml");
    let config_path = config_path.unwrap_or(&default_path);

    println!("🔬 SGR Research: First-Time Setup");
    println!("==================================\n");

    if write_default_config(config_path, force)? {
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Set SGR_RESEARCH_API_KEY (or OPENAI_API_KEY) and TAVILY_API_KEY,");
        println!("      or add the keys to {}", config_path.display());
        println!("   2. Run: sgr-research research \"your question\"\n");
    } else {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or re-run with --force.\n");
    }

    Ok(())
}

/// Write the default config to `path`. Returns `false` when a file is
/// already there and `force` is not set.
pub fn write_default_config(path: &Path, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}
