//! `flowsmith init` writes a default config file.

use flowsmith_config::AppConfig;
use std::path::Path;

pub async fn run(path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => AppConfig::config_dir().join("config.toml"),
    };

    println!("Flowsmith setup");
    println!("===============\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("  Created config directory: {}", dir.display());
        }
    }

    if config_path.exists() && !force {
        println!("  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or re-run with --force to overwrite.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("  Wrote config: {}", config_path.display());
    println!("\n  Next steps:");
    println!("   1. Set platform.base_url and platform.api_key (or N8N_API_KEY)");
    println!("   2. Optionally set provider.kind = \"openai\" with an API key");
    println!("   3. Run: flowsmith run \"send a slack alert when a database row changes\"\n");

    Ok(())
}
