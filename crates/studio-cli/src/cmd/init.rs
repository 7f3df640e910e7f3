use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use studio_core::{paths, Studio};

pub fn run(root: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let name = name.map(str::to_string).unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "studio".to_string())
    });

    let created = Studio::init(root, &name)
        .with_context(|| format!("failed to initialize studio in {}", root.display()))?;

    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "config_created": created,
        }))?;
        return Ok(());
    }

    println!("Initializing studio in: {}", root.display());
    let verb = if created { "created:" } else { "exists: " };
    println!("  {verb} {}", paths::CONFIG_FILE);
    println!("  ready:   {}", paths::STORE_FILE);
    Ok(())
}
