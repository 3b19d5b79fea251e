use std::fs;
use std::io::Write;

use shared::config::SyncConfig;

/// Writes the default sync configuration to `sync.yaml` or `sync.json` in
/// the working directory.
///
/// # Errors
/// Returns an error if the format is unsupported or if writing the file fails.
pub fn generate_config(format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = SyncConfig::with_defaults();
    let (file_name, serialized) = match format {
        "yaml" => ("sync.yaml", serde_yml::to_string(&config)?),
        "json" => ("sync.json", serde_json::to_string_pretty(&config)?),
        _ => return Err("Unsupported format. Use 'yaml' or 'json'.".into()),
    };

    let mut file = fs::File::create(file_name)?;
    file.write_all(serialized.as_bytes())?;

    println!("Configuration file '{file_name}' generated successfully.");
    Ok(())
}
