//! Sensitive key check.

use anyhow::Result;
use colored::Colorize;
use exthost_core::sensitive::{env_var_name, is_sensitive};
use serde_json::json;

pub fn check_key(key: &str, json: bool) -> Result<()> {
    let sensitive = is_sensitive(key);
    let env_var = env_var_name(key);

    if json {
        let report = json!({
            "key": key,
            "sensitive": sensitive,
            "env_var": env_var,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if sensitive {
        println!(
            "{} {} is sensitive: it is never stored and is read from {}",
            "●".red(),
            key.cyan(),
            env_var.bold()
        );
    } else {
        println!("{} {} is not sensitive", "●".green(), key.cyan());
    }
    Ok(())
}
