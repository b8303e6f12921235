use crate::cli::ConfigInitArgs;
use crate::config::{AdvisorConfig, EXAMPLE_CONFIG};
use anyhow::Context;
use std::fs::OpenOptions;
use std::io::Write;

/// `pdb-advisor config init`: write the annotated example configuration.
///
/// Without `--force` the file is opened with `create_new`, so an existing
/// config is never clobbered.
pub fn handle_config_init(args: &ConfigInitArgs) -> anyhow::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if args.force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options.open(&args.output).with_context(|| {
        if args.output.exists() {
            format!(
                "{} already exists; pass --force to replace it",
                args.output.display()
            )
        } else {
            format!("cannot create {}", args.output.display())
        }
    })?;
    file.write_all(EXAMPLE_CONFIG.as_bytes())?;

    let defaults = AdvisorConfig::default();
    println!("Wrote {}", args.output.display());
    println!(
        "Start with: pdb-advisor serve --config {} (listens on {}:{})",
        args.output.display(),
        defaults.server.host,
        defaults.server.port
    );
    Ok(())
}
