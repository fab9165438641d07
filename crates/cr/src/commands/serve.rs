//! `cr serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use cr_config::{CliSettings, Config};
use cr_server::{AGENT_PATH, run_server, server_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover cr.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing the stylesheets (overrides config).
    #[arg(short, long, env = "CR_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long, env = "CR_PORT")]
    port: Option<u16>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Debug mode: debug logging, and pages reload when the agent script changes.
    #[arg(short, long)]
    pub debug: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = self.cli_settings();
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        match &config.config_path {
            Some(path) => tracing::debug!(path = %path.display(), "Loaded configuration"),
            None => tracing::debug!("No cr.toml found, using defaults"),
        }

        output.info(&format!(
            "Starting server on {}:{}",
            config.server.host, config.server.port
        ));
        output.info(&format!(
            "Base directory: {}",
            config.watch_resolved.base_dir.display()
        ));
        output.info(&format!(
            "Watching: {}",
            config.watch_resolved.patterns.join(", ")
        ));
        if !config.agent_resolved.script.exists() {
            output.warning(&format!(
                "Agent script not found: {} (build it with wasm-pack, see cr-agent-web)",
                config.agent_resolved.script.display()
            ));
        }
        output.info("Tag to add to your document:");
        output.highlight(&script_tag(&config.server.host, config.server.port));

        let server_config = server_config_from_config(&config);
        run_server(server_config).await?;

        Ok(())
    }

    /// Build settings overriding the configuration file.
    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            host: self.host.clone(),
            port: self.port,
            base_dir: self.base_dir.clone(),
            debug: self.debug.then_some(true),
        }
    }
}

/// `<script>` element loading the agent from the server.
fn script_tag(host: &str, port: u16) -> String {
    let host = match host {
        "0.0.0.0" | "::" => "localhost",
        other => other,
    };
    format!("<script src=\"http://{host}:{port}{AGENT_PATH}\"></script>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ServeArgs,
    }

    fn parse(args: &[&str]) -> ServeArgs {
        TestCli::try_parse_from(std::iter::once("cr").chain(args.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_no_flags_override_nothing() {
        let settings = parse(&[]).cli_settings();
        assert!(settings.host.is_none());
        assert!(settings.port.is_none());
        assert!(settings.debug.is_none());
    }

    #[test]
    fn test_flags_become_settings() {
        let args = parse(&["--base-dir", "public", "--port", "9000", "--debug"]);
        let settings = args.cli_settings();

        assert_eq!(settings.base_dir, Some(PathBuf::from("public")));
        assert_eq!(settings.port, Some(9000));
        assert_eq!(settings.debug, Some(true));
        assert!(args.debug);
    }

    #[test]
    fn test_script_tag() {
        assert_eq!(
            script_tag("127.0.0.1", 7980),
            "<script src=\"http://127.0.0.1:7980/cr/css-reload.js\"></script>"
        );
        assert_eq!(
            script_tag("0.0.0.0", 8000),
            "<script src=\"http://localhost:8000/cr/css-reload.js\"></script>"
        );
    }
}
