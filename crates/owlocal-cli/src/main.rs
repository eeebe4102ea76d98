use clap::{Parser, Subcommand};
use owlocal_core::loader::CodeLoader;
use owlocal_core::manifest::Manifest;
use owlocal_core::script::{self, ScriptCodeLoader};
use owlocal_server::{AppState, GatewayConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "owlocal",
    about = "Local simulator for serverless action invocation: serve a manifest's actions and sequences over the gateway routes",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the manifest's packages on the local gateway routes
    Run {
        /// Manifest file describing packages, actions, and sequences
        #[arg(long, default_value = "manifest.yaml", env = "OWLOCAL_MANIFEST")]
        manifest: PathBuf,

        /// Port to listen on
        #[arg(long, default_value = "9080")]
        port: u16,

        /// Prefix for the web-exposed route
        #[arg(long, default_value = "api/v1/web")]
        web_prefix: String,

        /// Prefix for the non-web route (always rejected with 401)
        #[arg(long, default_value = "api/v1")]
        base_prefix: String,
    },

    /// Load and validate a manifest, then print a summary
    Validate {
        /// Manifest file to check
        #[arg(long, default_value = "manifest.yaml", env = "OWLOCAL_MANIFEST")]
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } => tracing::Level::INFO,
        Commands::Validate { .. } => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            manifest,
            port,
            web_prefix,
            base_prefix,
        } => {
            let manifest = Manifest::load(&manifest)?;
            if script::detect_runtime().is_none() {
                tracing::warn!(
                    "no JavaScript runtime found (tried bun, deno, node); action invocations will fail"
                );
            }

            let loader: Arc<dyn CodeLoader> = Arc::new(ScriptCodeLoader::new());
            let state = AppState::new(Arc::new(manifest), loader);
            let config = GatewayConfig {
                web_prefix,
                base_prefix,
            };
            owlocal_server::serve(state, config, port).await
        }

        Commands::Validate { manifest: path } => {
            let manifest = Manifest::load(&path)?;
            for (name, package) in &manifest.packages {
                println!(
                    "package {name}: {} actions, {} sequences",
                    package.actions.len(),
                    package.sequences.len()
                );
            }
            println!("{}: ok", path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
