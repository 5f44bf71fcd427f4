use std::sync::Arc;

#[cfg(feature = "cli")]
use clap::Parser;

use outlinker::config::{ConfigLoader, StaticConfig};
use outlinker::system::{RunMode, init_logging, install_panic_hook};

fn load_config(path: Option<&str>) -> StaticConfig {
    let loader = match path {
        Some(path) => ConfigLoader::new().with_file(path),
        None => ConfigLoader::new(),
    };
    match loader.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e.format_colored());
            std::process::exit(1);
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();

    #[cfg(feature = "cli")]
    let (config_path, command) = {
        let cli = outlinker::cli::Cli::parse();
        (cli.config, cli.command)
    };
    #[cfg(not(feature = "cli"))]
    let config_path: Option<String> = None;

    let config = load_config(config_path.as_deref());

    #[cfg(feature = "cli")]
    {
        if let Some(cmd) = command
            && !matches!(cmd, outlinker::cli::Commands::Serve)
        {
            install_panic_hook(RunMode::Cli);
            if let Err(e) = outlinker::interfaces::cli::run_cli_command(cmd, &config) {
                eprintln!("{}", e.format_colored());
                std::process::exit(1);
            }
            return;
        }
    }

    install_panic_hook(RunMode::Server);

    let _log_guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = actix_web::rt::System::new()
        .block_on(outlinker::runtime::modes::run_server(Arc::new(config)));

    if let Err(e) = result {
        tracing::error!("Server exited with error: {:#}", e);
        eprintln!("Server error: {:#}", e);
        std::process::exit(1);
    }
}
