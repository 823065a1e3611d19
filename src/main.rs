// Copyright 2025 Erst Users
// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, Subcommand};

use softhsm_provisioner::backend::softhsm2::SoftHsm2Util;
use softhsm_provisioner::hooks::{self, HookReport, UnitStatus};
use softhsm_provisioner::relation::MemoryRelation;
use softhsm_provisioner::{ProvisionerConfig, TokenProvisioner};

#[derive(Parser, Debug)]
#[command(
    name = "softhsm-provisioner",
    about = "Provision a SoftHSM2 token for the Barbican key manager"
)]
struct Cli {
    #[command(subcommand)]
    hook: Hook,
}

#[derive(Subcommand, Debug)]
enum Hook {
    /// Set up the token store as part of unit install
    Install,
    /// Publish plugin data for a connected hsm peer
    HsmConnected,
}

fn main() {
    // Logs go to stderr; stdout carries only the JSON report
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ProvisionerConfig::from_env();
    let backend = SoftHsm2Util::from_config(&config);
    let provisioner = TokenProvisioner::new(config, backend);

    let report = match cli.hook {
        Hook::Install => match hooks::install(&provisioner) {
            Ok(report) => report,
            Err(e) => HookReport::failure(e.to_string()),
        },
        Hook::HsmConnected => {
            let mut relation = MemoryRelation::new();
            hooks::hsm_connected(&provisioner, &mut relation)
        }
    };

    let failed = report.status == UnitStatus::Error;
    match serde_json::to_string(&report) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => {
            eprintln!("failed to serialize hook report: {e}");
            std::process::exit(1);
        }
    }
    if failed {
        std::process::exit(1);
    }
}
