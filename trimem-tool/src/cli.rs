// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::transport::Transport;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "trimem-tool")]
#[command(about = "Host-PC CLI for the trimem storage console")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyACM0)
    #[arg(short, long)]
    pub port: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Copy a file across (or within) a storage backend
    Fscp {
        /// Source, as `<backend>:<path>`
        src: String,
        /// Destination, as `<backend>:<path>`
        dst: String,
        /// Overwrite an existing destination
        #[arg(short, long)]
        force: bool,
    },

    /// Upload a local file through the framed binary receiver
    Push {
        /// Local file to upload
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Destination name on the device
        name: String,
    },

    /// Run the self-update loop against an already-uploaded file
    Selfupdate {
        /// Name of the uploaded image
        name: String,
    },
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let mut transport = Transport::new(&cli.port)?;

    match cli.command {
        Commands::Fscp { src, dst, force } => commands::fscp(&mut transport, &src, &dst, force),
        Commands::Push { file, name } => commands::push(&mut transport, &file, &name),
        Commands::Selfupdate { name } => commands::selfupdate(&mut transport, &name),
    }
}
