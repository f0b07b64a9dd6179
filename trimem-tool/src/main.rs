// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host-PC CLI for the trimem storage console, driven over USB CDC.
//!
//! Usage:
//!   trimem-tool --port /dev/ttyACM0 fscp flash:/a.bin nand:/a.bin -f
//!   trimem-tool --port /dev/ttyACM0 push firmware.bin coproc.bin
//!   trimem-tool --port /dev/ttyACM0 selfupdate coproc.bin

mod cli;
mod commands;
mod transport;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
