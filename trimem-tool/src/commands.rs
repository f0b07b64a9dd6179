// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations: `fscp`, `push`, and `selfupdate` over the
//! console's line protocol.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use trimem_core::parse_backend_spec;
use trimem_core::pathspec::normalize_name;
use trimem_core::receiver::{encode_commit_frame, encode_data_frame, DEFAULT_MAX_FRAME};

use crate::transport::Transport;

/// Cross-backend copy, mirroring the console's `fscp <src> <dst> [-f]`.
pub fn fscp(transport: &mut Transport, src: &str, dst: &str, force: bool) -> Result<()> {
    parse_backend_spec(src).map_err(|e| anyhow::anyhow!("invalid source spec: {e}"))?;
    parse_backend_spec(dst).map_err(|e| anyhow::anyhow!("invalid destination spec: {e}"))?;

    let mut line = format!("fscp {src} {dst}");
    if force {
        line.push_str(" -f");
    }

    let reply = transport.send_recv_line(&line)?;
    if let Some(rest) = reply.strip_prefix("OK ") {
        println!("copied: {rest}");
        Ok(())
    } else if reply == "OK" {
        Ok(())
    } else if let Some(token) = reply.strip_prefix("ERR ") {
        bail!("fscp failed: {token}");
    } else {
        bail!("unexpected reply: {reply}");
    }
}

/// Upload a local file through the framed binary receiver (`rxbin`).
pub fn push(transport: &mut Transport, file: &Path, name: &str) -> Result<()> {
    normalize_name(name).map_err(|e| anyhow::anyhow!("invalid destination name: {e}"))?;

    let data = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let size = data.len() as u32;

    println!("File:  {} ({size} bytes)", file.display());
    println!("Dest:  {name}");
    println!();

    let ready = transport.send_recv_line(&format!("rxbin {name} {size}"))?;
    if ready != "READY" {
        if let Some(token) = ready.strip_prefix("ERR ") {
            bail!("rxbin rejected: {token}");
        }
        bail!("unexpected reply to rxbin: {ready}");
    }

    let pb = ProgressBar::new(size as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let mut offset = 0u32;
    for chunk in data.chunks(DEFAULT_MAX_FRAME) {
        let frame = encode_data_frame(offset, chunk)
            .ok_or_else(|| anyhow::anyhow!("chunk of {} bytes exceeds the frame limit", chunk.len()))?;
        transport.write_bytes(&frame)?;
        offset += chunk.len() as u32;
        pb.set_position(offset as u64);
    }
    pb.finish_with_message("upload complete");

    transport.write_bytes(&encode_commit_frame())?;
    let outcome = transport.read_line()?;
    match outcome.as_str() {
        "OK" => {
            println!("commit ok");
            Ok(())
        }
        other => {
            if let Some(token) = other.strip_prefix("ERR ") {
                bail!("upload failed: {token}");
            }
            bail!("unexpected commit reply: {other}");
        }
    }
}

/// Trigger the self-update loop against an already-uploaded file.
pub fn selfupdate(transport: &mut Transport, name: &str) -> Result<()> {
    normalize_name(name).map_err(|e| anyhow::anyhow!("invalid name: {e}"))?;

    print!("Running self-update from {name}... ");
    // The erase+program pass can take tens of seconds on NAND-sized images.
    let reply = transport.send_recv_line_timeout(&format!("selfupdate {name}"), 60_000)?;
    match reply.as_str() {
        "OK" => {
            println!("OK");
            Ok(())
        }
        other => {
            if let Some(token) = other.strip_prefix("ERR ") {
                bail!("selfupdate failed: {token}");
            }
            bail!("unexpected reply: {other}");
        }
    }
}
