/*
 * Copyright (C) 2018 Red Hat, Inc.
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use anyhow::{bail, Context, Result};
use std::io;
use std::path::Path;

/// Serialization format of a config or manifest file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    YAML,
    JSON,
}

impl InputFormat {
    pub fn detect_from_filename<P: AsRef<Path>>(filename: P) -> Result<Self> {
        let filename = filename.as_ref();
        let ext = filename.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yaml" | "yml" => Ok(Self::YAML),
            "json" => Ok(Self::JSON),
            _ => bail!("Unsupported file extension: {}", filename.display()),
        }
    }
}

/// Parse a stream in the given format.
pub fn parse_stream<T, R: io::Read>(fmt: &InputFormat, input: &mut R) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let parsed = match fmt {
        InputFormat::JSON => serde_json::from_reader(input)?,
        InputFormat::YAML => serde_yaml::from_reader(input)?,
    };
    Ok(parsed)
}

/// Open and parse a file, detecting the format from its name.
pub fn parse_file<T, P: AsRef<Path>>(filename: P) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let filename = filename.as_ref();
    let fmt = InputFormat::detect_from_filename(filename)?;
    let f = std::fs::File::open(filename)
        .with_context(|| format!("Failed to open {}", filename.display()))?;
    parse_stream(&fmt, &mut io::BufReader::new(f))
        .with_context(|| format!("Parsing {}", filename.display()))
}
