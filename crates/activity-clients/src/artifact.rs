//! Compiled contract artifacts.
//!
//! Contracts are compiled outside this process (`forge build` in
//! `contracts/`); we only read the resulting JSON.

use alloy::{hex, json_abi::JsonAbi, primitives::Bytes};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// ABI and creation bytecode of one contract.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

#[derive(Deserialize)]
struct RawArtifact {
    abi: JsonAbi,
    #[serde(default)]
    bytecode: Option<RawBytecode>,
    /// solc `--combined-json` style
    #[serde(default)]
    bin: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    /// Foundry style: `{"object": "0x..."}`
    Object { object: String },
    Hex(String),
}

impl ContractArtifact {
    /// Parse a Foundry artifact or a solc combined-json contract entry.
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let raw: RawArtifact =
            serde_json::from_str(json).with_context(|| format!("Invalid artifact for {name}"))?;

        let code = match (raw.bytecode, raw.bin) {
            (Some(RawBytecode::Object { object }), _) => object,
            (Some(RawBytecode::Hex(code)), _) => code,
            (None, Some(bin)) => bin,
            (None, None) => bail!("Artifact for {name} has no bytecode"),
        };

        let bytecode = hex::decode(code.trim())
            .with_context(|| format!("Artifact for {name} has malformed or unlinked bytecode"))?;
        if bytecode.is_empty() {
            bail!("Artifact for {name} has empty bytecode (interface or abstract contract?)");
        }

        Ok(Self {
            name: name.to_string(),
            abi: raw.abi,
            bytecode: bytecode.into(),
        })
    }

    pub fn load<P: AsRef<Path>>(name: &str, path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        Self::from_json(name, &json)
    }

    /// Load `<out_dir>/<name>.sol/<name>.json`, the Foundry output layout.
    pub fn from_out_dir<P: AsRef<Path>>(out_dir: P, name: &str) -> Result<Self> {
        Self::load(name, Self::out_dir_path(out_dir, name))
    }

    pub fn out_dir_path<P: AsRef<Path>>(out_dir: P, name: &str) -> PathBuf {
        out_dir
            .as_ref()
            .join(format!("{name}.sol"))
            .join(format!("{name}.json"))
    }

    /// Fail unless every named function is present in the ABI.
    pub fn require_functions(&self, functions: &[&str]) -> Result<()> {
        let missing: Vec<_> = functions
            .iter()
            .filter(|f| self.abi.function(f).is_none())
            .collect();
        if !missing.is_empty() {
            bail!("Artifact {} is missing functions: {missing:?}", self.name);
        }
        Ok(())
    }

    /// Creation code: bytecode followed by ABI-encoded constructor arguments.
    pub fn creation_code(&self, constructor_args: &[u8]) -> Bytes {
        let mut code = Vec::with_capacity(self.bytecode.len() + constructor_args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(constructor_args);
        code.into()
    }
}
