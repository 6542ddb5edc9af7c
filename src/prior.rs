//! Prior density information.
//!
//! File layout: the number of groups `g`, then `g` group values (any
//! whitespace, may span lines); after that one line per chromosome of the
//! form `name len gid len gid ...` partitioning the whole chromosome into
//! labelled segments. Group values are one-based densities, so one is
//! subtracted on load: a group value of 1 adds nothing to the baseline.

use crate::types::Pos;
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorSegment {
    pub length: Pos,
    pub group: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Prior {
    pub group_values: Vec<f64>,
    pub chromosomes: Vec<(String, Vec<PriorSegment>)>,
}

impl Prior {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read prior file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("malformed prior file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().enumerate();

        let mut header: Vec<&str> = Vec::new();
        let mut expected: Option<usize> = None;
        while expected.is_none_or(|n| header.len() < n + 1) {
            let (lineno, line) = lines
                .next()
                .ok_or_else(|| anyhow!("prior file ends before all group values are listed"))?;
            header.extend(line.split_whitespace());
            if expected.is_none() && !header.is_empty() {
                let n: usize = header[0]
                    .parse()
                    .with_context(|| format!("line {}: bad group count '{}'", lineno + 1, header[0]))?;
                expected = Some(n);
            }
            if let Some(n) = expected
                && header.len() > n + 1
            {
                bail!("line {}: unexpected tokens after the group values", lineno + 1);
            }
        }

        let group_values = header[1..]
            .iter()
            .map(|tok| {
                tok.parse::<f64>()
                    .map(|v| v - 1.0)
                    .map_err(|_| anyhow!("bad group value '{}'", tok))
            })
            .collect::<Result<Vec<f64>>>()?;

        let mut chromosomes = Vec::new();
        for (lineno, line) in lines {
            let mut tokens = line.split_whitespace();
            let Some(name) = tokens.next() else { continue };
            let rest: Vec<&str> = tokens.collect();
            if rest.len() % 2 != 0 {
                bail!("line {}: segment list for '{}' is not length/group pairs", lineno + 1, name);
            }
            let mut segments = Vec::with_capacity(rest.len() / 2);
            for pair in rest.chunks_exact(2) {
                let length: Pos = pair[0]
                    .parse()
                    .with_context(|| format!("line {}: bad segment length '{}'", lineno + 1, pair[0]))?;
                let group: usize = pair[1]
                    .parse()
                    .with_context(|| format!("line {}: bad group id '{}'", lineno + 1, pair[1]))?;
                if group >= group_values.len() {
                    bail!(
                        "line {}: group id {} out of range (only {} groups)",
                        lineno + 1,
                        group,
                        group_values.len()
                    );
                }
                segments.push(PriorSegment { length, group });
            }
            chromosomes.push((name.to_string(), segments));
        }

        Ok(Self { group_values, chromosomes })
    }
}
