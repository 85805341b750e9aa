//! The batch capability command: `(observer, subject)` level pairs in, one
//! JSON capability set per line out.

use std::io::{BufRead, Write};

use anyhow::{Context as _, bail};
use muster_core::{authority::AuthorityLevel, policy::CapabilitySet};
use serde::Serialize;
use strum::IntoEnumIterator as _;

/// One output line.
#[derive(Debug, Serialize)]
pub struct CapabilityLine {
  pub observer: u8,
  pub subject:  u8,
  #[serde(flatten)]
  pub caps:     CapabilitySet,
}

impl CapabilityLine {
  pub fn new(observer: AuthorityLevel, subject: AuthorityLevel) -> Self {
    Self {
      observer: observer.ordinal(),
      subject:  subject.ordinal(),
      caps:     CapabilitySet::compute(observer, subject),
    }
  }
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_pair(line: &str) -> anyhow::Result<Option<(AuthorityLevel, AuthorityLevel)>> {
  let line = line.split('#').next().unwrap_or_default().trim();
  if line.is_empty() {
    return Ok(None);
  }

  let fields: Vec<&str> = line
    .split(|c: char| c == ',' || c.is_whitespace())
    .filter(|f| !f.is_empty())
    .collect();
  let [observer, subject] = fields.as_slice() else {
    bail!("expected two levels, found {}", fields.len());
  };

  let level = |raw: &str| -> anyhow::Result<AuthorityLevel> {
    let n: u8 = raw.parse().with_context(|| format!("`{raw}` is not a level"))?;
    Ok(AuthorityLevel::from_ordinal(n)?)
  };
  Ok(Some((level(observer)?, level(subject)?)))
}

/// Stream pairs from `input` to JSON lines on `output`.
pub fn run(input: impl BufRead, mut output: impl Write) -> anyhow::Result<usize> {
  let mut written = 0;
  for (idx, line) in input.lines().enumerate() {
    let line = line.context("failed to read input")?;
    let Some((observer, subject)) =
      parse_pair(&line).with_context(|| format!("line {}", idx + 1))?
    else {
      continue;
    };
    emit(&mut output, observer, subject)?;
    written += 1;
  }
  Ok(written)
}

/// Every observer/subject combination, observer-major.
pub fn run_all(mut output: impl Write) -> anyhow::Result<usize> {
  let mut written = 0;
  for observer in AuthorityLevel::iter() {
    for subject in AuthorityLevel::iter() {
      emit(&mut output, observer, subject)?;
      written += 1;
    }
  }
  Ok(written)
}

fn emit(
  output: &mut impl Write,
  observer: AuthorityLevel,
  subject: AuthorityLevel,
) -> anyhow::Result<()> {
  serde_json::to_writer(&mut *output, &CapabilityLine::new(observer, subject))?;
  writeln!(output)?;
  Ok(())
}
