//! Program build options.
//!
//! Kernel modules describe their build configuration as an option string, the
//! same shape a compiler command line takes. Only preprocessor defines are
//! understood: `-D NAME`, `-DNAME`, `-D NAME=VALUE`. Values that parse as
//! integers become integer defines, `true` / `false` become booleans, a bare
//! name is `true`.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Value of a single preprocessor define.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineValue {
    Bool(bool),
    Int(i32),
    UInt(u32),
}

impl fmt::Display for DefineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefineValue::Bool(v) => write!(f, "{v}"),
            DefineValue::Int(v) => write!(f, "{v}"),
            DefineValue::UInt(v) => write!(f, "{v}u"),
        }
    }
}

/// Parsed build options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    defines: BTreeMap<String, DefineValue>,
}

impl BuildOptions {
    /// Parse an option string.
    ///
    /// # Errors
    /// [`Error::InvalidOptions`] naming the first token that is not a define.
    pub fn parse(options: &str) -> Result<Self> {
        let mut defines = BTreeMap::new();
        let mut tokens = options.split_whitespace();

        while let Some(token) = tokens.next() {
            let body = if token == "-D" {
                tokens
                    .next()
                    .ok_or_else(|| Error::InvalidOptions("'-D' without a name".into()))?
            } else if let Some(rest) = token.strip_prefix("-D") {
                rest
            } else {
                return Err(Error::InvalidOptions(format!("unrecognized option '{token}'")));
            };

            let (name, value) = match body.split_once('=') {
                Some((name, raw)) => (name, parse_value(name, raw)?),
                None => (body, DefineValue::Bool(true)),
            };

            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(Error::InvalidOptions(format!("invalid define name '{name}'")));
            }
            defines.insert(name.to_string(), value);
        }

        Ok(Self { defines })
    }

    pub fn get(&self, name: &str) -> Option<DefineValue> {
        self.defines.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DefineValue)> {
        self.defines.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.defines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }
}

impl fmt::Display for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.defines {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            match value {
                DefineValue::Bool(true) => write!(f, "-D{name}")?,
                DefineValue::UInt(v) => write!(f, "-D{name}={v}")?,
                other => write!(f, "-D{name}={other}")?,
            }
        }
        Ok(())
    }
}

fn parse_value(name: &str, raw: &str) -> Result<DefineValue> {
    match raw {
        "true" => Ok(DefineValue::Bool(true)),
        "false" => Ok(DefineValue::Bool(false)),
        _ => {
            if let Some(digits) = raw.strip_suffix('u') {
                return digits.parse::<u32>().map(DefineValue::UInt).map_err(|_| {
                    Error::InvalidOptions(format!("define '{name}' has invalid value '{raw}'"))
                });
            }
            if let Ok(v) = raw.parse::<u32>() {
                return Ok(DefineValue::UInt(v));
            }
            raw.parse::<i32>().map(DefineValue::Int).map_err(|_| {
                Error::InvalidOptions(format!("define '{name}' has invalid value '{raw}'"))
            })
        }
    }
}
