//! Engine option declarations (`option name … type …`).

use crate::UciError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The value type of an engine option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionKind {
    Check,
    Spin,
    Combo,
    Button,
    String,
}

impl OptionKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "check" => Some(OptionKind::Check),
            "spin" => Some(OptionKind::Spin),
            "combo" => Some(OptionKind::Combo),
            "button" => Some(OptionKind::Button),
            "string" => Some(OptionKind::String),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptionKind::Check => "check",
            OptionKind::Spin => "spin",
            OptionKind::Combo => "combo",
            OptionKind::Button => "button",
            OptionKind::String => "string",
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An option advertised by the engine during the `uci` handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDecl {
    pub name: String,
    pub kind: OptionKind,
    pub default: Option<String>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    /// Allowed values of a combo option.
    pub vars: Vec<String>,
}

impl OptionDecl {
    pub fn new(name: &str, kind: OptionKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: None,
            min: None,
            max: None,
            vars: Vec::new(),
        }
    }

    pub fn spin(name: &str, default: i64, min: i64, max: i64) -> Self {
        Self {
            default: Some(default.to_string()),
            min: Some(min),
            max: Some(max),
            ..Self::new(name, OptionKind::Spin)
        }
    }

    pub fn check(name: &str, default: bool) -> Self {
        Self {
            default: Some(default.to_string()),
            ..Self::new(name, OptionKind::Check)
        }
    }

    /// Option names are compared case-insensitively.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }

    /// Whether `value` is acceptable for this option.
    pub fn accepts(&self, value: Option<&str>) -> bool {
        match (self.kind, value) {
            (OptionKind::Button, value) => value.is_none(),
            (_, None) => false,
            (OptionKind::Check, Some(v)) => {
                v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false")
            }
            (OptionKind::Spin, Some(v)) => match v.parse::<i64>() {
                Ok(n) => {
                    self.min.map_or(true, |min| n >= min) && self.max.map_or(true, |max| n <= max)
                }
                Err(_) => false,
            },
            (OptionKind::Combo, Some(v)) => self.vars.iter().any(|var| var.eq_ignore_ascii_case(v)),
            (OptionKind::String, Some(_)) => true,
        }
    }

    /// Parse the part of an `option` line after the `option` keyword.
    pub fn parse(rest: &str) -> Result<Self, UciError> {
        let parts: Vec<&str> = rest.split_whitespace().collect();
        if parts.first() != Some(&"name") {
            return Err(UciError::ParseError(format!("option: expected 'name' in '{}'", rest)));
        }
        let type_at = parts
            .iter()
            .position(|&p| p == "type")
            .ok_or_else(|| UciError::ParseError(format!("option: missing 'type' in '{}'", rest)))?;
        if type_at <= 1 {
            return Err(UciError::ParseError("option: missing option name".to_string()));
        }
        let name = parts[1..type_at].join(" ");
        let kind = parts
            .get(type_at + 1)
            .and_then(|t| OptionKind::parse(t))
            .ok_or_else(|| UciError::ParseError(format!("option: unknown type in '{}'", rest)))?;

        let mut decl = OptionDecl::new(&name, kind);
        let mut i = type_at + 2;
        while i < parts.len() {
            let keyword = parts[i];
            i += 1;
            // Values run until the next keyword; string defaults may hold spaces.
            let start = i;
            while i < parts.len() && !matches!(parts[i], "default" | "min" | "max" | "var") {
                i += 1;
            }
            let value = parts[start..i].join(" ");
            match keyword {
                "default" => {
                    decl.default = Some(if value == "<empty>" { String::new() } else { value });
                }
                "min" => decl.min = value.parse().ok(),
                "max" => decl.max = value.parse().ok(),
                "var" => decl.vars.push(value),
                _ => {}
            }
        }
        Ok(decl)
    }

    /// Format as an `option` line.
    pub fn to_uci(&self) -> String {
        let mut line = format!("option name {} type {}", self.name, self.kind);
        if let Some(ref d) = self.default {
            if d.is_empty() {
                line.push_str(" default <empty>");
            } else {
                line.push_str(&format!(" default {}", d));
            }
        }
        if let Some(min) = self.min {
            line.push_str(&format!(" min {}", min));
        }
        if let Some(max) = self.max {
            line.push_str(&format!(" max {}", max));
        }
        for var in &self.vars {
            line.push_str(&format!(" var {}", var));
        }
        line
    }
}
