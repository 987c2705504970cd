/// Datastore requirement checks.
///
/// Workflows can gate themselves on the datastore with lines such as
/// `@require datastore Hydro version >= 1.2.3` or
/// `@require datastore Hydro configuration SystemLogin != sysadmin`.
/// The line is parsed once into a typed check; evaluation never indexes
/// tokens positionally.

use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Comparison operators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    LessThan,
    LessThanOrEqual,
    Equal,
    NotEqual,
    GreaterThanOrEqual,
    GreaterThan,
}

impl CompareOp {
    fn parse(token: &str) -> Result<CompareOp, String> {
        match token {
            "<" => Ok(CompareOp::LessThan),
            "<=" => Ok(CompareOp::LessThanOrEqual),
            "=" | "==" => Ok(CompareOp::Equal),
            "!=" => Ok(CompareOp::NotEqual),
            ">=" => Ok(CompareOp::GreaterThanOrEqual),
            ">" => Ok(CompareOp::GreaterThan),
            _ => Err(format!("unrecognized comparison operator \"{}\"", token)),
        }
    }

    fn holds(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::LessThan => ordering == Less,
            CompareOp::LessThanOrEqual => ordering != Greater,
            CompareOp::Equal => ordering == Equal,
            CompareOp::NotEqual => ordering != Equal,
            CompareOp::GreaterThanOrEqual => ordering != Less,
            CompareOp::GreaterThan => ordering == Greater,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEqual => "<=",
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "!=",
            CompareOp::GreaterThanOrEqual => ">=",
            CompareOp::GreaterThan => ">",
        };
        write!(f, "{}", symbol)
    }
}

// ---------------------------------------------------------------------------
// RequirementCheck
// ---------------------------------------------------------------------------

/// One parsed `@require datastore` line.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementCheck {
    /// Datastore name the requirement applies to.
    pub datastore: String,
    pub kind: CheckKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckKind {
    /// Compare the datastore version against a required version.
    Version { op: CompareOp, version: String },
    /// Compare a datastore configuration property against a value.
    Configuration {
        property: String,
        op: CompareOp,
        value: String,
    },
}

impl RequirementCheck {
    /// Parses a requirement line. The leading `@require` is optional; the
    /// `datastore NAME` prefix is mandatory, followed by either
    /// `version OP VALUE` or `configuration PROPERTY OP VALUE`.
    pub fn parse(text: &str) -> Result<RequirementCheck, String> {
        let mut tokens = text.split_whitespace().peekable();
        if tokens.peek() == Some(&"@require") {
            tokens.next();
        }
        if tokens.next() != Some("datastore") {
            return Err(format!("requirement \"{}\" must start with \"datastore\"", text));
        }
        let datastore = tokens
            .next()
            .ok_or_else(|| format!("requirement \"{}\" is missing the datastore name", text))?
            .to_string();

        let kind = match tokens.next() {
            Some("version") => {
                let op = CompareOp::parse(
                    tokens
                        .next()
                        .ok_or_else(|| format!("requirement \"{}\" is missing the operator", text))?,
                )?;
                let version = tokens
                    .next()
                    .ok_or_else(|| format!("requirement \"{}\" is missing the version", text))?
                    .to_string();
                CheckKind::Version { op, version }
            }
            Some("configuration") => {
                let property = tokens
                    .next()
                    .ok_or_else(|| format!("requirement \"{}\" is missing the property name", text))?
                    .to_string();
                let op = CompareOp::parse(
                    tokens
                        .next()
                        .ok_or_else(|| format!("requirement \"{}\" is missing the operator", text))?,
                )?;
                let value = tokens
                    .next()
                    .ok_or_else(|| format!("requirement \"{}\" is missing the value", text))?
                    .to_string();
                CheckKind::Configuration { property, op, value }
            }
            Some(other) => {
                return Err(format!(
                    "unrecognized requirement check type \"{}\" in \"{}\"",
                    other, text
                ))
            }
            None => return Err(format!("requirement \"{}\" is missing the check type", text)),
        };

        if tokens.next().is_some() {
            return Err(format!("requirement \"{}\" has trailing tokens", text));
        }
        Ok(RequirementCheck { datastore, kind })
    }

    /// Evaluates the check against the datastore's version string and
    /// configuration properties. A configuration check on a property the
    /// datastore does not expose is an error, not a failed check.
    pub fn is_satisfied(
        &self,
        version: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<bool, String> {
        match &self.kind {
            CheckKind::Version { op, version: required } => {
                Ok(op.holds(compare_versions(version, required)))
            }
            CheckKind::Configuration { property, op, value } => {
                let actual = properties.get(property).ok_or_else(|| {
                    format!(
                        "datastore {} has no configuration property \"{}\"",
                        self.datastore, property
                    )
                })?;
                Ok(op.holds(actual.as_str().cmp(value.as_str())))
            }
        }
    }
}

/// Compares two version strings over their first three numeric components;
/// missing or non-numeric components compare as zero ("1.2" == "1.2.0").
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parts = |v: &str| -> [u64; 3] {
        let mut out = [0u64; 3];
        for (i, component) in v.split('.').take(3).enumerate() {
            out[i] = component.trim().parse().unwrap_or(0);
        }
        out
    };
    parts(a).cmp(&parts(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_parse_version_check() {
        let check = RequirementCheck::parse("@require datastore Hydro version >= 1.2.3").unwrap();
        assert_eq!(check.datastore, "Hydro");
        assert_eq!(
            check.kind,
            CheckKind::Version { op: CompareOp::GreaterThanOrEqual, version: "1.2.3".to_string() }
        );
    }

    #[test]
    fn test_parse_configuration_check() {
        let check =
            RequirementCheck::parse("datastore Hydro configuration SystemLogin != sysadmin").unwrap();
        assert_eq!(
            check.kind,
            CheckKind::Configuration {
                property: "SystemLogin".to_string(),
                op: CompareOp::NotEqual,
                value: "sysadmin".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(RequirementCheck::parse("").is_err());
        assert!(RequirementCheck::parse("@require version >= 1.0").is_err());
        assert!(RequirementCheck::parse("datastore Hydro").is_err());
        assert!(RequirementCheck::parse("datastore Hydro version ~ 1.0").is_err());
        assert!(RequirementCheck::parse("datastore Hydro version >= 1.0 extra").is_err());
        assert!(RequirementCheck::parse("datastore Hydro snapshot >= 1.0").is_err());
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.2.3", "1.2.3"), Ordering::Equal);
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.10.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("0.9.9", "1.0.0"), Ordering::Less);
        // A fourth component is ignored.
        assert_eq!(compare_versions("1.2.3.4", "1.2.3"), Ordering::Equal);
    }

    #[test]
    fn test_version_check_evaluation() {
        let check = RequirementCheck::parse("datastore Hydro version >= 1.2.0").unwrap();
        let properties = BTreeMap::new();
        assert!(check.is_satisfied("1.2.3", &properties).unwrap());
        assert!(check.is_satisfied("1.2.0", &properties).unwrap());
        assert!(!check.is_satisfied("1.1.9", &properties).unwrap());
    }

    #[test]
    fn test_configuration_check_evaluation() {
        let check =
            RequirementCheck::parse("datastore Hydro configuration SystemLogin != sysadmin").unwrap();
        let mut properties = BTreeMap::new();
        properties.insert("SystemLogin".to_string(), "operator".to_string());
        assert!(check.is_satisfied("1.0.0", &properties).unwrap());
        properties.insert("SystemLogin".to_string(), "sysadmin".to_string());
        assert!(!check.is_satisfied("1.0.0", &properties).unwrap());
    }

    #[test]
    fn test_configuration_check_missing_property_is_an_error() {
        let check =
            RequirementCheck::parse("datastore Hydro configuration Missing == x").unwrap();
        assert!(check.is_satisfied("1.0.0", &BTreeMap::new()).is_err());
    }
}
