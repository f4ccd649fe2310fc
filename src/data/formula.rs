//! Formula parsing for model specification.

use crate::error::{EdaError, Result};
use serde::{Deserialize, Serialize};

/// A parsed additive formula specifying a linear model.
///
/// Supports R-style additive syntax:
/// - `~ genotype` - intercept + genotype
/// - `~ genotype + nutrient + time` - intercept + three main effects
/// - `~ 0 + genotype` - no intercept
///
/// Interaction terms are not supported; the ranking model is additive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// Whether to include an intercept.
    pub intercept: bool,
    /// Main-effect variable names, in formula order.
    pub terms: Vec<String>,
    /// Original formula string.
    pub formula_str: String,
}

impl Formula {
    /// Parse a formula string.
    ///
    /// # Examples
    /// ```
    /// use microarray_eda::data::Formula;
    /// let f = Formula::parse("~ genotype + nutrient + time").unwrap();
    /// assert!(f.intercept);
    /// assert_eq!(f.terms.len(), 3);
    /// ```
    pub fn parse(formula: &str) -> Result<Self> {
        let formula_str = formula.to_string();
        let formula = formula.trim();

        if !formula.starts_with('~') {
            return Err(EdaError::FormulaParse(
                "Formula must start with '~'".to_string(),
            ));
        }

        let rhs = formula[1..].trim();
        if rhs.is_empty() {
            return Err(EdaError::FormulaParse(
                "Formula right-hand side is empty".to_string(),
            ));
        }

        let (intercept, rhs) = if rhs == "0" || rhs == "-1" {
            return Err(EdaError::FormulaParse(
                "Formula must have at least one term".to_string(),
            ));
        } else if rhs.starts_with("0 +") || rhs.starts_with("0+") {
            (
                false,
                rhs.trim_start_matches('0').trim_start_matches('+').trim(),
            )
        } else if rhs.starts_with("-1 +") || rhs.starts_with("-1+") {
            (
                false,
                rhs.trim_start_matches("-1").trim_start_matches('+').trim(),
            )
        } else {
            (true, rhs)
        };

        let mut terms = Vec::new();
        for term_str in rhs.split('+').map(|s| s.trim()) {
            if term_str.is_empty() {
                continue;
            }
            if term_str.contains('*') || term_str.contains(':') {
                return Err(EdaError::FormulaParse(format!(
                    "Interaction terms are not supported: {}",
                    term_str
                )));
            }
            // "1" is an explicit intercept, already on by default
            if term_str != "1" {
                terms.push(term_str.to_string());
            }
        }

        if terms.is_empty() && !intercept {
            return Err(EdaError::FormulaParse(
                "Formula must have at least one term".to_string(),
            ));
        }

        Ok(Self {
            intercept,
            terms,
            formula_str,
        })
    }

    /// Variable names used in the formula, deduplicated.
    pub fn variables(&self) -> Vec<&str> {
        let mut vars: Vec<&str> = self.terms.iter().map(|t| t.as_str()).collect();
        vars.sort();
        vars.dedup();
        vars
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "~ ")?;
        if !self.intercept {
            write!(f, "0 + ")?;
        }
        write!(f, "{}", self.terms.join(" + "))
    }
}
