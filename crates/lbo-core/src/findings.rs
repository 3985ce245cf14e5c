use serde::{Deserialize, Serialize};

use crate::types::Money;

/// How a finding affects the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Debt payment scenarios exercised by a run, for downstream display
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentScenario {
    Amortizing,
    Bullet,
    CashFlowSweep,
    MixedStructure,
}

/// One typed diagnostic from any pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Stable code string, e.g. `liquidity_shortfall`
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    /// Signed numeric delta where the finding quantifies a discrepancy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Money>,
}

impl Finding {
    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Finding {
            severity: Severity::Warning,
            code: code.to_string(),
            message: message.into(),
            year: None,
            instrument: None,
            delta: None,
        }
    }

    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Finding {
            severity: Severity::Info,
            ..Finding::warning(code, message)
        }
    }

    pub fn in_year(mut self, year: u32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn on_instrument(mut self, name: &str) -> Self {
        self.instrument = Some(name.to_string());
        self
    }

    pub fn with_delta(mut self, delta: Money) -> Self {
        self.delta = Some(delta);
        self
    }
}

/// Collects findings and payment-scenario tags from every pipeline stage.
#[derive(Debug, Default)]
pub struct ValidationReporter {
    findings: Vec<Finding>,
    scenarios: Vec<PaymentScenario>,
}

impl ValidationReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn tag(&mut self, scenario: PaymentScenario) {
        if !self.scenarios.contains(&scenario) {
            self.scenarios.push(scenario);
        }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.findings.iter().any(|f| f.code == code)
    }

    /// Flatten warnings/errors into display strings for the output envelope.
    pub fn warning_strings(&self) -> Vec<String> {
        self.findings
            .iter()
            .filter(|f| f.severity != Severity::Info)
            .map(|f| match f.year {
                Some(year) => format!("Year {year}: {}", f.message),
                None => f.message.clone(),
            })
            .collect()
    }

    pub fn into_parts(mut self) -> (Vec<Finding>, Vec<PaymentScenario>) {
        self.scenarios.sort();
        (self.findings, self.scenarios)
    }
}
