use crate::config::toml_config::MultiplierConfig;
use crate::domain::ports::{MultiplierContext, MultiplierPolicy};
use crate::utils::error::{LevelUpError, Result};
use crate::utils::validation::{validate_factor, validate_range, validate_required_field};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Declarative policy definitions accepted in `[multiplier.policies.<name>]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyKind {
    /// Applies during one calendar month (1-12).
    Month { month: u32, factor: f64 },
    Weekend { factor: f64 },
    /// Inclusive on both ends.
    DateRange {
        starts: NaiveDate,
        ends: NaiveDate,
        factor: f64,
    },
    Constant { factor: f64 },
}

impl PolicyKind {
    pub fn validate(&self, name: &str) -> Result<()> {
        let field = format!("multiplier.policies.{}", name);
        match self {
            PolicyKind::Month { month, factor } => {
                validate_range(&format!("{}.month", field), *month, 1, 12)?;
                validate_factor(&format!("{}.factor", field), *factor)
            }
            PolicyKind::Weekend { factor } | PolicyKind::Constant { factor } => {
                validate_factor(&format!("{}.factor", field), *factor)
            }
            PolicyKind::DateRange {
                starts,
                ends,
                factor,
            } => {
                if ends < starts {
                    return Err(LevelUpError::InvalidConfigValueError {
                        field: format!("{}.ends", field),
                        value: ends.to_string(),
                        reason: format!("End date is before start date {}", starts),
                    });
                }
                validate_factor(&format!("{}.factor", field), *factor)
            }
        }
    }

    pub fn build(&self, name: &str) -> Arc<dyn MultiplierPolicy> {
        let name = name.to_string();
        match *self {
            PolicyKind::Month { month, factor } => Arc::new(MonthMultiplier {
                name,
                month,
                factor,
            }),
            PolicyKind::Weekend { factor } => Arc::new(WeekendMultiplier { name, factor }),
            PolicyKind::DateRange {
                starts,
                ends,
                factor,
            } => Arc::new(DateRangeMultiplier {
                name,
                starts,
                ends,
                factor,
            }),
            PolicyKind::Constant { factor } => Arc::new(ConstantMultiplier { name, factor }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonthMultiplier {
    name: String,
    month: u32,
    factor: f64,
}

impl MonthMultiplier {
    pub fn new(name: impl Into<String>, month: u32, factor: f64) -> Self {
        Self {
            name: name.into(),
            month,
            factor,
        }
    }
}

impl MultiplierPolicy for MonthMultiplier {
    fn name(&self) -> &str {
        &self.name
    }

    fn qualifies(&self, context: &MultiplierContext<'_>) -> bool {
        context.now.month() == self.month
    }

    fn multiplier(&self, _context: &MultiplierContext<'_>) -> f64 {
        self.factor
    }
}

#[derive(Debug, Clone)]
pub struct WeekendMultiplier {
    name: String,
    factor: f64,
}

impl MultiplierPolicy for WeekendMultiplier {
    fn name(&self) -> &str {
        &self.name
    }

    fn qualifies(&self, context: &MultiplierContext<'_>) -> bool {
        matches!(context.now.weekday(), Weekday::Sat | Weekday::Sun)
    }

    fn multiplier(&self, _context: &MultiplierContext<'_>) -> f64 {
        self.factor
    }
}

#[derive(Debug, Clone)]
pub struct DateRangeMultiplier {
    name: String,
    starts: NaiveDate,
    ends: NaiveDate,
    factor: f64,
}

impl MultiplierPolicy for DateRangeMultiplier {
    fn name(&self) -> &str {
        &self.name
    }

    fn qualifies(&self, context: &MultiplierContext<'_>) -> bool {
        let today = context.now.date_naive();
        today >= self.starts && today <= self.ends
    }

    fn multiplier(&self, _context: &MultiplierContext<'_>) -> f64 {
        self.factor
    }
}

#[derive(Debug, Clone)]
pub struct ConstantMultiplier {
    name: String,
    factor: f64,
}

impl MultiplierPolicy for ConstantMultiplier {
    fn name(&self) -> &str {
        &self.name
    }

    fn qualifies(&self, _context: &MultiplierContext<'_>) -> bool {
        true
    }

    fn multiplier(&self, _context: &MultiplierContext<'_>) -> f64 {
        self.factor
    }
}

/// Maps a configuration key to a constructed policy. Built once at startup.
#[derive(Clone, Default)]
pub struct MultiplierRegistry {
    policies: HashMap<String, Arc<dyn MultiplierPolicy>>,
}

impl fmt::Debug for MultiplierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiplierRegistry")
            .field("policies", &self.names())
            .finish()
    }
}

impl MultiplierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: &BTreeMap<String, PolicyKind>) -> Result<Self> {
        let mut registry = Self::new();
        for (name, kind) in definitions {
            kind.validate(name)?;
            registry.register_arc(kind.build(name));
        }
        Ok(registry)
    }

    /// Registers under `policy.name()`, replacing an existing entry with the same key.
    pub fn register<P: MultiplierPolicy + 'static>(&mut self, policy: P) -> &mut Self {
        self.register_arc(Arc::new(policy))
    }

    pub fn register_arc(&mut self, policy: Arc<dyn MultiplierPolicy>) -> &mut Self {
        self.policies.insert(policy.name().to_string(), policy);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn MultiplierPolicy>> {
        self.policies
            .get(name)
            .cloned()
            .ok_or_else(|| LevelUpError::UnknownMultiplierPolicy {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Picks the multiplier for a grant. Disabled resolvers always answer 1.
#[derive(Clone, Default)]
pub struct MultiplierResolver {
    active: Option<Arc<dyn MultiplierPolicy>>,
}

impl fmt::Debug for MultiplierResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiplierResolver")
            .field("active", &self.active.as_ref().map(|p| p.name().to_string()))
            .finish()
    }
}

impl MultiplierResolver {
    pub fn disabled() -> Self {
        Self { active: None }
    }

    pub fn with_policy(policy: Arc<dyn MultiplierPolicy>) -> Self {
        Self {
            active: Some(policy),
        }
    }

    pub fn from_config(config: &MultiplierConfig, registry: &MultiplierRegistry) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let selector = validate_required_field("multiplier.policy", &config.policy)?;
        let policy = registry.get(selector)?;
        tracing::info!("Multiplier policy '{}' enabled", policy.name());
        Ok(Self::with_policy(policy))
    }

    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    pub fn resolve(&self, context: &MultiplierContext<'_>) -> f64 {
        match &self.active {
            Some(policy) if policy.qualifies(context) => {
                let multiplier = policy.multiplier(context);
                tracing::debug!(
                    "Policy '{}' applies x{} to {} points for {}",
                    policy.name(),
                    multiplier,
                    context.base_amount,
                    context.subject
                );
                multiplier
            }
            _ => 1.0,
        }
    }
}

/// Scales `amount`, rounding to the nearest whole point.
pub fn apply_multiplier(amount: u64, multiplier: f64) -> Result<u64> {
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(LevelUpError::invalid_amount(format!(
            "multiplier must be finite and non-negative, got {}",
            multiplier
        )));
    }

    if multiplier == 1.0 {
        return Ok(amount);
    }

    // whole factors stay in integer arithmetic so large totals keep every point
    if multiplier.fract() == 0.0 && multiplier < u64::MAX as f64 {
        return amount.checked_mul(multiplier as u64).ok_or_else(|| {
            LevelUpError::invalid_amount(format!(
                "{} x {} does not fit in a point total",
                amount, multiplier
            ))
        });
    }

    let scaled = (amount as f64 * multiplier).round();
    if scaled >= u64::MAX as f64 {
        return Err(LevelUpError::invalid_amount(format!(
            "{} x {} does not fit in a point total",
            amount, multiplier
        )));
    }
    Ok(scaled as u64)
}
