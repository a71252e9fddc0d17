use serde::{Deserialize, Serialize};

/// Name of the provider that only relays fixes requested by other clients.
pub const PASSIVE_PROVIDER: &str = "passive";

/// Accuracy class of a provider (lower is better)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccuracyClass {
    #[serde(rename = "fine")]
    Fine,
    #[serde(rename = "coarse")]
    Coarse,
}

impl AccuracyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccuracyClass::Fine => "fine",
            AccuracyClass::Coarse => "coarse",
        }
    }
}

impl std::fmt::Display for AccuracyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AccuracyClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fine" => Ok(AccuracyClass::Fine),
            "coarse" => Ok(AccuracyClass::Coarse),
            _ => Err(format!("Unknown accuracy class: {}", s)),
        }
    }
}

/// Power draw class of a provider (lower is better)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PowerClass {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "high")]
    High,
}

impl PowerClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerClass::Low => "low",
            PowerClass::Medium => "medium",
            PowerClass::High => "high",
        }
    }

    /// Next looser requirement, `None` once nothing is left to loosen
    pub fn loosen(&self) -> Option<Self> {
        match self {
            PowerClass::Low => Some(PowerClass::Medium),
            PowerClass::Medium => Some(PowerClass::High),
            PowerClass::High => None,
        }
    }
}

impl std::fmt::Display for PowerClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PowerClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(PowerClass::Low),
            "medium" => Ok(PowerClass::Medium),
            "high" => Ok(PowerClass::High),
            _ => Err(format!("Unknown power class: {}", s)),
        }
    }
}

/// Requirements used to pick a location provider.
///
/// `None` for accuracy or power means "no requirement".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    pub accuracy: Option<AccuracyClass>,
    pub power: Option<PowerClass>,
    pub altitude_required: bool,
    pub bearing_required: bool,
    pub speed_required: bool,
    pub cost_allowed: bool,
}

impl Criteria {
    /// Profile used when registering location listeners: coarse, low power,
    /// no altitude/bearing/speed, cost allowed.
    pub fn listener_profile() -> Self {
        Self {
            accuracy: Some(AccuracyClass::Coarse),
            power: Some(PowerClass::Low),
            altitude_required: false,
            bearing_required: false,
            speed_required: false,
            cost_allowed: true,
        }
    }

    pub fn satisfied_by(&self, provider: &ProviderProperties) -> bool {
        if let Some(accuracy) = self.accuracy {
            if provider.accuracy > accuracy {
                return false;
            }
        }
        if let Some(power) = self.power {
            if provider.power > power {
                return false;
            }
        }
        if self.altitude_required && !provider.supports_altitude {
            return false;
        }
        if self.bearing_required && !provider.supports_bearing {
            return false;
        }
        if self.speed_required && !provider.supports_speed {
            return false;
        }
        if !self.cost_allowed && provider.has_monetary_cost {
            return false;
        }
        true
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            accuracy: None,
            power: None,
            altitude_required: false,
            bearing_required: false,
            speed_required: false,
            cost_allowed: true,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Static description of a location provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProperties {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub accuracy: AccuracyClass,
    pub power: PowerClass,
    #[serde(default)]
    pub supports_altitude: bool,
    #[serde(default)]
    pub supports_bearing: bool,
    #[serde(default)]
    pub supports_speed: bool,
    #[serde(default)]
    pub has_monetary_cost: bool,
}

impl ProviderProperties {
    pub fn new(name: impl Into<String>, accuracy: AccuracyClass, power: PowerClass) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            accuracy,
            power,
            supports_altitude: false,
            supports_bearing: false,
            supports_speed: false,
            has_monetary_cost: false,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_passive(&self) -> bool {
        self.name == PASSIVE_PROVIDER
    }
}
