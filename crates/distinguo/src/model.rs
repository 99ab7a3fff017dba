//! Leakage models: intermediate values to predicted leakage.

use distinguo_core::Hypotheses;

use crate::error::ConfigError;

/// Maps intermediate values to predicted leakage.
pub trait LeakageModel: Send {
    /// Predicted leakage, same shape as `values`.
    fn leak(&self, values: &Hypotheses<u32>) -> Hypotheses<f64>;

    /// Whether every prediction is 0 or 1.
    fn is_binary(&self) -> bool {
        false
    }

    /// Model name, used in logs and errors.
    fn name(&self) -> String;
}

/// The intermediate value itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Value;

impl LeakageModel for Value {
    fn leak(&self, values: &Hypotheses<u32>) -> Hypotheses<f64> {
        values.map(f64::from)
    }

    fn name(&self) -> String {
        "Value".to_string()
    }
}

/// Number of set bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HammingWeight;

impl LeakageModel for HammingWeight {
    fn leak(&self, values: &Hypotheses<u32>) -> Hypotheses<f64> {
        values.map(|v| f64::from(v.count_ones()))
    }

    fn name(&self) -> String {
        "HammingWeight".to_string()
    }
}

/// A single bit of the intermediate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monobit {
    bit: u32,
}

impl Monobit {
    /// Select bit `bit` (0 is the least significant).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBit`] if `bit >= 32`.
    pub fn new(bit: u32) -> Result<Self, ConfigError> {
        if bit >= u32::BITS {
            return Err(ConfigError::InvalidBit(bit));
        }
        Ok(Self { bit })
    }

    /// Selected bit.
    pub fn bit(&self) -> u32 {
        self.bit
    }
}

impl LeakageModel for Monobit {
    fn leak(&self, values: &Hypotheses<u32>) -> Hypotheses<f64> {
        let bit = self.bit;
        values.map(move |v| f64::from((v >> bit) & 1))
    }

    fn is_binary(&self) -> bool {
        true
    }

    fn name(&self) -> String {
        format!("Monobit({})", self.bit)
    }
}
