use algomon_types::{AlgorithmResult, MonitorError, ResultType, SerializerConfig};
use serde_json::Value;

use crate::wire::{WireResult, result_to_value};

/// Member holding the actual document in the wrapped format.
const RESULTS_ENVELOPE: &str = "results";
const PROFIT_LOSS: &str = "ProfitLoss";
/// Members only live results carry.
const LIVE_MARKERS: [&str; 2] = ["Holdings", "Cash"];

/// Reads and writes result documents.
///
/// The decoding rules are fixed at construction; two serializers with
/// different configurations can be used side by side.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultSerializer {
    config: SerializerConfig,
}

impl ResultSerializer {
    /// Create a serializer with the given rules.
    #[must_use]
    pub const fn new(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// The rules this serializer applies.
    #[must_use]
    pub const fn config(&self) -> SerializerConfig {
        self.config
    }

    /// Decode a result document from JSON text.
    ///
    /// # Errors
    /// Returns `MonitorError::InvalidResult` if the text is not JSON or not a
    /// result document.
    pub fn deserialize(&self, json: &str) -> Result<AlgorithmResult, MonitorError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| MonitorError::InvalidResult(e.to_string()))?;
        self.deserialize_value(value)
    }

    /// Decode a result document from an already parsed JSON value.
    ///
    /// A document wrapped as `{ "results": { .. } }` is unwrapped (and its
    /// `ProfitLoss` member dropped) according to the configuration. The result
    /// type is `Live` when the document carries live-only members.
    ///
    /// # Errors
    /// Returns `MonitorError::InvalidResult` if the value is not an object or
    /// its members have the wrong shape.
    pub fn deserialize_value(&self, value: Value) -> Result<AlgorithmResult, MonitorError> {
        let mut value = value;
        if self.config.unwrap_results_envelope
            && let Some(inner) = value.get_mut(RESULTS_ENVELOPE).map(Value::take)
        {
            value = inner;
            if self.config.strip_wrapped_profit_loss
                && let Some(obj) = value.as_object_mut()
            {
                obj.remove(PROFIT_LOSS);
            }
        }

        let Some(obj) = value.as_object() else {
            return Err(MonitorError::InvalidResult(
                "expected a JSON object".to_string(),
            ));
        };
        let result_type = if LIVE_MARKERS.iter().any(|k| obj.contains_key(*k)) {
            ResultType::Live
        } else {
            ResultType::Backtest
        };

        let wire: WireResult = serde_json::from_value(value)
            .map_err(|e| MonitorError::InvalidResult(e.to_string()))?;
        Ok(wire.into_result(result_type))
    }

    /// Encode a result in the engine's document shape.
    ///
    /// # Errors
    /// Returns `MonitorError::Serialize` if encoding fails.
    pub fn serialize(&self, result: &AlgorithmResult) -> Result<String, MonitorError> {
        serde_json::to_string_pretty(&result_to_value(result))
            .map_err(|e| MonitorError::Serialize(e.to_string()))
    }
}
