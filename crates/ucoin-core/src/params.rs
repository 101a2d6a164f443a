use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::*;
use crate::error::UcoinError;
use crate::types::Timestamp;

/// Currency parameters shared by every node of a currency.
///
/// Loaded from JSON; missing fields take the protocol defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub currency: String,
    /// `generated_at` of amendment #0.
    pub epoch0_start: Timestamp,
    /// Seconds between two amendments.
    pub epoch_length: i64,
    pub consensus_num: u64,
    pub consensus_den: u64,
    pub ud0: u64,
    pub ud_period: i64,
    pub ud_percent_num: u64,
    pub ud_percent_den: u64,
    /// Maximum dividend per member per epoch.
    pub ud_cap: u64,
    /// Age after which a confirmed IN membership must be renewed.
    pub ms_expires: i64,
    pub algorithm: String,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.into(),
            epoch0_start: DEFAULT_EPOCH0_START,
            epoch_length: DEFAULT_EPOCH_LENGTH,
            consensus_num: CONSENSUS_NUM,
            consensus_den: CONSENSUS_DEN,
            ud0: DEFAULT_UD0,
            ud_period: DEFAULT_UD_PERIOD,
            ud_percent_num: UD_PERCENT_NUM,
            ud_percent_den: UD_PERCENT_DEN,
            ud_cap: DEFAULT_UD_CAP,
            ms_expires: DEFAULT_MS_EXPIRES,
            algorithm: DEFAULT_ALGORITHM.into(),
        }
    }
}

impl Parameters {
    pub fn from_json_str(json: &str) -> Result<Self, UcoinError> {
        let params: Parameters =
            serde_json::from_str(json).map_err(|e| UcoinError::InvalidParameters(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, UcoinError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            UcoinError::InvalidParameters(format!("reading {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), UcoinError> {
        if self.currency.is_empty() {
            return Err(UcoinError::InvalidParameters("currency must be named".into()));
        }
        if self.epoch_length <= 0 {
            return Err(UcoinError::InvalidParameters("epoch_length must be positive".into()));
        }
        if self.ud_period <= 0 {
            return Err(UcoinError::InvalidParameters("ud_period must be positive".into()));
        }
        if self.consensus_den == 0 || self.ud_percent_den == 0 {
            return Err(UcoinError::InvalidParameters("ratio denominators must be non-zero".into()));
        }
        if self.consensus_num > self.consensus_den {
            return Err(UcoinError::InvalidParameters("consensus ratio must not exceed 1".into()));
        }
        Ok(())
    }

    /// Quorum required to promote the follower of an amendment having
    /// `voters_count` voters: ceil(voters_count × consensus).
    pub fn next_votes(&self, voters_count: u64) -> u64 {
        let num = voters_count as u128 * self.consensus_num as u128;
        let den = self.consensus_den as u128;
        num.div_ceil(den) as u64
    }

    /// Accepted signing window `[start, start + epoch_length)` given the
    /// `generated_at` of the current amendment (if any).
    pub fn window(&self, current_generated: Option<Timestamp>) -> (Timestamp, Timestamp) {
        let start = current_generated.unwrap_or(self.epoch0_start);
        (start, start + self.epoch_length)
    }
}
