use tracing::{debug, error};

use ucoin_core::error::UcoinError;
use ucoin_core::params::Parameters;
use ucoin_core::types::{AmNumber, Timestamp};

/// Monetary fields of an amendment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Issuance {
    pub dividend: u64,
    pub monetary_mass: u64,
}

/// Whether an amendment generated at `generated_at` issues a dividend.
pub fn is_dividend_epoch(params: &Parameters, generated_at: Timestamp) -> bool {
    let elapsed = generated_at - params.epoch0_start;
    elapsed > 0 && elapsed % params.ud_period == 0
}

/// Dividend and monetary mass of amendment `number`.
///
/// `previous_dividend` is the last dividend ever issued (or none yet) and
/// `previous_mass` the mass of the promoted predecessor. Recomputing with
/// the same inputs always gives the same result.
pub fn universal_dividend(
    params: &Parameters,
    number: AmNumber,
    generated_at: Timestamp,
    members_count: u64,
    previous_dividend: Option<u64>,
    previous_mass: u64,
) -> Result<Issuance, UcoinError> {
    if members_count == 0 || !is_dividend_epoch(params, generated_at) {
        return Ok(Issuance { dividend: 0, monetary_mass: previous_mass });
    }
    let floor = previous_dividend.unwrap_or(params.ud0);
    let grown = (previous_mass as u128 * params.ud_percent_num as u128)
        / (params.ud_percent_den as u128 * members_count as u128);
    let dividend = u64::try_from(grown)
        .map_err(|_| UcoinError::MonetaryOverflow(number))?
        .max(floor);
    if dividend > params.ud_cap {
        error!(number, dividend, cap = params.ud_cap, "dividend exceeds cap");
        return Err(UcoinError::DividendCapExceeded { dividend, cap: params.ud_cap });
    }
    let monetary_mass = dividend
        .checked_mul(members_count)
        .and_then(|issued| issued.checked_add(previous_mass))
        .ok_or(UcoinError::MonetaryOverflow(number))?;
    debug!(number, dividend, monetary_mass, members_count, "universal dividend");
    Ok(Issuance { dividend, monetary_mass })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Parameters {
        Parameters { ud_period: 100, epoch_length: 50, epoch0_start: 1_000, ..Default::default() }
    }

    #[test]
    fn no_dividend_outside_period() {
        let p = params();
        assert!(!is_dividend_epoch(&p, 1_000));
        assert!(!is_dividend_epoch(&p, 1_050));
        assert!(is_dividend_epoch(&p, 1_100));
        let out = universal_dividend(&p, 1, 1_050, 3, None, 500).unwrap();
        assert_eq!(out, Issuance { dividend: 0, monetary_mass: 500 });
    }

    #[test]
    fn first_dividend_is_ud0() {
        let p = params();
        let out = universal_dividend(&p, 2, 1_100, 4, None, 0).unwrap();
        assert_eq!(out, Issuance { dividend: 100, monetary_mass: 400 });
    }

    #[test]
    fn dividend_grows_with_mass() {
        let p = params();
        // 10% of 100_000 over 4 members = 2_500
        let out = universal_dividend(&p, 4, 1_200, 4, Some(100), 100_000).unwrap();
        assert_eq!(out, Issuance { dividend: 2_500, monetary_mass: 110_000 });
        // Never below the previous dividend.
        let out = universal_dividend(&p, 4, 1_200, 4, Some(3_000), 100_000).unwrap();
        assert_eq!(out.dividend, 3_000);
    }

    #[test]
    fn cap_and_overflow_are_integrity_errors() {
        let p = Parameters { ud_cap: 1_000, ..params() };
        let err = universal_dividend(&p, 4, 1_200, 1, Some(100), 100_000).unwrap_err();
        assert!(err.is_fatal());
        let p = Parameters { ud_cap: u64::MAX, ..params() };
        let err = universal_dividend(&p, 4, 1_200, 2, Some(u64::MAX / 2 + 1), 0).unwrap_err();
        assert!(matches!(err, UcoinError::MonetaryOverflow(4)));
    }
}
