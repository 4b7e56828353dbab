use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use vault_core::{Address, PaymentAgreement};

pub const WEI_DECIMALS: u32 = 18;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EconomyError {
    #[error("agreement amounts must be positive")]
    ZeroAmount,

    #[error("payment interval must be at least one second")]
    ZeroInterval,

    #[error("agreement must end after it starts")]
    EndsBeforeStart,

    #[error("payment per interval exceeds the total amount")]
    IntervalExceedsTotal,

    #[error("payer and payee must differ")]
    SelfPayment,

    #[error("agreement {0} not found")]
    AgreementNotFound(u64),

    #[error("{0} has no balance to withdraw")]
    NothingToWithdraw(Address),

    #[error("{0} wei cannot be represented in ether")]
    AmountOutOfRange(u128),
}

pub type Result<T> = std::result::Result<T, EconomyError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementTerms {
    pub record_id: u64,
    pub payer: Address,
    pub payee: Address,
    pub total_amount: u128,
    pub payment_per_interval: u128,
    pub interval_secs: u64,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Accrual {
    pub agreement_id: u64,
    pub payee: Address,
    pub amount: u128,
    pub closed: bool,
}

/// Amount owed under `agreement` at `now`: one payment per fully elapsed
/// interval, never more than the total.
pub fn amount_due(agreement: &PaymentAgreement, now: DateTime<Utc>) -> u128 {
    if now <= agreement.start_time || agreement.interval_secs == 0 {
        return 0;
    }

    let until = now.min(agreement.end_time);
    let elapsed = (until - agreement.start_time).num_seconds().max(0) as u64;
    let intervals = u128::from(elapsed / agreement.interval_secs);

    intervals
        .saturating_mul(agreement.payment_per_interval)
        .min(agreement.total_amount)
}

/// Brings `agreement` up to date and returns the newly paid amount.
pub fn accrue(agreement: &mut PaymentAgreement, now: DateTime<Utc>) -> u128 {
    if !agreement.is_active {
        return 0;
    }

    let due = amount_due(agreement, now);
    let delta = due.saturating_sub(agreement.paid_amount);
    agreement.paid_amount = agreement.paid_amount.max(due);

    if agreement.is_expired(now) || agreement.paid_amount >= agreement.total_amount {
        agreement.is_active = false;
    }

    delta
}

fn settle(
    agreement: &mut PaymentAgreement,
    balances: &mut HashMap<Address, u128>,
    now: DateTime<Utc>,
    close: bool,
) -> Option<Accrual> {
    let was_active = agreement.is_active;
    let amount = accrue(agreement, now);
    if close {
        agreement.is_active = false;
    }
    let closed = was_active && !agreement.is_active;
    if amount == 0 && !closed {
        return None;
    }

    if amount > 0 {
        let balance = balances.entry(agreement.payee).or_insert(0);
        *balance = balance.saturating_add(amount);
    }
    debug!(agreement_id = agreement.id, amount, closed, "agreement accrued");

    Some(Accrual {
        agreement_id: agreement.id,
        payee: agreement.payee,
        amount,
        closed,
    })
}

pub fn wei_to_ether(wei: u128) -> Result<Decimal> {
    let mantissa = i128::try_from(wei).map_err(|_| EconomyError::AmountOutOfRange(wei))?;
    Decimal::try_from_i128_with_scale(mantissa, WEI_DECIMALS)
        .map(|value| value.normalize())
        .map_err(|_| EconomyError::AmountOutOfRange(wei))
}

/// Agreements and the payee balances they accrue into.
#[derive(Debug, Default)]
pub struct Treasury {
    agreements: BTreeMap<u64, PaymentAgreement>,
    balances: HashMap<Address, u128>,
    next_id: u64,
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, terms: AgreementTerms, now: DateTime<Utc>) -> Result<PaymentAgreement> {
        if terms.total_amount == 0 || terms.payment_per_interval == 0 {
            return Err(EconomyError::ZeroAmount);
        }
        if terms.interval_secs == 0 {
            return Err(EconomyError::ZeroInterval);
        }
        if terms.end_time <= now {
            return Err(EconomyError::EndsBeforeStart);
        }
        if terms.payment_per_interval > terms.total_amount {
            return Err(EconomyError::IntervalExceedsTotal);
        }
        if terms.payer == terms.payee {
            return Err(EconomyError::SelfPayment);
        }

        self.next_id += 1;
        let agreement = PaymentAgreement {
            id: self.next_id,
            record_id: terms.record_id,
            payer: terms.payer,
            payee: terms.payee,
            total_amount: terms.total_amount,
            paid_amount: 0,
            payment_per_interval: terms.payment_per_interval,
            interval_secs: terms.interval_secs,
            start_time: now,
            end_time: terms.end_time,
            is_active: true,
        };
        self.agreements.insert(agreement.id, agreement.clone());

        Ok(agreement)
    }

    pub fn agreement(&self, id: u64) -> Result<&PaymentAgreement> {
        self.agreements
            .get(&id)
            .ok_or(EconomyError::AgreementNotFound(id))
    }

    pub fn agreements_for(&self, party: Address) -> Vec<PaymentAgreement> {
        self.agreements
            .values()
            .filter(|agreement| agreement.payee == party || agreement.payer == party)
            .cloned()
            .collect()
    }

    pub fn accrue_all(&mut self, now: DateTime<Utc>) -> Vec<Accrual> {
        self.agreements
            .values_mut()
            .filter_map(|agreement| settle(agreement, &mut self.balances, now, false))
            .collect()
    }

    /// Settles `payer`'s active agreements on `record_id` up to `now` and
    /// closes them. Used when the payer loses access to the record.
    pub fn close_for(&mut self, record_id: u64, payer: Address, now: DateTime<Utc>) -> Vec<Accrual> {
        self.agreements
            .values_mut()
            .filter(|agreement| {
                agreement.is_active && agreement.record_id == record_id && agreement.payer == payer
            })
            .filter_map(|agreement| settle(agreement, &mut self.balances, now, true))
            .collect()
    }

    /// Pulls the end of `payer`'s active agreements on `record_id` in to
    /// `until` where they would otherwise run longer.
    pub fn limit_for(&mut self, record_id: u64, payer: Address, until: DateTime<Utc>) {
        for agreement in self.agreements.values_mut().filter(|agreement| {
            agreement.is_active && agreement.record_id == record_id && agreement.payer == payer
        }) {
            agreement.end_time = agreement.end_time.min(until);
        }
    }

    pub fn balance(&self, payee: Address) -> u128 {
        self.balances.get(&payee).copied().unwrap_or(0)
    }

    pub fn withdraw(&mut self, payee: Address) -> Result<u128> {
        match self.balances.remove(&payee) {
            Some(amount) if amount > 0 => Ok(amount),
            _ => Err(EconomyError::NothingToWithdraw(payee)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    }

    fn payer() -> Address {
        Address::from_bytes([0xAA; 20])
    }

    fn payee() -> Address {
        Address::from_bytes([0xBB; 20])
    }

    fn hourly_terms() -> AgreementTerms {
        AgreementTerms {
            record_id: 4,
            payer: payer(),
            payee: payee(),
            total_amount: 10 * ONE_ETHER,
            payment_per_interval: ONE_ETHER,
            interval_secs: 3600,
            end_time: start() + Duration::hours(24),
        }
    }

    #[test]
    fn pays_only_for_completed_intervals() {
        let mut treasury = Treasury::new();
        let agreement = treasury.open(hourly_terms(), start()).unwrap();

        assert_eq!(amount_due(&agreement, start()), 0);
        assert_eq!(amount_due(&agreement, start() + Duration::minutes(59)), 0);
        assert_eq!(amount_due(&agreement, start() + Duration::minutes(150)), 2 * ONE_ETHER);
    }

    #[test]
    fn accrual_is_capped_and_closes_the_agreement() {
        let mut treasury = Treasury::new();
        let agreement = treasury.open(hourly_terms(), start()).unwrap();

        let first = treasury.accrue_all(start() + Duration::hours(3));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].amount, 3 * ONE_ETHER);
        assert!(!first[0].closed);

        let second = treasury.accrue_all(start() + Duration::hours(15));
        assert_eq!(second[0].amount, 7 * ONE_ETHER);
        assert!(second[0].closed);

        let stored = treasury.agreement(agreement.id).unwrap();
        assert_eq!(stored.paid_amount, stored.total_amount);
        assert!(!stored.is_active);
        assert_eq!(treasury.balance(payee()), 10 * ONE_ETHER);

        assert!(treasury.accrue_all(start() + Duration::hours(30)).is_empty());
    }

    #[test]
    fn agreements_past_end_time_become_inactive() {
        let mut treasury = Treasury::new();
        let mut terms = hourly_terms();
        terms.total_amount = 100 * ONE_ETHER;
        let agreement = treasury.open(terms, start()).unwrap();

        let accruals = treasury.accrue_all(start() + Duration::days(2));
        assert_eq!(accruals[0].amount, 24 * ONE_ETHER);
        assert!(accruals[0].closed);

        let stored = treasury.agreement(agreement.id).unwrap();
        assert!(!stored.is_active);
        assert!(stored.paid_amount <= stored.total_amount);
    }

    #[test]
    fn closing_settles_then_stops_further_charges() {
        let mut treasury = Treasury::new();
        let agreement = treasury.open(hourly_terms(), start()).unwrap();
        let mut other_record = hourly_terms();
        other_record.record_id = 5;
        let untouched = treasury.open(other_record, start()).unwrap();

        let closed = treasury.close_for(4, payer(), start() + Duration::minutes(150));
        assert_eq!(
            closed,
            vec![Accrual {
                agreement_id: agreement.id,
                payee: payee(),
                amount: 2 * ONE_ETHER,
                closed: true,
            }]
        );
        assert!(!treasury.agreement(agreement.id).unwrap().is_active);
        assert!(treasury.agreement(untouched.id).unwrap().is_active);

        let later = treasury.accrue_all(start() + Duration::hours(5));
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].agreement_id, untouched.id);
        assert_eq!(treasury.balance(payee()), 7 * ONE_ETHER);

        assert!(treasury.close_for(4, payer(), start() + Duration::hours(6)).is_empty());
    }

    #[test]
    fn limiting_an_agreement_caps_later_accrual() {
        let mut treasury = Treasury::new();
        let mut terms = hourly_terms();
        terms.total_amount = 100 * ONE_ETHER;
        let agreement = treasury.open(terms, start()).unwrap();

        treasury.limit_for(4, payer(), start() + Duration::hours(3));
        treasury.limit_for(4, payer(), start() + Duration::hours(10));
        assert_eq!(
            treasury.agreement(agreement.id).unwrap().end_time,
            start() + Duration::hours(3)
        );

        let accruals = treasury.accrue_all(start() + Duration::hours(8));
        assert_eq!(accruals[0].amount, 3 * ONE_ETHER);
        assert!(accruals[0].closed);
    }

    #[test]
    fn withdraw_drains_the_balance_once() {
        let mut treasury = Treasury::new();
        treasury.open(hourly_terms(), start()).unwrap();
        treasury.accrue_all(start() + Duration::hours(2));

        assert_eq!(treasury.withdraw(payee()).unwrap(), 2 * ONE_ETHER);
        assert_eq!(treasury.balance(payee()), 0);
        assert_eq!(
            treasury.withdraw(payee()),
            Err(EconomyError::NothingToWithdraw(payee()))
        );
    }

    #[test]
    fn invalid_terms_are_rejected() {
        let mut treasury = Treasury::new();

        let mut zero = hourly_terms();
        zero.total_amount = 0;
        assert_eq!(treasury.open(zero, start()), Err(EconomyError::ZeroAmount));

        let mut no_interval = hourly_terms();
        no_interval.interval_secs = 0;
        assert_eq!(treasury.open(no_interval, start()), Err(EconomyError::ZeroInterval));

        let mut past = hourly_terms();
        past.end_time = start();
        assert_eq!(treasury.open(past, start()), Err(EconomyError::EndsBeforeStart));

        let mut greedy = hourly_terms();
        greedy.payment_per_interval = greedy.total_amount + 1;
        assert_eq!(
            treasury.open(greedy, start()),
            Err(EconomyError::IntervalExceedsTotal)
        );

        let mut selfish = hourly_terms();
        selfish.payee = selfish.payer;
        assert_eq!(treasury.open(selfish, start()), Err(EconomyError::SelfPayment));
    }

    #[test]
    fn wei_renders_as_ether() {
        assert_eq!(wei_to_ether(ONE_ETHER).unwrap().to_string(), "1");
        assert_eq!(wei_to_ether(1_500_000_000_000_000).unwrap().to_string(), "0.0015");
        assert_eq!(wei_to_ether(0).unwrap().to_string(), "0");
        assert!(wei_to_ether(u128::MAX).is_err());
    }
}
