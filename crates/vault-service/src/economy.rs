use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::info;
use vault_core::{
    Address, ContentStore, EventStore, NonceTracker, PaymentAgreement, PermissionStore,
    PermissionType, RecordStore, VaultError, VaultEventKind,
};
use vault_economy::{Accrual, AgreementTerms, wei_to_ether};
use vault_platform::{AgreementView, BalanceResponse, MAX_DURATION_DAYS, OpenAgreementRequest};

use crate::VaultService;

impl<TStore, TContent, TEvents> VaultService<TStore, TContent, TEvents>
where
    TStore: RecordStore + PermissionStore + NonceTracker,
    TContent: ContentStore,
    TEvents: EventStore,
{
    /// Opens a streaming payment from an AI-access grantee to the record owner.
    ///
    /// The agreement ends no later than the payer's access does.
    pub async fn open_agreement(
        &self,
        request: OpenAgreementRequest,
        now: DateTime<Utc>,
    ) -> Result<PaymentAgreement> {
        if request.duration_days == 0 || request.duration_days > MAX_DURATION_DAYS {
            return Err(VaultError::InvalidDuration(request.duration_days).into());
        }

        let record = self.record(request.record_id).await?;
        if record.uploader != request.payee {
            return Err(VaultError::NotRecordOwner {
                caller: request.payee,
                record_id: record.id,
            }
            .into());
        }
        let access_until = self
            .access_until(request.payer, record.id, PermissionType::AiAccess, now)
            .await?
            .ok_or(VaultError::NoAccess {
                grantee: request.payer,
                record_id: record.id,
            })?;
        let requested_end = now + Duration::days(i64::from(request.duration_days));

        let terms = AgreementTerms {
            record_id: record.id,
            payer: request.payer,
            payee: request.payee,
            total_amount: request.total_amount,
            payment_per_interval: request.payment_per_interval,
            interval_secs: request.interval_secs,
            end_time: requested_end.min(access_until),
        };
        let agreement = self.treasury.write().await.open(terms, now)?;

        info!(
            agreement_id = agreement.id,
            record_id = agreement.record_id,
            payer = %agreement.payer,
            payee = %agreement.payee,
            total_amount = %agreement.total_amount,
            "payment agreement opened"
        );
        self.record_event(
            agreement.payer,
            VaultEventKind::AgreementOpened,
            now,
            json!({
                "agreement_id": agreement.id,
                "record_id": agreement.record_id,
                "payee": agreement.payee,
                "total_amount": agreement.total_amount.to_string(),
                "payment_per_interval": agreement.payment_per_interval.to_string(),
                "interval_secs": agreement.interval_secs,
                "end_time": agreement.end_time,
            }),
        )
        .await;

        Ok(agreement)
    }

    /// Settles every active agreement up to `now`.
    pub async fn accrue(&self, now: DateTime<Utc>) -> Result<Vec<Accrual>> {
        let accruals = self.treasury.write().await.accrue_all(now);
        self.record_accruals(&accruals, now).await;
        if !accruals.is_empty() {
            info!(agreements = accruals.len(), "payments accrued");
        }

        Ok(accruals)
    }

    /// Brings `payer`'s agreements on `record_id` in line with the AI access
    /// the payer still holds: they are capped at its expiry, or settled and
    /// closed when no access remains.
    pub(crate) async fn align_agreements_with_access(
        &self,
        record_id: u64,
        payer: Address,
        now: DateTime<Utc>,
    ) -> Result<Vec<Accrual>> {
        if let Some(until) = self
            .access_until(payer, record_id, PermissionType::AiAccess, now)
            .await?
        {
            self.treasury.write().await.limit_for(record_id, payer, until);
            return Ok(Vec::new());
        }

        let accruals = self.treasury.write().await.close_for(record_id, payer, now);
        self.record_accruals(&accruals, now).await;
        if !accruals.is_empty() {
            info!(record_id, %payer, agreements = accruals.len(), "agreements closed on lost access");
        }

        Ok(accruals)
    }

    async fn record_accruals(&self, accruals: &[Accrual], now: DateTime<Utc>) {
        for accrual in accruals {
            self.record_event(
                accrual.payee,
                VaultEventKind::PaymentAccrued,
                now,
                json!({
                    "agreement_id": accrual.agreement_id,
                    "amount": accrual.amount.to_string(),
                    "closed": accrual.closed,
                }),
            )
            .await;
        }
    }

    pub async fn agreements(&self, party: Address, now: DateTime<Utc>) -> Result<Vec<AgreementView>> {
        let agreements = self.treasury.read().await.agreements_for(party);
        let views = agreements
            .into_iter()
            .map(|agreement| AgreementView::new(agreement, now))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(views)
    }

    pub async fn balance(&self, payee: Address) -> Result<BalanceResponse> {
        let balance_wei = self.treasury.read().await.balance(payee);
        Ok(BalanceResponse {
            payee,
            balance_wei,
            balance_ether: wei_to_ether(balance_wei)?,
        })
    }

    /// Empties the payee's balance and returns the withdrawn amount.
    pub async fn withdraw(&self, payee: Address, now: DateTime<Utc>) -> Result<BalanceResponse> {
        let amount = self.treasury.write().await.withdraw(payee)?;

        info!(%payee, amount = %amount, "balance withdrawn");
        self.record_event(
            payee,
            VaultEventKind::BalanceWithdrawn,
            now,
            json!({ "amount": amount.to_string() }),
        )
        .await;

        Ok(BalanceResponse {
            payee,
            balance_wei: amount,
            balance_ether: wei_to_ether(amount)?,
        })
    }
}
