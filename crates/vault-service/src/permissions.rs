use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde_json::json;
use tracing::info;
use vault_chain::PermissionGrant;
use vault_core::{
    Address, ContentStore, EventStore, NewPermission, NonceTracker, Permission, PermissionStore,
    PermissionType, RecordStore, VaultError, VaultEventKind, to_hex_prefixed, unix_seconds,
};
use vault_platform::{
    GrantPermissionRequest, GrantPermissionResponse, MAX_DURATION_DAYS, PermissionView,
    RevokePermissionRequest,
};

use crate::VaultService;

impl<TStore, TContent, TEvents> VaultService<TStore, TContent, TEvents>
where
    TStore: RecordStore + PermissionStore + NonceTracker,
    TContent: ContentStore,
    TEvents: EventStore,
{
    /// Signs and stores a time-limited grant on one of the owner's records.
    ///
    /// The owner's nonce is consumed before signing, so a rejected signature
    /// still advances it.
    pub async fn grant_permission(
        &self,
        request: GrantPermissionRequest,
        now: DateTime<Utc>,
    ) -> Result<GrantPermissionResponse> {
        if request.duration_days == 0 || request.duration_days > MAX_DURATION_DAYS {
            return Err(VaultError::InvalidDuration(request.duration_days).into());
        }
        if request.grantee == request.owner {
            return Err(VaultError::SelfGrant.into());
        }

        let record = self.record(request.record_id).await?;
        if record.uploader != request.owner {
            return Err(VaultError::NotRecordOwner {
                caller: request.owner,
                record_id: record.id,
            }
            .into());
        }

        // Whole seconds, matching the uint256 the contract sees.
        let expiry_time =
            now.trunc_subsecs(0) + Duration::days(i64::from(request.duration_days));
        let expiry_secs = unix_seconds(expiry_time);

        let nonce = self.store.next_nonce(request.owner).await?;
        let grant = PermissionGrant {
            owner: request.owner,
            grantee: request.grantee,
            record_id: record.id,
            expiry_time: expiry_secs,
            permission_type: request.permission_type,
            nonce,
        };
        let signed = self
            .signer
            .sign(&grant)
            .await
            .context("failed to sign permission grant")?;

        let permission = self
            .store
            .insert_permission(NewPermission {
                record_id: record.id,
                owner: request.owner,
                grantee: request.grantee,
                permission_type: request.permission_type,
                expiry_time,
                nonce,
                signature: signed.signature,
                granted_at: now,
            })
            .await?;

        info!(
            permission_id = permission.id,
            record_id = record.id,
            owner = %permission.owner,
            grantee = %permission.grantee,
            permission_type = %permission.permission_type,
            nonce,
            "permission granted"
        );
        self.record_event(
            permission.owner,
            VaultEventKind::PermissionGranted,
            now,
            json!({
                "permission_id": permission.id,
                "record_id": record.id,
                "grantee": permission.grantee,
                "permission_type": permission.permission_type,
                "expiry_time": expiry_secs,
                "nonce": nonce,
            }),
        )
        .await;

        Ok(GrantPermissionResponse {
            permission_id: permission.id,
            expiry_time,
            nonce,
            message_hash: to_hex_prefixed(&signed.message_hash),
            signature: signed.signature,
        })
    }

    pub async fn revoke_permission(
        &self,
        request: RevokePermissionRequest,
        now: DateTime<Utc>,
    ) -> Result<Permission> {
        let permission = self
            .store
            .permission(request.permission_id)
            .await?
            .ok_or(VaultError::PermissionNotFound(request.permission_id))?;

        if permission.owner != request.owner {
            return Err(VaultError::NotPermissionOwner {
                caller: request.owner,
                permission_id: permission.id,
            }
            .into());
        }
        if permission.revoked_at.is_some() {
            return Err(VaultError::AlreadyRevoked(permission.id).into());
        }
        if permission.is_expired(now) {
            return Err(VaultError::AlreadyExpired(permission.id).into());
        }

        let revoked = self.store.mark_revoked(permission.id, now).await?;
        if revoked.permission_type == PermissionType::AiAccess {
            self.align_agreements_with_access(revoked.record_id, revoked.grantee, now)
                .await?;
        }

        info!(
            permission_id = revoked.id,
            record_id = revoked.record_id,
            grantee = %revoked.grantee,
            "permission revoked"
        );
        self.record_event(
            revoked.owner,
            VaultEventKind::PermissionRevoked,
            now,
            json!({
                "permission_id": revoked.id,
                "record_id": revoked.record_id,
                "grantee": revoked.grantee,
            }),
        )
        .await;

        Ok(revoked)
    }

    pub async fn list_permissions(
        &self,
        owner: Address,
        now: DateTime<Utc>,
    ) -> Result<Vec<PermissionView>> {
        let permissions = self.store.permissions_by_owner(owner).await?;
        Ok(permissions
            .into_iter()
            .map(|permission| PermissionView::new(permission, now))
            .collect())
    }

    pub async fn has_access(
        &self,
        grantee: Address,
        record_id: u64,
        requested: PermissionType,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self
            .access_until(grantee, record_id, requested, now)
            .await?
            .is_some())
    }

    /// Latest expiry among the grantee's active permissions that cover
    /// `requested`, or `None` without access.
    pub async fn access_until(
        &self,
        grantee: Address,
        record_id: u64,
        requested: PermissionType,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let permissions = self.store.permissions_for_record(record_id).await?;
        Ok(permissions
            .iter()
            .filter(|permission| permission.allows(grantee, requested, now))
            .map(|permission| permission.expiry_time)
            .max())
    }
}
