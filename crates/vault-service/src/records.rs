use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;
use vault_core::{
    Address, ContentStore, DataRecord, EventStore, NewRecord, NonceTracker, PermissionStore,
    RecordStore, VaultError, VaultEventKind,
};
use vault_platform::{UploadRecordRequest, UploadRecordResponse};

use crate::VaultService;

impl<TStore, TContent, TEvents> VaultService<TStore, TContent, TEvents>
where
    TStore: RecordStore + PermissionStore + NonceTracker,
    TContent: ContentStore,
    TEvents: EventStore,
{
    /// Pins `data` and registers it as a record owned by the uploader.
    pub async fn upload_record(
        &self,
        request: UploadRecordRequest,
        data: &[u8],
        now: DateTime<Utc>,
    ) -> Result<UploadRecordResponse> {
        if data.is_empty() {
            return Err(VaultError::EmptyPayload.into());
        }

        let cid = self
            .content
            .put(&request.file_name, data)
            .await
            .with_context(|| format!("failed to pin {}", request.file_name))?;

        let record = self
            .store
            .insert_record(NewRecord {
                uploader: request.owner,
                cid,
                data_type: request.data_type,
                file_name: request.file_name,
                upload_time: now,
            })
            .await?;

        info!(
            record_id = record.id,
            owner = %record.uploader,
            cid = %record.cid,
            data_type = %record.data_type,
            "record uploaded"
        );
        self.record_event(
            record.uploader,
            VaultEventKind::RecordUploaded,
            now,
            json!({
                "record_id": record.id,
                "cid": record.cid,
                "data_type": record.data_type,
                "file_name": record.file_name,
                "size": data.len(),
            }),
        )
        .await;

        let gateway_url = self.content.gateway_url(&record.cid);
        Ok(UploadRecordResponse {
            record,
            gateway_url,
        })
    }

    pub async fn list_records(&self, owner: Address) -> Result<Vec<DataRecord>> {
        self.store.records_by_uploader(owner).await
    }

    pub async fn record(&self, record_id: u64) -> Result<DataRecord> {
        self.store
            .record(record_id)
            .await?
            .ok_or_else(|| VaultError::RecordNotFound(record_id).into())
    }

    pub async fn record_content(&self, record_id: u64) -> Result<Vec<u8>> {
        let record = self.record(record_id).await?;
        self.content
            .get(&record.cid)
            .await
            .with_context(|| format!("failed to fetch content of record {record_id}"))
    }

    pub fn gateway_url(&self, record: &DataRecord) -> String {
        self.content.gateway_url(&record.cid)
    }
}
