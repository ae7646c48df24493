use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::dao::{
    models::{GuildSettings, MemberRecord},
    roster_store::RosterStore,
    storage::{StorageError, StorageResult},
};

use super::{
    config::AirtableConfig,
    error::{AirtableDaoError, AirtableResult},
    models::{
        AirtableRecord, DeleteRecordResponse, GUILD_SETTINGS_TABLE, GuildSettingsFields,
        ListRecordsResponse, MEMBERS_TABLE, MemberFields, RECORDS_CHUNK_SIZE, WriteRecordsRequest,
        WriteRecordsResponse,
    },
};

#[derive(Clone)]
struct Credentials {
    token: Arc<str>,
    base_id: Arc<str>,
}

/// [`RosterStore`] over the Airtable REST API. Without credentials every call is a no-op.
#[derive(Clone)]
pub struct AirtableRosterStore {
    client: Client,
    api_url: Arc<str>,
    credentials: Option<Credentials>,
}

impl AirtableRosterStore {
    /// Build a store from configuration. Missing credentials produce a no-op store.
    pub fn new(config: AirtableConfig) -> AirtableResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| AirtableDaoError::ClientBuilder { source })?;

        let credentials = if config.is_configured() {
            config
                .token
                .zip(config.base_id)
                .map(|(token, base_id)| Credentials {
                    token: Arc::from(token.trim()),
                    base_id: Arc::from(base_id.trim()),
                })
        } else {
            None
        };

        Ok(Self {
            client,
            api_url: Arc::from(config.api_url.trim_end_matches('/')),
            credentials,
        })
    }

    /// Request builder for `table` (and optionally a record below it), `None` when unconfigured.
    fn request(&self, method: Method, table: &str, record_id: Option<&str>) -> Option<reqwest::RequestBuilder> {
        let credentials = self.credentials.as_ref()?;
        let url = match record_id {
            Some(id) => format!("{}/{}/{}/{}", self.api_url, credentials.base_id, table, id),
            None => format!("{}/{}/{}", self.api_url, credentials.base_id, table),
        };
        Some(
            self.client
                .request(method, url)
                .bearer_auth(credentials.token.as_ref()),
        )
    }

    /// Read every row of `table`, following the `offset` cursor until the last page.
    async fn list_records<F>(&self, table: &str) -> AirtableResult<Vec<AirtableRecord<F>>>
    where
        F: DeserializeOwned,
    {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let Some(mut builder) = self.request(Method::GET, table, None) else {
                return Ok(Vec::new());
            };
            if let Some(cursor) = offset.as_deref() {
                builder = builder.query(&[("offset", cursor)]);
            }

            let response = builder
                .send()
                .await
                .map_err(|source| AirtableDaoError::RequestSend {
                    path: table.to_string(),
                    source,
                })?;

            if !response.status().is_success() {
                return Err(AirtableDaoError::RequestStatus {
                    path: table.to_string(),
                    status: response.status(),
                });
            }

            let page = response
                .json::<ListRecordsResponse<F>>()
                .await
                .map_err(|source| AirtableDaoError::DecodeResponse {
                    path: table.to_string(),
                    source,
                })?;

            debug!(table, rows = page.records.len(), "fetched Airtable page");
            records.extend(page.records);

            match page.offset {
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => break,
            }
        }

        Ok(records)
    }

    /// Send `records` in batches of `chunk_size` with `method` (POST creates, PATCH updates).
    ///
    /// Each batch stands alone: a rejected batch is logged and left out of the
    /// returned rows while later batches are still attempted.
    async fn write_records<F>(
        &self,
        method: Method,
        table: &str,
        records: &[AirtableRecord<F>],
        chunk_size: usize,
    ) -> Vec<AirtableRecord<F>>
    where
        F: Serialize + DeserializeOwned,
    {
        let mut written = Vec::with_capacity(records.len());

        for (index, chunk) in records.chunks(chunk_size.max(1)).enumerate() {
            let Some(builder) = self.request(method.clone(), table, None) else {
                return written;
            };

            match self.send_batch(builder, table, chunk).await {
                Ok(rows) => written.extend(rows),
                Err(err) => warn!(table, batch = index, error = %err, "Airtable batch write failed"),
            }
        }

        written
    }

    async fn send_batch<F>(
        &self,
        builder: reqwest::RequestBuilder,
        table: &str,
        chunk: &[AirtableRecord<F>],
    ) -> AirtableResult<Vec<AirtableRecord<F>>>
    where
        F: Serialize + DeserializeOwned,
    {
        let body = WriteRecordsRequest {
            records: chunk,
            typecast: true,
        };

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(|source| AirtableDaoError::RequestSend {
                path: table.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(AirtableDaoError::RequestStatus {
                path: table.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<WriteRecordsResponse<F>>()
            .await
            .map(|payload| payload.records)
            .map_err(|source| AirtableDaoError::DecodeResponse {
                path: table.to_string(),
                source,
            })
    }

    async fn delete_record(&self, table: &str, id: &str) -> AirtableResult<bool> {
        if id.trim().is_empty() {
            return Ok(false);
        }
        let Some(builder) = self.request(Method::DELETE, table, Some(id)) else {
            return Ok(false);
        };

        let path = format!("{table}/{id}");
        let response = builder
            .send()
            .await
            .map_err(|source| AirtableDaoError::RequestSend {
                path: path.clone(),
                source,
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(path, "record already gone");
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(AirtableDaoError::RequestStatus {
                path,
                status: response.status(),
            });
        }

        response
            .json::<DeleteRecordResponse>()
            .await
            .map(|payload| payload.deleted)
            .map_err(|source| AirtableDaoError::DecodeResponse { path, source })
    }
}

impl RosterStore for AirtableRosterStore {
    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn list_members(&self) -> BoxFuture<'static, StorageResult<Vec<MemberRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = store
                .list_records::<MemberFields>(MEMBERS_TABLE)
                .await
                .map_err(|err| StorageError::backend(MEMBERS_TABLE, "list", err))?;
            Ok(rows.into_iter().map(MemberRecord::from).collect())
        })
    }

    fn list_guild_settings(&self) -> BoxFuture<'static, StorageResult<Vec<GuildSettings>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = store
                .list_records::<GuildSettingsFields>(GUILD_SETTINGS_TABLE)
                .await
                .map_err(|err| StorageError::backend(GUILD_SETTINGS_TABLE, "list", err))?;

            Ok(rows
                .into_iter()
                .filter_map(|row| match GuildSettings::try_from(row) {
                    Ok(settings) => Some(settings),
                    Err(err) => {
                        warn!(error = %err, "skipping malformed guild settings row");
                        None
                    }
                })
                .collect())
        })
    }

    fn create_members(
        &self,
        records: Vec<MemberRecord>,
    ) -> BoxFuture<'static, StorageResult<Vec<MemberRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = records
                .iter()
                .map(|record| {
                    let mut row = AirtableRecord::<MemberFields>::from(record);
                    row.id.clear();
                    row
                })
                .collect::<Vec<_>>();
            let created = store
                .write_records(Method::POST, MEMBERS_TABLE, &rows, RECORDS_CHUNK_SIZE)
                .await;
            Ok(created.into_iter().map(MemberRecord::from).collect())
        })
    }

    fn update_members(&self, records: Vec<MemberRecord>) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = records
                .iter()
                .filter(|record| record.is_persisted())
                .map(AirtableRecord::<MemberFields>::from)
                .collect::<Vec<_>>();
            let updated = store
                .write_records(Method::PATCH, MEMBERS_TABLE, &rows, RECORDS_CHUNK_SIZE)
                .await;
            Ok(updated.len())
        })
    }

    fn delete_member(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_record(MEMBERS_TABLE, &id)
                .await
                .map_err(|err| StorageError::backend(MEMBERS_TABLE, "delete", err))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(builder) = store.request(Method::GET, MEMBERS_TABLE, None) else {
                return Ok(());
            };

            let response = builder
                .query(&[("maxRecords", "1")])
                .send()
                .await
                .map_err(|source| {
                    StorageError::backend(
                        MEMBERS_TABLE,
                        "health check",
                        AirtableDaoError::RequestSend {
                            path: MEMBERS_TABLE.to_string(),
                            source,
                        },
                    )
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(StorageError::backend(
                    MEMBERS_TABLE,
                    "health check",
                    AirtableDaoError::RequestStatus {
                        path: MEMBERS_TABLE.to_string(),
                        status: response.status(),
                    },
                ))
            }
        })
    }
}
