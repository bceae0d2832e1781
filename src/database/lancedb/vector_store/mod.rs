
use super::{ChunkMetadata, ChunkRecord, SearchHit, StoredChunk};
use crate::chunker::HeaderPath;
use crate::{RagError, Result};
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
    table::Table,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const HEADER_COLUMNS: [&str; 4] = ["header_1", "header_2", "header_3", "header_4"];

/// One named collection inside a LanceDB database directory.
///
/// The backing table is created on the first insert, once the embedding
/// dimension is known.
pub struct CollectionStore {
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
}

impl CollectionStore {
    /// Connect to the database at `storage_path`, creating the directory if
    /// needed
    #[inline]
    pub async fn connect(storage_path: &Path, table_name: &str) -> Result<Self> {
        let connection = Self::open_connection(storage_path).await?;

        let mut store = Self {
            connection,
            table_name: table_name.to_string(),
            vector_dimension: None,
        };
        if store.exists().await? {
            store.vector_dimension = Some(store.detect_existing_vector_dimension().await?);
        }

        debug!(
            "Connected to collection '{}' at {} (dimension {:?})",
            store.table_name,
            storage_path.display(),
            store.vector_dimension
        );
        Ok(store)
    }

    /// Names of every collection stored at `storage_path`
    #[inline]
    pub async fn collection_names(storage_path: &Path) -> Result<Vec<String>> {
        let connection = Self::open_connection(storage_path).await?;
        connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))
    }

    async fn open_connection(storage_path: &Path) -> Result<Connection> {
        std::fs::create_dir_all(storage_path).map_err(|e| {
            RagError::Database(format!(
                "Failed to create vector database directory {}: {}",
                storage_path.display(),
                e
            ))
        })?;

        let uri = storage_path.to_string_lossy();
        lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub fn vector_dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    /// Whether the backing table has been created
    #[inline]
    pub async fn exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Option<Table>> {
        if !self.exists().await? {
            return Ok(None);
        }

        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map(Some)
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open existing table: {}", e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                RagError::Database("Could not find vector column or determine dimension".to_string())
            })
    }

    fn create_schema(vector_dim: i32) -> Arc<Schema> {
        let mut fields = vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim,
                ),
                false,
            ),
            Field::new("document", DataType::Utf8, false),
        ];
        fields.extend(
            HEADER_COLUMNS
                .iter()
                .map(|name| Field::new(*name, DataType::Utf8, true)),
        );
        fields.extend([
            Field::new("source", DataType::Utf8, false),
            Field::new("source_basename", DataType::Utf8, false),
            Field::new("chunk_id", DataType::Utf8, false),
        ]);

        Arc::new(Schema::new(fields))
    }

    /// Insert records, creating the table from the first vector's dimension.
    /// Every vector in the collection must share that dimension.
    #[inline]
    pub async fn store_batch(&mut self, records: &[ChunkRecord]) -> Result<()> {
        let Some(first) = records.first() else {
            debug!("No records to store");
            return Ok(());
        };

        let vector_dim = match self.vector_dimension {
            Some(dim) => dim,
            None => first.vector.len(),
        };
        if vector_dim == 0 {
            return Err(RagError::Database(
                "Cannot store empty embedding vectors".to_string(),
            ));
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(RagError::Database(format!(
                "Embedding for '{}' has {} dimensions, collection expects {}",
                bad.id,
                bad.vector.len(),
                vector_dim
            )));
        }

        let dim = i32::try_from(vector_dim).map_err(|_| {
            RagError::Database(format!("Vector dimension {} is too large", vector_dim))
        })?;
        let schema = Self::create_schema(dim);

        if self.vector_dimension.is_none() {
            info!(
                "Creating collection '{}' with {} dimensions",
                self.table_name, vector_dim
            );
            self.connection
                .create_empty_table(&self.table_name, Arc::clone(&schema))
                .execute()
                .await
                .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;
            self.vector_dimension = Some(vector_dim);
        }

        let record_batch = Self::create_record_batch(schema, dim, records)?;
        let table = self
            .open_table()
            .await?
            .ok_or_else(|| RagError::Database(format!("Table '{}' vanished", self.table_name)))?;

        let batch_schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), batch_schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert records: {}", e)))?;

        info!(
            "Stored {} records in collection '{}'",
            records.len(),
            self.table_name
        );
        Ok(())
    }

    fn create_record_batch(
        schema: Arc<Schema>,
        vector_dim: i32,
        records: &[ChunkRecord],
    ) -> Result<RecordBatch> {
        let flat_values: Vec<f32> = records
            .iter()
            .flat_map(|r| r.vector.iter().copied())
            .collect();
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            vector_dim,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

        let header_column = |pick: fn(&HeaderPath) -> Option<&str>| -> Arc<dyn Array> {
            Arc::new(StringArray::from(
                records
                    .iter()
                    .map(|r| pick(&r.metadata.headers))
                    .collect::<Vec<_>>(),
            ))
        };
        let text_column = |pick: fn(&ChunkRecord) -> &str| -> Arc<dyn Array> {
            Arc::new(StringArray::from(
                records.iter().map(pick).collect::<Vec<_>>(),
            ))
        };

        let arrays: Vec<Arc<dyn Array>> = vec![
            text_column(|r| r.id.as_str()),
            Arc::new(vector_array),
            text_column(|r| r.document.as_str()),
            header_column(|h| h.header_1.as_deref()),
            header_column(|h| h.header_2.as_deref()),
            header_column(|h| h.header_3.as_deref()),
            header_column(|h| h.header_4.as_deref()),
            text_column(|r| r.metadata.source.as_str()),
            text_column(|r| r.metadata.source_basename.as_str()),
            text_column(|r| r.metadata.chunk_id.as_str()),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// L2 nearest neighbours of `query_vector`, closest first
    #[inline]
    pub async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        debug!(
            "Searching '{}' for {} nearest neighbours",
            self.table_name, limit
        );

        let Some(table) = self.open_table().await? else {
            debug!("Collection '{}' has no table yet", self.table_name);
            return Ok(Vec::new());
        };
        if let Some(dim) = self.vector_dimension.filter(|dim| *dim != query_vector.len()) {
            return Err(RagError::Embedding(format!(
                "Query embedding has {} dimensions, collection expects {}",
                query_vector.len(),
                dim
            )));
        }

        let results = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut hits = Vec::new();
        for batch in &batches {
            let chunks = Self::parse_batch(batch)?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

            hits.extend(chunks.into_iter().enumerate().map(|(row, chunk)| {
                let distance = distances
                    .filter(|d| !d.is_null(row))
                    .map_or(0.0, |d| d.value(row));
                SearchHit { chunk, distance }
            }));
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        debug!("Search returned {} hits", hits.len());
        Ok(hits)
    }

    /// Exact-match lookup by chunk id
    #[inline]
    pub async fn get(&self, id: &str) -> Result<Option<StoredChunk>> {
        let predicate = format!("id = '{}'", id.replace('\'', "''"));
        let mut chunks = self.scan(Some(predicate), Some(1)).await?;
        Ok(chunks.pop())
    }

    /// Stored chunks in storage order, at most `limit` of them
    #[inline]
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<StoredChunk>> {
        self.scan(None, limit).await
    }

    async fn scan(&self, predicate: Option<String>, limit: Option<usize>) -> Result<Vec<StoredChunk>> {
        let Some(table) = self.open_table().await? else {
            return Ok(Vec::new());
        };

        let mut query = table.query();
        if let Some(predicate) = predicate {
            query = query.only_if(predicate);
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to query table: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut chunks = Vec::new();
        for batch in &batches {
            chunks.extend(Self::parse_batch(batch)?);
        }
        Ok(chunks)
    }

    /// Number of stored chunks, 0 before the first insert
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))
    }

    fn parse_batch(batch: &RecordBatch) -> Result<Vec<StoredChunk>> {
        let ids = string_column(batch, "id")?;
        let documents = string_column(batch, "document")?;
        let sources = string_column(batch, "source")?;
        let basenames = string_column(batch, "source_basename")?;
        let chunk_ids = string_column(batch, "chunk_id")?;
        let headers = HEADER_COLUMNS
            .iter()
            .map(|name| string_column(batch, name))
            .collect::<Result<Vec<_>>>()?;

        let optional = |column: &StringArray, row: usize| {
            (!column.is_null(row)).then(|| column.value(row).to_string())
        };

        Ok((0..batch.num_rows())
            .map(|row| StoredChunk {
                id: ids.value(row).to_string(),
                document: documents.value(row).to_string(),
                metadata: ChunkMetadata {
                    headers: HeaderPath {
                        header_1: optional(headers[0], row),
                        header_2: optional(headers[1], row),
                        header_3: optional(headers[2], row),
                        header_4: optional(headers[3], row),
                    },
                    source: sources.value(row).to_string(),
                    source_basename: basenames.value(row).to_string(),
                    chunk_id: chunk_ids.value(row).to_string(),
                },
            })
            .collect())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}
