pub mod memory;
pub mod s3;
pub mod sqlite;

pub use memory::{InMemoryBlobStore, InMemoryRecordStore};
pub use s3::{S3BlobStore, S3Credentials};
pub use sqlite::SqliteRecordStore;
