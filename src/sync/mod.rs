// Local-first replication between a local and a remote database
pub mod couch;
pub mod replica;
pub mod replication;

pub use couch::CouchReplica;
pub use replica::{rev_wins, supersedes, ChangesBatch, MemoryReplica, ReplicaDoc, ReplicaStore, Revisions};
pub use replication::{Replication, ReplicationOptions, SyncStatus};
