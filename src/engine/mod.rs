//! Builds storage topologies: the per-run id bookkeeping and the ordered
//! stages that turn a storage configuration into MAAS calls.

pub mod context;
pub mod storage;
