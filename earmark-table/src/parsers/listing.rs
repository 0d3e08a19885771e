//! Directory listings as raw records

use super::{RawRecord, RecordSet};
use crate::paths::PathResolver;
use tracing::debug;

/// One raw record per audio file, keyed by its (network) path
///
/// The network path is used when the resolver can map the file, the local
/// path otherwise. Listed files are always absolute.
pub fn listing_records<I, S>(files: I, resolver: &dyn PathResolver) -> RecordSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut records = RecordSet::new();
    for (order, local) in files.into_iter().enumerate() {
        let local = local.as_ref();
        let path = resolver.local_to_network(local).unwrap_or_else(|| {
            debug!("No network path for {}, using local path", local);
            local.to_string()
        });
        let record: RawRecord = [
            ("order", order.to_string()),
            ("filename", path.clone()),
            ("key", path.clone()),
            ("is_relative", "False".to_string()),
            ("original", path.clone()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        records.insert(path, record);
    }
    records
}
