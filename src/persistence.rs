//! Dynamic-member persistence (spec §4.6)
//!
//! Dynamic members are dumped to the external [`KvStore`] as a single
//! pipe-delimited string under a key derived from the queue name, and
//! reloaded with [`Provenance::Dynamic`] on startup. Realtime and static
//! members are never persisted here.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::device::DeviceRegistry;
use crate::error::Result;
use crate::member::{Member, Provenance};
use crate::queue::QueueHandle;
use crate::transport::KvStore;

const FAMILY: &str = "queue/members";

fn key_for(queue_name: &str) -> String {
    format!("queue:{queue_name}:dynamic_members")
}

fn encode_member(member: &Member) -> String {
    format!(
        "{};{};{};{};{};{}",
        member.interface,
        member.penalty,
        member.paused as i32,
        member.display_name,
        member.device.key,
        member.call_in_use as i32,
    )
}

fn decode_member(entry: &str, devices: &DeviceRegistry) -> Option<Member> {
    let fields: Vec<&str> = entry.split(';').collect();
    if fields.len() != 6 {
        return None;
    }
    let interface = fields[0];
    let penalty: i32 = fields[1].parse().ok()?;
    let paused = fields[2] == "1";
    let display_name = fields[3];
    let state_key = fields[4];
    let call_in_use = fields[5] == "1";

    let device = devices.acquire(state_key);
    let mut member = Member::new(interface, state_key, device, Provenance::Dynamic);
    member.penalty = penalty;
    member.paused = paused;
    member.display_name = display_name.to_string();
    member.call_in_use = call_in_use;
    Some(member)
}

/// Serialize every dynamic member of `handle` and write it to `store`
/// (spec §4.6: "on modification of dynamic members... serialize").
pub async fn dump(handle: &QueueHandle, store: &dyn KvStore) -> Result<()> {
    let data = handle.data.lock().await;
    let encoded: Vec<String> = data
        .members
        .iter()
        .filter(|m| m.provenance == Provenance::Dynamic)
        .map(encode_member)
        .collect();
    drop(data);

    let value = encoded.join("|");
    debug!(queue = %handle.queue.name, count = encoded.len(), "dumping dynamic members");
    store.put(FAMILY, &key_for(&handle.queue.name), value).await
}

/// Load dynamic members for `handle` from `store`, re-inserting each with
/// dynamic provenance (spec §4.6, spec §8 property 9's round-trip).
pub async fn load(handle: &QueueHandle, store: &dyn KvStore, devices: &DeviceRegistry) -> Result<usize> {
    let Some(raw) = store.get(FAMILY, &key_for(&handle.queue.name)).await? else {
        return Ok(0);
    };
    if raw.is_empty() {
        return Ok(0);
    }

    let mut data = handle.data.lock().await;
    let mut loaded = 0;
    for entry in raw.split('|') {
        match decode_member(entry, devices) {
            Some(member) => {
                data.members.insert(member)?;
                loaded += 1;
            }
            None => warn!(queue = %handle.queue.name, entry, "skipping malformed persisted member"),
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{Queue, QueueData};
    use crate::strategy::RingStrategy;
    use crate::transport::MemoryKvStore;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn handle() -> QueueHandle {
        QueueHandle {
            queue: Arc::new(Queue::new("support", RingStrategy::RingAll)),
            data: Arc::new(Mutex::new(QueueData::new())),
        }
    }

    #[tokio::test]
    async fn dump_then_load_reproduces_dynamic_member_set() {
        let devices = DeviceRegistry::new().0;
        let store = MemoryKvStore::new();
        let handle = handle();

        let device = devices.acquire("SIP/100");
        let mut member = Member::new("SIP/100", "SIP/100", device, Provenance::Dynamic);
        member.penalty = 3;
        member.paused = true;
        member.display_name = "Alice".to_string();
        handle.data.lock().await.members.insert(member).unwrap();

        dump(&handle, &store).await.unwrap();

        let fresh = handle();
        let loaded = load(&fresh, &store, &devices).await.unwrap();
        assert_eq!(loaded, 1);

        let data = fresh.data.lock().await;
        let m = data.members.get("SIP/100").unwrap();
        assert_eq!(m.penalty, 3);
        assert!(m.paused);
        assert_eq!(m.display_name, "Alice");
        assert_eq!(m.provenance, Provenance::Dynamic);
    }
}
