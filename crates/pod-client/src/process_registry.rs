// SPDX-License-Identifier: MIT OR Apache-2.0
//! Process-wide pod registry: tracks every pod loaded by this process
//! so callers can look one up by id without threading a handle through
//! unrelated code, and so shutdown hooks can reach every live pod.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::pod::Pod;

fn registry() -> &'static Mutex<HashMap<String, Arc<Pod>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<Pod>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Record `pod` under its id. `load_pod` calls this once handshake succeeds.
pub fn register(pod: Arc<Pod>) {
    registry().lock().unwrap().insert(pod.pod_id.clone(), pod);
}

/// Remove a pod from the registry. `Pod::destroy` calls this.
pub fn unregister(pod_id: &str) {
    registry().lock().unwrap().remove(pod_id);
}

/// Look up a previously loaded pod by id.
pub fn lookup(pod_id: &str) -> Option<Arc<Pod>> {
    registry().lock().unwrap().get(pod_id).cloned()
}

/// Every pod currently registered.
pub fn list() -> Vec<Arc<Pod>> {
    registry().lock().unwrap().values().cloned().collect()
}

/// Destroy every registered pod. Useful for process-exit cleanup.
pub async fn destroy_all() {
    let pods = list();
    for pod in pods {
        pod.destroy().await;
    }
}
