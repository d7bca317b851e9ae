// SPDX-License-Identifier: MIT OR Apache-2.0
//! The pod resolver: an external collaborator that turns a pod
//! coordinate into a launchable argv. Not implemented by this crate —
//! only the contract `load_pod` consumes it through.

use crate::error::PodError;

/// Resolves a `(pod_id, version)` coordinate to a launchable argv
/// (typically a path to a downloaded or cached executable plus any
/// arguments it needs).
///
/// `load_pod` only calls this for [`crate::spec::PodSpec::Coordinate`]
/// values; a literal [`crate::spec::PodSpec::Argv`] never touches the
/// resolver.
pub trait PodResolver: Send + Sync {
    /// Resolve `pod_id`, optionally pinned to `version`, to an argv.
    /// `force` asks the resolver to bypass any cache it keeps and
    /// re-resolve (and re-download) the pod.
    fn resolve(
        &self,
        pod_id: &str,
        version: Option<&str>,
        force: bool,
    ) -> Result<Vec<String>, PodError>;
}

/// A resolver that treats the coordinate's `pod_id` as a literal
/// command, ignoring `version` and `force`. Useful for tests and for
/// pods already addressable by a bare executable name on `PATH`.
pub struct PassthroughResolver;

impl PodResolver for PassthroughResolver {
    fn resolve(
        &self,
        pod_id: &str,
        _version: Option<&str>,
        _force: bool,
    ) -> Result<Vec<String>, PodError> {
        Ok(vec![pod_id.to_string()])
    }
}
