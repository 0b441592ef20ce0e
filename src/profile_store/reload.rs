//! Reconciliation of scanned files into exported profiles.
//!
//! For each UUID the candidate files are ranked, a loaded-UUID pointer may
//! promote one of them or mask the UUID, and the winner is compared with the
//! exported profile. Changes are collected while reconciling and emitted
//! afterwards, all removals before all updates.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, trace, warn};

use super::{
    FileCandidate, ProfileChange, ProfileRecord, StorageHandle, StorageTier,
    candidate::{LoadContext, compare_candidates},
    index::ProfileIndex,
    pointer::{is_masked, pointer_filename},
    scanner::scan_all,
};

/// Changes queued during one reconciliation pass.
#[derive(Debug, Default)]
pub(crate) struct PendingChanges {
    removed: Vec<(String, StorageHandle)>,
    modified: Vec<String>,
}

impl PendingChanges {
    /// Turns the queue into events, removals first.
    ///
    /// An update is only emitted if its record still exports a profile,
    /// and at most once per UUID.
    pub(crate) fn into_changes(mut self, index: &ProfileIndex) -> Vec<ProfileChange> {
        let mut seen = Vec::with_capacity(self.modified.len());
        self.modified.retain(|uuid| {
            if seen.contains(uuid) {
                return false;
            }
            seen.push(uuid.clone());
            true
        });

        let mut changes: Vec<ProfileChange> = self
            .removed
            .into_iter()
            .map(|(uuid, handle)| ProfileChange {
                uuid,
                handle,
                connection: None,
            })
            .collect();

        for uuid in self.modified {
            let Some(record) = index.get(&uuid) else {
                continue;
            };
            if let (Some(connection), Some(handle)) = (&record.exported, record.handle) {
                changes.push(ProfileChange {
                    uuid,
                    handle,
                    connection: Some(Arc::clone(connection)),
                });
            }
        }

        changes
    }
}

enum Outcome {
    Keep,
    Unexport,
    Remove,
}

/// Rescans all directories and reconciles every known UUID.
pub(crate) fn reload_all(index: &mut ProfileIndex, ctx: &LoadContext<'_>) -> Vec<ProfileChange> {
    index.reset_for_scan();
    scan_all(index, ctx);

    let mut pending = PendingChanges::default();
    for uuid in index.uuids() {
        reconcile(index, ctx, &uuid, &mut pending);
    }

    debug!("keyfile: reload done, {} known profiles", index.len());
    pending.into_changes(index)
}

/// Decides what `uuid` exports and updates its record.
///
/// The record's candidates and pointer hints must be current. Afterwards the
/// record has no parsed connections left on its candidates and its paths
/// are published in the index.
pub(crate) fn reconcile(
    index: &mut ProfileIndex,
    ctx: &LoadContext<'_>,
    uuid: &str,
    pending: &mut PendingChanges,
) {
    let Some(record) = index.get_mut(uuid) else {
        return;
    };

    let mut relocated = Vec::new();
    match decide(record, ctx, pending, &mut relocated) {
        Outcome::Remove => {
            index.remove(uuid);
        }
        Outcome::Unexport => {
            index.clear_handle(uuid);
            finish(index, uuid);
        }
        Outcome::Keep => {
            index.ensure_handle(uuid);
            finish(index, uuid);
        }
    }

    for (owner, candidate) in relocated {
        debug!(
            "keyfile: {uuid}: \"{}\" moved to {owner}",
            candidate.path.display()
        );
        let record = index.get_or_create(&owner);
        record.candidates.retain(|known| known.path != candidate.path);
        record.candidates.push(candidate);

        index.forget_paths(&owner);
        reconcile(index, ctx, &owner, pending);
    }
}

/// Releases parsed profiles and publishes the record's paths.
fn finish(index: &mut ProfileIndex, uuid: &str) {
    if let Some(record) = index.get_mut(uuid) {
        for candidate in &mut record.candidates {
            candidate.connection = None;
        }
    }
    index.publish_paths(uuid);
}

fn decide(
    record: &mut ProfileRecord,
    ctx: &LoadContext<'_>,
    pending: &mut PendingChanges,
    relocated: &mut Vec<(String, FileCandidate)>,
) -> Outcome {
    let uuid = record.uuid().to_string();

    let (loaded_path, loaded_dir) = pointer_hint(record, ctx);
    let pointer_name = loaded_dir
        .map(|dir| pointer_filename(&dir, &uuid, false).display().to_string())
        .unwrap_or_default();

    record.candidates.sort_by(compare_candidates);

    let mut masked = false;
    let mut promoted = false;
    if let Some(target) = &loaded_path {
        if is_masked(target) {
            masked = true;
        } else if promote(&mut record.candidates, target) {
            promoted = true;
        } else {
            trace!(
                "keyfile: {uuid}: ignoring loaded file \"{pointer_name}\" pointing to invalid \"{}\"",
                target.display()
            );
        }
    }

    if record.exported_tier == Some(StorageTier::InMemory) {
        if masked {
            trace!("keyfile: {uuid}: masking of in-memory profile ignored (\"{pointer_name}\")");
        }
        for candidate in &record.candidates {
            trace!(
                "keyfile: {uuid}: shadowed \"{}\" by in-memory profile",
                candidate.path.display()
            );
        }
        return Outcome::Keep;
    }

    if !masked {
        ensure_best_loaded(record, ctx, &uuid, relocated);
    }

    if masked || record.candidates.is_empty() {
        if let (Some(_), Some(handle)) = (&record.exported, record.handle) {
            pending.removed.push((uuid.clone(), handle));
        }

        if record.candidates.is_empty() {
            if masked {
                trace!("keyfile: {uuid}: masked by \"{pointer_name}\" but no profiles to mask");
            } else {
                trace!("keyfile: {uuid}: no profiles left, dropping");
            }
            return Outcome::Remove;
        }

        for candidate in &record.candidates {
            trace!(
                "keyfile: {uuid}: masked \"{}\" by \"{pointer_name}\"",
                candidate.path.display()
            );
        }
        record.exported = None;
        record.exported_tier = None;
        return Outcome::Unexport;
    }

    let (best, shadowed) = match record.candidates.split_first_mut() {
        Some(split) => split,
        None => return Outcome::Remove,
    };

    for candidate in shadowed.iter() {
        trace!(
            "keyfile: {uuid}: shadowed \"{}\" by \"{}\"",
            candidate.path.display(),
            best.path.display()
        );
    }

    record.exported_tier = Some(best.tier);
    let Some(connection) = best.connection.take() else {
        return Outcome::Keep;
    };

    let unchanged = record
        .exported
        .as_ref()
        .is_some_and(|exported| exported.equivalent(&connection));
    let via = if promoted {
        format!(" (via \"{pointer_name}\")")
    } else {
        String::new()
    };

    if unchanged {
        trace!(
            "keyfile: {uuid}: loaded \"{}\"{via} (no changes)",
            best.path.display()
        );
    } else {
        debug!("keyfile: {uuid}: loaded \"{}\"{via}", best.path.display());
        record.exported = Some(Arc::new(connection));
        pending.modified.push(uuid);
    }

    Outcome::Keep
}

/// The pointer hint that applies to the record.
///
/// A volatile pointer beats a persistent one.
fn pointer_hint(
    record: &ProfileRecord,
    ctx: &LoadContext<'_>,
) -> (Option<PathBuf>, Option<PathBuf>) {
    match (&record.loaded_path_run, &record.loaded_path_etc) {
        (Some(run), etc) => {
            if let (Some(etc), Some(etc_dir)) = (etc, ctx.dirs.etc()) {
                trace!(
                    "keyfile: {}: ignoring loaded file \"{}\" to \"{}\", shadowed by volatile pointer",
                    record.uuid(),
                    pointer_filename(etc_dir, record.uuid(), false).display(),
                    etc.display()
                );
            }
            (Some(run.clone()), ctx.dirs.run().map(PathBuf::from))
        }
        (None, Some(etc)) => (Some(etc.clone()), ctx.dirs.etc().map(PathBuf::from)),
        (None, None) => (None, None),
    }
}

/// Moves the candidate that is the same file as `target` to the front.
fn promote(candidates: &mut Vec<FileCandidate>, target: &Path) -> bool {
    if !target.is_absolute() {
        return false;
    }
    let Ok(metadata) = fs::metadata(target) else {
        return false;
    };
    let Some(position) = candidates
        .iter()
        .position(|candidate| candidate.identity.same_file(&metadata))
    else {
        return false;
    };

    let candidate = candidates.remove(position);
    candidates.insert(0, candidate);
    true
}

/// Makes sure the best candidate carries a parsed profile.
///
/// Candidates whose profile was already released are read again. Ones that
/// no longer load are dropped; ones that now hold another UUID are handed
/// out through `relocated`.
fn ensure_best_loaded(
    record: &mut ProfileRecord,
    ctx: &LoadContext<'_>,
    uuid: &str,
    relocated: &mut Vec<(String, FileCandidate)>,
) {
    while let Some(best) = record.candidates.first_mut() {
        if best.connection.is_some() {
            return;
        }

        match ctx.load_file(&best.path) {
            Ok((connection, identity)) if connection.uuid() == Some(uuid) => {
                best.connection = Some(connection);
                best.identity = identity;
                return;
            }
            Ok((connection, identity)) => {
                let mut moved = record.candidates.remove(0);
                if let Some(owner) = connection.uuid().map(str::to_string) {
                    moved.connection = Some(connection);
                    moved.identity = identity;
                    relocated.push((owner, moved));
                }
            }
            Err(e) => {
                warn!("keyfile: {uuid}: cannot reload \"{}\": {e}", best.path.display());
                record.candidates.remove(0);
            }
        }
    }
}
