use std::{fs, path::Path};

use tracing::{debug, trace, warn};

use super::{
    FileCandidate, StorageTier, candidate::LoadContext, index::ProfileIndex,
    path_ops::should_ignore, pointer::read_pointer,
};

/// Scans every configured directory into `index`, volatile first.
pub(crate) fn scan_all(index: &mut ProfileIndex, ctx: &LoadContext<'_>) {
    scan_dir(index, ctx, StorageTier::Volatile, ctx.dirs.run());
    scan_dir(index, ctx, StorageTier::Persistent, ctx.dirs.etc());
    for (position, dir) in ctx.dirs.libs().iter().enumerate() {
        scan_dir(index, ctx, StorageTier::ReadOnly(position), Some(dir.as_path()));
    }
}

/// Adds every profile and pointer of one directory to `index`.
///
/// Files that cannot be read are logged and skipped.
pub(crate) fn scan_dir(
    index: &mut ProfileIndex,
    ctx: &LoadContext<'_>,
    tier: StorageTier,
    dir: Option<&Path>,
) {
    let Some(dir) = dir else {
        return;
    };
    let Some(priority) = tier.priority() else {
        return;
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("keyfile: cannot read directory \"{}\": {e}", dir.display());
            return;
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| match entry.file_name().into_string() {
            Ok(name) => Some(name),
            Err(name) => {
                trace!("keyfile: skipping non UTF-8 name {name:?} in \"{}\"", dir.display());
                None
            }
        })
        .collect();
    names.sort();

    for name in names {
        if let Some(pointer) = read_pointer(dir, &name, ctx.check_permissions) {
            if !tier.is_writable() {
                trace!(
                    "keyfile: skip loaded file \"{}\" from read-only directory",
                    pointer.path.display()
                );
                continue;
            }

            let record = index.get_or_create(&pointer.uuid);
            match tier {
                StorageTier::Volatile => record.loaded_path_run = Some(pointer.target),
                _ => record.loaded_path_etc = Some(pointer.target),
            }
            continue;
        }

        if should_ignore(tier, &name) {
            trace!(
                "keyfile: skip file \"{}\" due to filename pattern",
                dir.join(&name).display()
            );
            continue;
        }

        let path = dir.join(&name);
        let (connection, identity) = match ctx.load_file(&path) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("keyfile: cannot load \"{}\": {e}", path.display());
                continue;
            }
        };
        let Some(uuid) = connection.uuid().map(str::to_string) else {
            continue;
        };

        trace!("keyfile: found \"{}\" for {uuid} ({tier})", path.display());
        index
            .get_or_create(&uuid)
            .candidates
            .push(FileCandidate::new(path, tier, priority, identity, connection));
    }
}
