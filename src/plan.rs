use crate::domain::{FileReference, Identifiers, TransferTask};
use crate::identifiers;

/// Destination key for one file. Files whose names carry bank and sample
/// identifiers land under `{prefix}/{bank}/{sample}/`, everything else
/// directly under `{prefix}/`.
pub fn map_task(reference: &FileReference, destination_prefix: &str) -> TransferTask {
    let identifiers = identifiers::extract(&reference.filename);
    let prefix = destination_prefix.trim_end_matches('/');

    let destination_key = match &identifiers {
        Identifiers::Present { bank_id, sample_id } => {
            format!("{prefix}/{bank_id}/{sample_id}/{}", reference.filename)
        }
        Identifiers::Absent => format!("{prefix}/{}", reference.filename),
    };

    TransferTask {
        source_url: reference.source_url.clone(),
        destination_key,
        filename: reference.filename.clone(),
        identifiers,
    }
}

/// One task per reference, in input order.
pub fn plan(references: &[FileReference], destination_prefix: &str) -> Vec<TransferTask> {
    references
        .iter()
        .map(|reference| map_task(reference, destination_prefix))
        .collect()
}
