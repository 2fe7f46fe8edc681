use crate::status::model::Status;

/// Map a workflow run's action and conclusion onto the status lattice.
///
/// Total on purpose: provider payloads routinely carry actions and
/// conclusions we have never seen, and an ambiguous event must never regress
/// a step, so anything unrecognized lands on in-progress.
pub fn normalize_status(action: &str, conclusion: Option<&str>) -> Status {
    match action {
        "requested" | "queued" => Status::Requested,
        "in_progress" => Status::InProgress,
        "completed" => match conclusion {
            Some("success") => Status::Success,
            // failure, cancelled, timed_out, skipped, or missing entirely
            _ => Status::Failure,
        },
        _ => Status::InProgress,
    }
}
