use skyline_index::PostRow;
use skyline_lexicon::Record;
use skyline_protocol::{CommitEvent, OpAction, RepoOp};
use skyline_repo::RepoSnapshot;
use skyline_store::CarLimits;
use skyline_types::{AtUri, Did, RecordPath};
use tracing::{debug, trace, warn};

use crate::error::{CommitSkip, OpSkip};

/// Per-commit op counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpStats {
    /// Create ops that resolved to a post.
    pub posts: usize,
    /// Create ops that resolved to some other record type.
    pub other_records: usize,
    /// Update and delete ops, which are not applied.
    pub ignored: usize,
    /// Create ops that could not be resolved or decoded.
    pub skipped: usize,
}

impl std::ops::AddAssign for OpStats {
    fn add_assign(&mut self, rhs: Self) {
        self.posts += rhs.posts;
        self.other_records += rhs.other_records;
        self.ignored += rhs.ignored;
        self.skipped += rhs.skipped;
    }
}

/// Rows recovered from one commit.
#[derive(Clone, Debug, Default)]
pub struct Interpretation {
    /// One row per post, in op order.
    pub rows: Vec<PostRow>,
    pub stats: OpStats,
}

/// Turns commit events into post rows.
///
/// Records are resolved only from the blocks shipped with the commit. A
/// failure affecting one op skips that op; a failure affecting the whole
/// block set skips the commit.
#[derive(Clone, Debug, Default)]
pub struct CommitInterpreter {
    car_limits: CarLimits,
}

impl CommitInterpreter {
    pub fn new(car_limits: CarLimits) -> Self {
        Self { car_limits }
    }

    pub fn interpret(
        &self,
        event: &CommitEvent,
        indexed_at: &str,
    ) -> Result<Interpretation, CommitSkip> {
        let mut out = Interpretation::default();
        if !event.ops.iter().any(|op| op.action == OpAction::Create) {
            out.stats.ignored = event.ops.len();
            return Ok(out);
        }
        if event.too_big {
            return Err(CommitSkip::TooBig);
        }
        let repo = Did::new(event.repo.as_str()).map_err(CommitSkip::InvalidRepo)?;
        let snapshot = RepoSnapshot::from_car_bytes(&event.blocks, self.car_limits)
            .map_err(CommitSkip::Snapshot)?;
        if snapshot.commit().did != repo {
            return Err(CommitSkip::RepoMismatch {
                expected: repo.to_string(),
                found: snapshot.commit().did.to_string(),
            });
        }

        for op in &event.ops {
            if op.action != OpAction::Create {
                trace!(action = %op.action, path = %op.path, "ignoring op");
                out.stats.ignored += 1;
                continue;
            }
            match resolve(&snapshot, &repo, op) {
                Ok(Resolved::Post(uri, cid, post)) => {
                    out.rows
                        .push(PostRow::from_post(&uri, &cid, &post, indexed_at));
                    out.stats.posts += 1;
                }
                Ok(Resolved::Other(nsid)) => {
                    trace!(path = %op.path, %nsid, "not a post");
                    out.stats.other_records += 1;
                }
                Err(skip) => {
                    if skip.is_routine() {
                        debug!(seq = event.seq, %repo, path = %op.path, error = %skip, "skipping op");
                    } else {
                        warn!(seq = event.seq, %repo, path = %op.path, error = %skip, "skipping op");
                    }
                    out.stats.skipped += 1;
                }
            }
        }
        Ok(out)
    }
}

enum Resolved {
    Post(AtUri, skyline_types::Cid, skyline_lexicon::Post),
    Other(String),
}

fn resolve(snapshot: &RepoSnapshot, repo: &Did, op: &RepoOp) -> Result<Resolved, OpSkip> {
    let path = RecordPath::parse(&op.path).map_err(OpSkip::InvalidPath)?;
    let expected = op.cid.ok_or(OpSkip::MissingCid)?;
    let (found, bytes) = snapshot.get_record(&path)?.ok_or(OpSkip::NotInTree)?;
    if found != expected {
        return Err(OpSkip::RecordMismatch { expected, found });
    }
    match Record::decode(&bytes)? {
        Record::Post(post) => Ok(Resolved::Post(AtUri::new(repo.clone(), path), found, post)),
        Record::Other { record_type } => Ok(Resolved::Other(record_type)),
    }
}
