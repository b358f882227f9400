use bytes::Bytes;
use skyline_store::{BlockStore, CarFile, CarLimits, InMemoryBlockStore};
use skyline_types::{Cid, RecordPath};
use tracing::debug;

use crate::commit::SignedCommit;
use crate::error::{RepoError, RepoResult};
use crate::mst;

/// A repository as of one commit, backed only by the blocks shipped with it.
///
/// Firehose commits carry a partial block set: the commit, the MST nodes on
/// the paths that changed, and the new records. Anything else is absent, and
/// asking for it yields [`RepoError::IncompleteSnapshot`].
#[derive(Debug)]
pub struct RepoSnapshot {
    commit_cid: Cid,
    commit: SignedCommit,
    blocks: InMemoryBlockStore,
}

impl RepoSnapshot {
    /// Open a snapshot whose first CAR root is the signed commit.
    pub fn from_car(car: CarFile) -> RepoResult<Self> {
        let commit_cid = *car.root().ok_or(RepoError::MissingRoot)?;
        let bytes = car
            .blocks
            .get(&commit_cid)?
            .ok_or(RepoError::IncompleteSnapshot { cid: commit_cid })?;
        let commit = SignedCommit::decode(&commit_cid, &bytes)?;
        debug!(
            commit = %commit_cid,
            did = %commit.did,
            rev = %commit.rev,
            blocks = car.blocks.len(),
            "opened repository snapshot"
        );
        Ok(Self {
            commit_cid,
            commit,
            blocks: car.blocks,
        })
    }

    pub fn from_car_bytes(bytes: &[u8], limits: CarLimits) -> RepoResult<Self> {
        Self::from_car(CarFile::read_with_limits(bytes, limits)?)
    }

    pub fn commit_cid(&self) -> &Cid {
        &self.commit_cid
    }

    pub fn commit(&self) -> &SignedCommit {
        &self.commit
    }

    pub fn blocks(&self) -> &InMemoryBlockStore {
        &self.blocks
    }

    /// CID stored in the MST for `path`, without loading the record.
    pub fn record_cid(&self, path: &RecordPath) -> RepoResult<Option<Cid>> {
        mst::lookup(&self.blocks, &self.commit.data, path.to_key().as_bytes())
    }

    /// Resolve `path` to its record block.
    ///
    /// `Ok(None)` means the tree holds no record at `path`. A leaf whose
    /// record block was not shipped is an incomplete snapshot.
    pub fn get_record(&self, path: &RecordPath) -> RepoResult<Option<(Cid, Bytes)>> {
        let Some(cid) = self.record_cid(path)? else {
            return Ok(None);
        };
        let bytes = self
            .blocks
            .get(&cid)?
            .ok_or(RepoError::IncompleteSnapshot { cid })?;
        Ok(Some((cid, bytes)))
    }
}
