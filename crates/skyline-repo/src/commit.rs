use bytes::Bytes;
use minicbor::{Decoder, Encoder};
use skyline_types::dag_cbor::{self, EncodeError};
use skyline_types::{CborError, CborResult, Cid, Did};

use crate::error::{RepoError, RepoResult};

/// Repository versions this reader understands.
pub const SUPPORTED_VERSIONS: [i64; 2] = [2, 3];

/// The signed commit object at the root of a repository snapshot.
///
/// `data` points at the root of the Merkle Search Tree holding every record.
/// The signature is carried but not verified: verification needs the
/// account's signing key, which comes from identity resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedCommit {
    pub did: Did,
    pub version: i64,
    pub data: Cid,
    pub rev: String,
    pub prev: Option<Cid>,
    pub sig: Bytes,
}

impl SignedCommit {
    pub fn decode(cid: &Cid, bytes: &[u8]) -> RepoResult<Self> {
        let wrap = |source: CborError| RepoError::Commit { cid: *cid, source };
        let fields = decode_fields(bytes).map_err(wrap)?;

        let did = fields.did.ok_or(CborError::MissingField("did")).map_err(wrap)?;
        let version = fields
            .version
            .ok_or(CborError::MissingField("version"))
            .map_err(wrap)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(RepoError::UnsupportedVersion(version));
        }
        let data = fields.data.ok_or(CborError::MissingField("data")).map_err(wrap)?;

        Ok(Self {
            did: Did::new(did)?,
            version,
            data,
            rev: fields.rev.unwrap_or_default(),
            prev: fields.prev,
            sig: fields.sig.unwrap_or_default(),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut enc = Encoder::new(Vec::new());
        // DAG-CBOR key order: by length, then bytewise
        enc.map(6)?;
        enc.str("did")?.str(self.did.as_str())?;
        enc.str("rev")?.str(&self.rev)?;
        enc.str("sig")?.bytes(&self.sig)?;
        enc.str("data")?;
        dag_cbor::encode_link(&mut enc, &self.data)?;
        enc.str("prev")?;
        dag_cbor::encode_optional_link(&mut enc, self.prev.as_ref())?;
        enc.str("version")?.i64(self.version)?;
        Ok(enc.into_writer())
    }
}

#[derive(Default)]
struct CommitFields {
    did: Option<String>,
    version: Option<i64>,
    data: Option<Cid>,
    rev: Option<String>,
    prev: Option<Cid>,
    sig: Option<Bytes>,
}

fn decode_fields(bytes: &[u8]) -> CborResult<CommitFields> {
    let mut dec = Decoder::new(bytes);
    let mut fields = CommitFields::default();
    for _ in 0..dag_cbor::map_len(&mut dec)? {
        match dag_cbor::text(&mut dec)? {
            "did" => fields.did = Some(dag_cbor::text(&mut dec)?.to_string()),
            "version" => fields.version = Some(dag_cbor::int(&mut dec, "version")?),
            "data" => fields.data = Some(dag_cbor::link(&mut dec)?),
            "rev" => fields.rev = dag_cbor::optional_text(&mut dec)?.map(str::to_string),
            "prev" => fields.prev = dag_cbor::optional_link(&mut dec)?,
            "sig" => fields.sig = Some(Bytes::copy_from_slice(dag_cbor::bytes(&mut dec)?)),
            _ => dag_cbor::skip(&mut dec)?,
        }
    }
    dag_cbor::finish(&dec)?;
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyline_types::dag_cbor_cid;

    fn sample() -> SignedCommit {
        SignedCommit {
            did: Did::new("did:plc:xyz").unwrap(),
            version: 3,
            data: dag_cbor_cid(b"mst-root"),
            rev: "3kabc".into(),
            prev: None,
            sig: Bytes::from_static(&[1, 2, 3]),
        }
    }

    #[test]
    fn decode_reads_all_fields() {
        let commit = sample();
        let bytes = commit.encode().unwrap();
        let cid = dag_cbor_cid(&bytes);
        assert_eq!(SignedCommit::decode(&cid, &bytes).unwrap(), commit);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut commit = sample();
        commit.version = 9;
        let bytes = commit.encode().unwrap();
        let err = SignedCommit::decode(&dag_cbor_cid(&bytes), &bytes).unwrap_err();
        assert!(matches!(err, RepoError::UnsupportedVersion(9)));
    }

    #[test]
    fn missing_data_is_rejected() {
        let mut enc = Encoder::new(Vec::new());
        enc.map(2).unwrap();
        enc.str("did").unwrap().str("did:plc:xyz").unwrap();
        enc.str("version").unwrap().u8(3).unwrap();
        let bytes = enc.into_writer();
        let err = SignedCommit::decode(&dag_cbor_cid(&bytes), &bytes).unwrap_err();
        assert!(matches!(
            err,
            RepoError::Commit {
                source: CborError::MissingField("data"),
                ..
            }
        ));
    }

    #[test]
    fn invalid_did_is_rejected() {
        let bytes = sample().encode().unwrap();
        // swap the DID text for a same-length invalid value
        let pos = bytes
            .windows(11)
            .position(|w| w == b"did:plc:xyz")
            .unwrap();
        let mut tampered = bytes.clone();
        tampered[pos..pos + 11].copy_from_slice(b"xid:plc:xyz");
        let err = SignedCommit::decode(&dag_cbor_cid(&tampered), &tampered).unwrap_err();
        assert!(matches!(err, RepoError::Type(_)));
    }
}
