//! Dense integer ids for nodes and nodespaces, and their opaque string uids.
//!
//! Id `0` is the "free" sentinel in every arena vector and is never handed
//! out. Nodespace id `1` is the permanent root.

use serde::{Deserialize, Serialize};

/// Dense index into the node arena. Uid form is `"n" + id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Dense index into the nodespace arena. Uid form is `"s" + id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodespaceId(pub usize);

pub const ROOT_NODESPACE: NodespaceId = NodespaceId(1);

impl NodeId {
    pub fn uid(self) -> String {
        format!("n{}", self.0)
    }

    pub fn from_uid(uid: &str) -> Option<Self> {
        let id: usize = uid.strip_prefix('n')?.parse().ok()?;
        (id > 0).then(|| NodeId(id))
    }
}

impl NodespaceId {
    pub fn uid(self) -> String {
        format!("s{}", self.0)
    }

    pub fn from_uid(uid: &str) -> Option<Self> {
        let id: usize = uid.strip_prefix('s')?.parse().ok()?;
        (id > 0).then(|| NodespaceId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_round_trip() {
        assert_eq!(NodeId(17).uid(), "n17");
        assert_eq!(NodeId::from_uid("n17"), Some(NodeId(17)));
        assert_eq!(NodespaceId::from_uid("s1"), Some(ROOT_NODESPACE));
    }

    #[test]
    fn test_rejects_bad_uids() {
        assert_eq!(NodeId::from_uid("s3"), None);
        assert_eq!(NodeId::from_uid("n0"), None);
        assert_eq!(NodeId::from_uid("nx"), None);
        assert_eq!(NodespaceId::from_uid("n3"), None);
        assert_eq!(NodespaceId::from_uid(""), None);
    }
}
