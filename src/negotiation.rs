use crate::message::GenericHello;
use crate::ofp_header::SUPPORTED_VERSIONS;

#[derive(Debug, Fail, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    #[fail(display = "No common OpenFlow version: local {:?}, peer {:?}", local, peer)]
    NoCommonVersion {
        local: Vec<u8>,
        peer: Vec<u8>,
    },
    #[fail(display = "None of the configured OpenFlow versions {:?} is supported", configured)]
    NoLocalVersions {
        configured: Vec<u8>,
    },
}

/// Picks the protocol version of a connection from the local version set and the
/// peer's Hello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionNegotiator {
    /// Ascending, without duplicates, never empty.
    local: Vec<u8>,
}

impl VersionNegotiator {
    /// Keeps the configured versions this crate can speak.
    pub fn new(configured: &[u8]) -> Result<VersionNegotiator, NegotiationError> {
        let mut local: Vec<u8> = configured
            .iter()
            .cloned()
            .filter(|v| SUPPORTED_VERSIONS.contains(v))
            .collect();
        local.sort_unstable();
        local.dedup();
        if local.is_empty() {
            return Err(NegotiationError::NoLocalVersions { configured: configured.to_vec() });
        }
        Ok(VersionNegotiator { local })
    }

    pub fn versions(&self) -> &[u8] {
        &self.local
    }

    /// The version of the Hello sent on connection acceptance.
    pub fn highest(&self) -> u8 {
        self.local[self.local.len() - 1]
    }

    pub fn supports(&self, version: u8) -> bool {
        self.local.contains(&version)
    }

    /// With a version bitmap, the highest version both sides list. Without one, the
    /// lower of the two advertised versions, provided it is supported locally.
    pub fn negotiate(&self, hello: &GenericHello) -> Result<u8, NegotiationError> {
        let agreed = match hello.versions {
            Some(ref peer) => self.local.iter().rev().find(|v| peer.contains(v)).cloned(),
            None => {
                let candidate = hello.version.min(self.highest());
                if self.supports(candidate) {
                    Some(candidate)
                } else {
                    None
                }
            }
        };
        agreed.ok_or_else(|| NegotiationError::NoCommonVersion {
            local: self.local.clone(),
            peer: hello.versions.clone().unwrap_or_else(|| vec![hello.version]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello(version: u8, versions: Option<Vec<u8>>) -> GenericHello {
        GenericHello { version, xid: 1, versions }
    }

    fn negotiator() -> VersionNegotiator {
        VersionNegotiator::new(&[1, 4]).unwrap()
    }

    #[test]
    fn test_bitmap_picks_highest_common() {
        assert_eq!(negotiator().negotiate(&hello(4, Some(vec![1, 4]))), Ok(4));
        assert_eq!(negotiator().negotiate(&hello(6, Some(vec![1, 5, 6]))), Ok(1));
    }

    #[test]
    fn test_single_version_takes_minimum() {
        assert_eq!(negotiator().negotiate(&hello(1, None)), Ok(1));
        assert_eq!(negotiator().negotiate(&hello(5, None)), Ok(4));
    }

    #[test]
    fn test_disjoint_versions_fail() {
        let err = negotiator().negotiate(&hello(5, Some(vec![5, 6]))).unwrap_err();
        assert_eq!(err, NegotiationError::NoCommonVersion { local: vec![1, 4], peer: vec![5, 6] });
    }

    #[test]
    fn test_minimum_must_be_supported() {
        // 1.2 is neither 1.0 nor 1.3
        assert!(negotiator().negotiate(&hello(3, None)).is_err());
        let only_13 = VersionNegotiator::new(&[4]).unwrap();
        assert!(only_13.negotiate(&hello(1, None)).is_err());
    }

    #[test]
    fn test_local_versions_are_filtered() {
        let n = VersionNegotiator::new(&[4, 2, 1, 4]).unwrap();
        assert_eq!(n.versions(), &[1, 4]);
        assert_eq!(n.highest(), 4);
        assert!(VersionNegotiator::new(&[2, 3]).is_err());
    }
}
