//! Default channel access-control list
//!
//! Maps system-chaincode operations to application policies. The table is
//! versioned with the `V2_0` application capability and must stay byte-exact.

use std::collections::BTreeMap;

pub const APPLICATION_READERS: &str = "/Channel/Application/Readers";
pub const APPLICATION_WRITERS: &str = "/Channel/Application/Writers";

/// Default ACLs for `V2_0` application channels
pub const DEFAULT_ACLS: &[(&str, &str)] = &[
    // _lifecycle
    ("_lifecycle/CheckCommitReadiness", APPLICATION_WRITERS),
    ("_lifecycle/CommitChaincodeDefinition", APPLICATION_WRITERS),
    ("_lifecycle/QueryChaincodeDefinition", APPLICATION_WRITERS),
    ("_lifecycle/QueryChaincodeDefinitions", APPLICATION_WRITERS),
    // lscc
    ("lscc/ChaincodeExists", APPLICATION_READERS),
    ("lscc/GetDeploymentSpec", APPLICATION_READERS),
    ("lscc/GetChaincodeData", APPLICATION_READERS),
    ("lscc/GetInstantiatedChaincodes", APPLICATION_READERS),
    // qscc
    ("qscc/GetChainInfo", APPLICATION_READERS),
    ("qscc/GetBlockByNumber", APPLICATION_READERS),
    ("qscc/GetBlockByHash", APPLICATION_READERS),
    ("qscc/GetTransactionByID", APPLICATION_READERS),
    ("qscc/GetBlockByTxID", APPLICATION_READERS),
    // cscc
    ("cscc/GetConfigBlock", APPLICATION_READERS),
    ("cscc/GetChannelConfig", APPLICATION_READERS),
    // peer
    ("peer/Propose", APPLICATION_WRITERS),
    ("peer/ChaincodeToChaincode", APPLICATION_WRITERS),
    // events
    ("event/Block", APPLICATION_READERS),
    ("event/FilteredBlock", APPLICATION_READERS),
];

/// Default ACL table as a map, the form stored in channel configs
pub fn default_acls() -> BTreeMap<String, String> {
    DEFAULT_ACLS
        .iter()
        .map(|(resource, policy)| (resource.to_string(), policy.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_unique() {
        assert_eq!(default_acls().len(), DEFAULT_ACLS.len());
    }

    #[test]
    fn test_writers_only_for_lifecycle_and_peer() {
        for (resource, policy) in DEFAULT_ACLS {
            let expect_writers =
                resource.starts_with("_lifecycle/") || resource.starts_with("peer/");
            assert_eq!(
                *policy == APPLICATION_WRITERS,
                expect_writers,
                "unexpected policy for {}",
                resource
            );
        }
    }

    #[test]
    fn test_known_entries() {
        let acls = default_acls();
        assert_eq!(acls["qscc/GetBlockByNumber"], APPLICATION_READERS);
        assert_eq!(acls["cscc/GetChannelConfig"], APPLICATION_READERS);
        assert_eq!(acls["_lifecycle/CommitChaincodeDefinition"], APPLICATION_WRITERS);
        assert_eq!(acls["event/FilteredBlock"], APPLICATION_READERS);
    }
}
