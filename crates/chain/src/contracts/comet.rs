//! Comet (Compound III) ledger interface.

use alloy::primitives::{Address, B256};
use alloy::sol;
use alloy::sol_types::SolEvent;

sol! {
    /// Per-collateral configuration as returned by `getAssetInfo`.
    #[derive(Debug)]
    struct AssetInfo {
        uint8 offset;
        address asset;
        address priceFeed;
        uint64 scale;
        uint64 borrowCollateralFactor;
        uint64 liquidateCollateralFactor;
        uint64 liquidationFactor;
        uint128 supplyCap;
    }

    #[derive(Debug)]
    struct UserCollateral {
        uint128 balance;
        uint128 _reserved;
    }

    #[sol(rpc)]
    interface IComet {
        event Withdraw(address indexed src, address indexed to, uint amount);

        function numAssets() external view returns (uint8);
        function getAssetInfo(uint8 i) external view returns (AssetInfo memory);
        function isLiquidatable(address account) external view returns (bool);
        function getCollateralReserves(address asset) external view returns (uint);
        function getPrice(address priceFeed) external view returns (uint);
        function baseToken() external view returns (address);
        function userCollateral(address account, address asset) external view returns (UserCollateral memory);
    }
}

/// Topic0 of the ledger's `Withdraw` event.
pub fn withdraw_topic() -> B256 {
    IComet::Withdraw::SIGNATURE_HASH
}

/// Extract the `src` account from a raw `Withdraw` log's topics.
///
/// Returns `None` when the log is not a `Withdraw` or is missing the indexed topic.
pub fn withdraw_source(topics: &[B256]) -> Option<Address> {
    let (sig, rest) = topics.split_first()?;
    if *sig != withdraw_topic() {
        return None;
    }
    let src = rest.first()?;
    Some(Address::from_slice(&src[12..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, keccak256};

    fn topic_for(addr: Address) -> B256 {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(addr.as_slice());
        B256::from(word)
    }

    #[test]
    fn test_withdraw_topic_matches_signature() {
        assert_eq!(
            withdraw_topic(),
            keccak256("Withdraw(address,address,uint256)")
        );
    }

    #[test]
    fn test_withdraw_source_reads_first_indexed_topic() {
        let src = address!("1111111111111111111111111111111111111111");
        let to = address!("2222222222222222222222222222222222222222");
        let topics = [withdraw_topic(), topic_for(src), topic_for(to)];
        assert_eq!(withdraw_source(&topics), Some(src));
    }

    #[test]
    fn test_withdraw_source_rejects_other_events() {
        let src = address!("1111111111111111111111111111111111111111");
        let topics = [keccak256("Supply(address,address,uint256)"), topic_for(src)];
        assert_eq!(withdraw_source(&topics), None);
        assert_eq!(withdraw_source(&[withdraw_topic()]), None);
        assert_eq!(withdraw_source(&[]), None);
    }
}
