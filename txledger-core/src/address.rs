//! Address format checks, run before any network call.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{LedgerError, Result};
use crate::model::Chain;

static BASE58_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[123mn][1-9A-HJ-NP-Za-km-z]{25,34}$").expect("static regex")
});

static BECH32_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(bc|tb|bcrt)1[qpzry9x8gf2tvdw0s3jn54khce6mua7l]{8,87}$").expect("static regex")
});

static EVM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static regex"));

/// Format-level check only (no checksum verification).
pub fn is_valid_address(chain: Chain, address: &str) -> bool {
    match chain {
        Chain::Bitcoin => {
            if BASE58_RE.is_match(address) {
                return true;
            }
            // Bech32 is either all lower or all upper case
            let lower = address.to_ascii_lowercase();
            let single_case = address == lower || address == address.to_ascii_uppercase();
            single_case && BECH32_RE.is_match(&lower)
        }
        Chain::Ethereum => EVM_RE.is_match(address),
    }
}

pub fn validate_address(chain: Chain, address: &str) -> Result<()> {
    if is_valid_address(chain, address) {
        Ok(())
    } else {
        Err(LedgerError::InvalidAddress {
            chain,
            address: address.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitcoin_addresses() {
        assert!(is_valid_address(Chain::Bitcoin, "3MqUP6G1daVS5YTD8fz3QgwjZortWwxXFd"));
        assert!(is_valid_address(Chain::Bitcoin, "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2"));
        assert!(is_valid_address(
            Chain::Bitcoin,
            "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"
        ));
        assert!(is_valid_address(
            Chain::Bitcoin,
            "BC1QAR0SRRR7XFKVY5L643LYDNW9RE59GTZZWF5MDQ"
        ));
    }

    #[test]
    fn test_bitcoin_rejects_garbage() {
        assert!(!is_valid_address(Chain::Bitcoin, ""));
        assert!(!is_valid_address(Chain::Bitcoin, "0x0000000000000000000000000000000000000000"));
        // 'O' and '0' are not base58
        assert!(!is_valid_address(Chain::Bitcoin, "1OvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2"));
        // mixed-case bech32
        assert!(!is_valid_address(
            Chain::Bitcoin,
            "bc1qAR0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"
        ));
    }

    #[test]
    fn test_evm_addresses() {
        assert!(is_valid_address(
            Chain::Ethereum,
            "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"
        ));
        assert!(!is_valid_address(Chain::Ethereum, "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA9604"));
        assert!(!is_valid_address(Chain::Ethereum, "d8dA6BF26964aF9D7eEd9e03E53415D37aA96045"));
    }

    #[test]
    fn test_validate_address_error() {
        let err = validate_address(Chain::Ethereum, "nope").unwrap_err();
        match err {
            LedgerError::InvalidAddress { chain, address } => {
                assert_eq!(chain, Chain::Ethereum);
                assert_eq!(address, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
