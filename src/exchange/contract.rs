// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Exchange vault contract interface.

use alloy::sol;

// Define the exchange vault interface using alloy's sol! macro
sol! {
    #[sol(rpc)]
    interface IExchangeVault {
        /// Emitted when a user deposits a token into the vault.
        event TokenDeposited(address indexed depositor, address indexed token, uint256 amount);

        /// Emitted when a user deposits the native asset into the vault.
        event HbarDeposited(address indexed depositor, uint256 amount);

        /// Admin-only: transfer tokens from the pooled vault balance.
        function transferToken(address token, address recipient, uint256 amount) external returns (bool);

        /// Admin-only: transfer the native asset from the pooled vault balance.
        function transferHbar(address recipient, uint256 amount) external returns (bool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolEvent;

    #[test]
    fn deposit_event_signatures_are_distinct() {
        assert_ne!(
            IExchangeVault::TokenDeposited::SIGNATURE_HASH,
            IExchangeVault::HbarDeposited::SIGNATURE_HASH
        );
    }

    #[test]
    fn token_deposited_signature_matches_declaration() {
        assert_eq!(
            IExchangeVault::TokenDeposited::SIGNATURE,
            "TokenDeposited(address,address,uint256)"
        );
        assert_eq!(
            IExchangeVault::HbarDeposited::SIGNATURE,
            "HbarDeposited(address,uint256)"
        );
    }
}
