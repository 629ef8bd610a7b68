//! Merges fragmented coin holdings into a single spendable input.

use tracing::{debug, info};

use super::{ChainClient, ChainError, CoinType};
use crate::identity::Identity;

/// Minimum fragment count before a non-gas coin type is worth merging.
const MIN_FRAGMENTS: usize = 2;
/// The native gas coin keeps a stricter threshold: with fewer than three
/// fragments there is nothing left over to pay gas with, so the merge would
/// strand the account.
const MIN_NATIVE_GAS_FRAGMENTS: usize = 3;

/// Merges all mergeable holdings of `coin_type` into the first one with a
/// single transaction, then refreshes balances. Below the fragment threshold
/// this is a no-op and submits nothing.
#[tracing::instrument(skip(chain, identity), level = tracing::Level::DEBUG)]
pub(crate) async fn consolidate<C: ChainClient + ?Sized>(
    chain: &C,
    identity: &Identity,
    coin_type: &CoinType,
) -> Result<(), ChainError> {
    let coins = chain.get_coins(identity.address(), coin_type).await?;

    let is_native_gas = coin_type.is_native_gas();
    let min_fragments = if is_native_gas {
        MIN_NATIVE_GAS_FRAGMENTS
    } else {
        MIN_FRAGMENTS
    };

    if coins.len() < min_fragments {
        debug!(
            %coin_type,
            fragments = coins.len(),
            "holding already consolidated"
        );
        return Ok(());
    }

    let Some((primary, rest)) = coins.split_first() else {
        return Ok(());
    };

    // For the native gas coin the second fragment stays out of the merge so
    // it can fund gas for this transaction and the sweep that follows.
    let sources = if is_native_gas { &rest[1..] } else { rest };

    let digest = chain
        .merge_coins(identity, coin_type, primary, sources)
        .await?;
    info!(
        %coin_type,
        merged = sources.len(),
        %digest,
        "consolidated holdings"
    );

    let balances = chain.get_all_balances(identity.address()).await?;
    debug!(coin_types = balances.len(), "balances refreshed");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::mock::MockChain;
    use super::*;

    fn identity() -> Identity {
        Identity::from_secret_hex(
            "0x0101010101010101010101010101010101010101010101010101010101010101",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn empty_holding_is_a_noop() {
        let chain = MockChain::new();
        let mai = CoinType::new("0xabc::mai::MAI");

        consolidate(&chain, &identity(), &mai).await.unwrap();

        assert!(chain.merge_calls().is_empty());
    }

    #[tokio::test]
    async fn single_holding_is_a_noop() {
        let chain = MockChain::new();
        let mai = CoinType::new("0xabc::mai::MAI");
        chain.set_holdings(&mai, vec![50]);

        consolidate(&chain, &identity(), &mai).await.unwrap();

        assert!(chain.merge_calls().is_empty());
        assert_eq!(chain.holdings(&mai), vec![50]);
    }

    #[tokio::test]
    async fn fragmented_holding_merges_into_the_first() {
        let chain = MockChain::new();
        let mai = CoinType::new("0xabc::mai::MAI");
        chain.set_holdings(&mai, vec![10, 20, 30]);

        consolidate(&chain, &identity(), &mai).await.unwrap();

        let merges = chain.merge_calls();
        assert_eq!(merges.len(), 1);
        assert_eq!(merges[0].coin_type, mai);
        assert_eq!(merges[0].source_count, 2);
        assert_eq!(chain.holdings(&mai), vec![60]);
    }

    #[tokio::test]
    async fn native_gas_with_two_fragments_is_a_noop() {
        let chain = MockChain::new();
        let mgo = CoinType::native_gas();
        chain.set_holdings(&mgo, vec![10, 20]);

        consolidate(&chain, &identity(), &mgo).await.unwrap();

        assert!(chain.merge_calls().is_empty());
        assert_eq!(chain.holdings(&mgo), vec![10, 20]);
    }

    #[tokio::test]
    async fn native_gas_with_three_fragments_merges_and_reserves_one() {
        let chain = MockChain::new();
        let mgo = CoinType::native_gas();
        chain.set_holdings(&mgo, vec![10, 20, 30, 40]);

        consolidate(&chain, &identity(), &mgo).await.unwrap();

        let merges = chain.merge_calls();
        assert_eq!(merges.len(), 1);
        // The second fragment stays aside as the gas reserve.
        assert_eq!(merges[0].source_count, 2);
        assert_eq!(chain.holdings(&mgo), vec![80, 20]);
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let chain = MockChain::new();
        let mai = CoinType::new("0xabc::mai::MAI");
        chain.fail_next_get_coins("connection reset");

        let result = consolidate(&chain, &identity(), &mai).await;

        assert!(result.is_err());
    }
}
