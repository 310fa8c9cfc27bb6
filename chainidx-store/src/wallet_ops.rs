//! Wallet and atomic-swap-contract maintenance (spec.md §3 "Wallet
//! variants", "AtomicSwapContract"; §4.2 `save_wallet`/`save_contract`).
//!
//! An output's condition resolves to at most one "touch target": the
//! wallet whose balance its value counts towards, or — for
//! [`Condition::AtomicSwap`] — the standalone contract record that holds
//! the value until claimed or refunded. The change applier calls the
//! functions here once per output alongside every [`crate::aggregator`]
//! call, so wallet/contract state stays in lock-step with the chain-wide
//! totals (spec.md Invariant 5).
//!
//! A `TimeLock` condition is transparent here: it is unwrapped down to the
//! `Nil`/`UnlockHash`/`MultiSignature` it wraps (spec.md §4.1 guarantees a
//! `TimeLock` can only wrap one of those three) before resolving a touch
//! target, since the lock/unlock transition itself is tracked separately
//! by [`move_locked`].

use crate::batch::WriteBatch;
use crate::error::{Result, StoreError};
use crate::store;
use crate::trees::Trees;
use chainidx_types::swap::SwapSpenditure;
use chainidx_types::{
    Address, AtomicSwapContract, Balance, Condition, Fulfillment, Hash256, Output, OutputKind,
    TransactionId, Wallet,
};
use sha2::{Digest, Sha256};

pub(crate) fn resolved_condition(condition: &Condition) -> &Condition {
    match condition {
        Condition::TimeLock { condition, .. } => resolved_condition(condition),
        other => other,
    }
}

fn derive_multisig_address(addresses: &[Address], required_signatures: u64) -> Address {
    let mut hasher = Sha256::new();
    for address in addresses {
        hasher.update([address.unlock_type]);
        hasher.update(address.hash.as_bytes());
    }
    hasher.update(required_signatures.to_be_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    Address::new(Address::MULTI_SIGNATURE, Hash256(bytes))
}

fn derive_swap_address(sender: &Address, receiver: &Address, hashed_secret: &Hash256, timelock: u64) -> Address {
    let mut hasher = Sha256::new();
    hasher.update([sender.unlock_type]);
    hasher.update(sender.hash.as_bytes());
    hasher.update([receiver.unlock_type]);
    hasher.update(receiver.hash.as_bytes());
    hasher.update(hashed_secret.as_bytes());
    hasher.update(timelock.to_be_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    Address::new(Address::ATOMIC_SWAP_CONTRACT, Hash256(bytes))
}

fn default_wallet_for(address: Address) -> Wallet {
    match address.unlock_type {
        Address::SINGLE_SIGNATURE => Wallet::SingleSignature {
            address,
            balances: Default::default(),
            cosigned_wallets: Vec::new(),
        },
        Address::MULTI_SIGNATURE => Wallet::MultiSignature {
            address,
            balances: Default::default(),
            owners: Vec::new(),
            required_signatures: 0,
        },
        _ => Wallet::FreeForAll {
            address,
            balances: Default::default(),
        },
    }
}

fn load_or_default(trees: &Trees, batch: &WriteBatch, address: &Address) -> Result<Wallet> {
    match store::get_wallet(trees, batch, address) {
        Ok(wallet) => Ok(wallet),
        Err(StoreError::NotFound) => Ok(default_wallet_for(*address)),
        Err(e) => Err(e),
    }
}

fn is_zero_balance(wallet: &Wallet) -> bool {
    let b = wallet.balances();
    b.coins.unlocked.is_zero()
        && b.coins.locked.is_zero()
        && b.block_stakes.unlocked.is_zero()
        && b.block_stakes.locked.is_zero()
}

/// Saves the wallet, or deletes it if every balance it carries has
/// returned to zero. Spec.md §3 says wallets "persist across reverts of
/// later blocks" and are "only destroyed on revert of the block that
/// created them"; since this engine does not separately track which
/// block first touched a wallet, a zero balance is used as the proxy for
/// "back to non-existence" (spec.md §8 scenario 3 explicitly allows
/// either "wallet deleted" or "balance zero" as the outcome). Auxiliary
/// relationship fields (`cosigned_wallets`, multisig `owners`) are not
/// preserved across such a deletion — the same "deliberately leak forward,
/// never retract" choice spec.md §9 documents for per-address pubkey
/// mappings is applied here.
fn save_or_prune(trees: &Trees, batch: &mut WriteBatch, wallet: Wallet) -> Result<()> {
    if is_zero_balance(&wallet) {
        store::delete_wallet(trees, batch, &wallet.address())
    } else {
        store::save_wallet(trees, batch, &wallet)
    }
}

fn balance_mut(wallet: &mut Wallet, kind: OutputKind) -> &mut Balance {
    let balances = wallet.balances_mut();
    if kind.is_block_stake() {
        &mut balances.block_stakes
    } else {
        &mut balances.coins
    }
}

fn adjust_balance(balance: &mut Balance, output: &Output, locked: bool, adding: bool) {
    let field = if locked { &mut balance.locked } else { &mut balance.unlocked };
    *field = if adding {
        &*field + &output.value
    } else {
        field.sub_or_panic(&output.value)
    };
}

fn adjust_wallet_for_address(
    trees: &Trees,
    batch: &mut WriteBatch,
    address: &Address,
    output: &Output,
    locked: bool,
    adding: bool,
) -> Result<()> {
    let mut wallet = load_or_default(trees, batch, address)?;
    adjust_balance(balance_mut(&mut wallet, output.kind), output, locked, adding);
    save_or_prune(trees, batch, wallet)
}

/// Registers `owners`/`required_signatures` on a multisig wallet's first
/// touch, and records the multisig address in each owner's
/// `cosigned_wallets` (spec.md §3). Only ever adds; see [`save_or_prune`]
/// for why removal is not attempted on the owner side either.
fn ensure_multisig_metadata(
    trees: &Trees,
    batch: &mut WriteBatch,
    multisig_address: Address,
    owners: &[Address],
    required_signatures: u64,
) -> Result<()> {
    let mut wallet = load_or_default(trees, batch, &multisig_address)?;
    if let Wallet::MultiSignature {
        owners: stored_owners,
        required_signatures: stored_required,
        ..
    } = &mut wallet
    {
        if stored_owners.is_empty() {
            *stored_owners = owners.to_vec();
        }
        if *stored_required == 0 {
            *stored_required = required_signatures;
        }
    }
    store::save_wallet(trees, batch, &wallet)?;

    for owner in owners {
        let mut owner_wallet = load_or_default(trees, batch, owner)?;
        if let Wallet::SingleSignature { cosigned_wallets, .. } = &mut owner_wallet {
            if !cosigned_wallets.contains(&multisig_address) {
                cosigned_wallets.push(multisig_address);
            }
        }
        store::save_wallet(trees, batch, &owner_wallet)?;
    }
    Ok(())
}

fn adjust_wallet_only(trees: &Trees, batch: &mut WriteBatch, output: &Output, locked: bool, adding: bool) -> Result<()> {
    match resolved_condition(&output.condition) {
        Condition::UnlockHash(address) => adjust_wallet_for_address(trees, batch, address, output, locked, adding),
        Condition::MultiSignature {
            addresses,
            required_signatures,
        } => {
            let multisig_address = derive_multisig_address(addresses, *required_signatures);
            adjust_wallet_for_address(trees, batch, &multisig_address, output, locked, adding)
        }
        _ => Ok(()),
    }
}

fn create_or_grow_contract(
    trees: &Trees,
    batch: &mut WriteBatch,
    output: &Output,
    sender: &Address,
    receiver: &Address,
    hashed_secret: &Hash256,
    timelock: u64,
) -> Result<()> {
    let address = derive_swap_address(sender, receiver, hashed_secret, timelock);
    let mut contract = match store::get_contract(trees, batch, &address) {
        Ok(contract) => contract,
        Err(StoreError::NotFound) => AtomicSwapContract {
            address,
            value: chainidx_types::Currency::zero(),
            sender: *sender,
            receiver: *receiver,
            hashed_secret: *hashed_secret,
            timelock,
            relevant_transactions: Vec::new(),
            funding_input: output.id,
            spenditure: None,
        },
        Err(e) => return Err(e),
    };
    contract.value = &contract.value + &output.value;
    if !contract.relevant_transactions.contains(&output.parent_id) {
        contract.relevant_transactions.push(output.parent_id);
    }
    store::save_contract(trees, batch, &contract)
}

fn shrink_or_delete_contract(
    trees: &Trees,
    batch: &mut WriteBatch,
    output: &Output,
    sender: &Address,
    receiver: &Address,
    hashed_secret: &Hash256,
    timelock: u64,
) -> Result<()> {
    let address = derive_swap_address(sender, receiver, hashed_secret, timelock);
    let mut contract = store::get_contract(trees, batch, &address)?;
    contract.value = contract.value.sub_or_panic(&output.value);
    contract.relevant_transactions.retain(|id| *id != output.parent_id);
    if contract.value.is_zero() && contract.spenditure.is_none() {
        store::delete_contract(trees, batch, &address)
    } else {
        store::save_contract(trees, batch, &contract)
    }
}

/// Folds a newly created, currently-unspent output into wallet/contract
/// state: credits the owning wallet, or creates/grows the atomic-swap
/// contract it funds (spec.md §4.2 `save_output`).
pub fn credit_output(trees: &Trees, batch: &mut WriteBatch, output: &Output, locked: bool) -> Result<()> {
    match resolved_condition(&output.condition) {
        Condition::Nil | Condition::Unknown { .. } => Ok(()),
        Condition::UnlockHash(address) => adjust_wallet_for_address(trees, batch, address, output, locked, true),
        Condition::MultiSignature {
            addresses,
            required_signatures,
        } => {
            let multisig_address = derive_multisig_address(addresses, *required_signatures);
            adjust_wallet_for_address(trees, batch, &multisig_address, output, locked, true)?;
            ensure_multisig_metadata(trees, batch, multisig_address, addresses, *required_signatures)
        }
        Condition::AtomicSwap {
            sender,
            receiver,
            hashed_secret,
            timestamp,
        } => create_or_grow_contract(trees, batch, output, sender, receiver, hashed_secret, *timestamp),
        Condition::TimeLock { .. } => unreachable!("resolved_condition unwraps TimeLock"),
    }
}

/// Inverse of [`credit_output`]: called when an output's creating block is
/// reverted, so the output (and everything it funded) stops existing
/// entirely (spec.md §4.5 revert path).
pub fn destroy_output(trees: &Trees, batch: &mut WriteBatch, output: &Output, locked: bool) -> Result<()> {
    match resolved_condition(&output.condition) {
        Condition::Nil | Condition::Unknown { .. } => Ok(()),
        Condition::UnlockHash(address) => adjust_wallet_for_address(trees, batch, address, output, locked, false),
        Condition::MultiSignature {
            addresses,
            required_signatures,
        } => {
            let multisig_address = derive_multisig_address(addresses, *required_signatures);
            adjust_wallet_for_address(trees, batch, &multisig_address, output, locked, false)
        }
        Condition::AtomicSwap {
            sender,
            receiver,
            hashed_secret,
            timestamp,
        } => shrink_or_delete_contract(trees, batch, output, sender, receiver, hashed_secret, *timestamp),
        Condition::TimeLock { .. } => unreachable!("resolved_condition unwraps TimeLock"),
    }
}

/// Debits the owning wallet when an output is spent, and — for an
/// atomic-swap output — records the claim/refund on its contract without
/// destroying it (the contract itself persists as a historical record;
/// only reverting its *creating* block removes it, via [`destroy_output`]).
/// Spend-time locked state is assumed `false`: only already-unlocked
/// outputs are spendable under the rules the upstream consensus module
/// already enforced before handing this change to the indexer.
pub fn spend_output(
    trees: &Trees,
    batch: &mut WriteBatch,
    output: &Output,
    fulfillment: &Fulfillment,
    spending_transaction: TransactionId,
) -> Result<()> {
    adjust_wallet_only(trees, batch, output, false, false)?;
    if let Condition::AtomicSwap {
        sender,
        receiver,
        hashed_secret,
        timestamp,
    } = resolved_condition(&output.condition)
    {
        let address = derive_swap_address(sender, receiver, hashed_secret, *timestamp);
        let mut contract = store::get_contract(trees, batch, &address)?;
        contract.spenditure = Some(SwapSpenditure {
            fulfillment: fulfillment.clone(),
            coin_output: output.id,
        });
        if !contract.relevant_transactions.contains(&spending_transaction) {
            contract.relevant_transactions.push(spending_transaction);
        }
        store::save_contract(trees, batch, &contract)?;
    }
    Ok(())
}

/// Inverse of [`spend_output`], used when reverting the block that spent
/// this output.
pub fn unspend_output(
    trees: &Trees,
    batch: &mut WriteBatch,
    output: &Output,
    spending_transaction: TransactionId,
) -> Result<()> {
    adjust_wallet_only(trees, batch, output, false, true)?;
    if let Condition::AtomicSwap {
        sender,
        receiver,
        hashed_secret,
        timestamp,
    } = resolved_condition(&output.condition)
    {
        let address = derive_swap_address(sender, receiver, hashed_secret, *timestamp);
        let mut contract = store::get_contract(trees, batch, &address)?;
        contract.spenditure = None;
        contract.relevant_transactions.retain(|id| *id != spending_transaction);
        store::save_contract(trees, batch, &contract)?;
    }
    Ok(())
}

/// Moves an output's value between a wallet's locked and unlocked balance
/// when the lock schedule unlocks or relocks it (spec.md §4.3/§4.4); a
/// no-op for conditions that do not resolve to a wallet (`AtomicSwap`
/// contracts have no locked/unlocked split).
pub fn move_locked(trees: &Trees, batch: &mut WriteBatch, output: &Output, locking: bool) -> Result<()> {
    let address = match resolved_condition(&output.condition) {
        Condition::UnlockHash(address) => *address,
        Condition::MultiSignature {
            addresses,
            required_signatures,
        } => derive_multisig_address(addresses, *required_signatures),
        _ => return Ok(()),
    };
    let mut wallet = load_or_default(trees, batch, &address)?;
    let balance = balance_mut(&mut wallet, output.kind);
    if locking {
        balance.unlocked = balance.unlocked.sub_or_panic(&output.value);
        balance.locked = &balance.locked + &output.value;
    } else {
        balance.locked = balance.locked.sub_or_panic(&output.value);
        balance.unlocked = &balance.unlocked + &output.value;
    }
    save_or_prune(trees, batch, wallet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::test_trees;
    use chainidx_types::{Currency, Hash256, OutputKind, ReferencePoint};

    fn coin_output(id: u8, value: u64, address: Address) -> Output {
        Output {
            id: Hash256([id; 32]),
            parent_id: Hash256([0xAA; 32]),
            kind: OutputKind::Coin,
            value: Currency::from_u64(value),
            condition: Condition::UnlockHash(address),
            reference_point: ReferencePoint::ALWAYS_UNLOCKED,
            spenditure: None,
        }
    }

    #[test]
    fn credit_then_destroy_output_restores_wallet_absence() {
        let (_db, trees) = test_trees();
        let address = Address::new(Address::SINGLE_SIGNATURE, Hash256([1u8; 32]));
        let output = coin_output(1, 100, address);

        let mut batch = WriteBatch::new();
        credit_output(&trees, &mut batch, &output, false).unwrap();
        batch.commit(&trees).unwrap();

        let batch = WriteBatch::new();
        let wallet = store::get_wallet(&trees, &batch, &address).unwrap();
        assert_eq!(wallet.balances().coins.unlocked, Currency::from_u64(100));

        let mut batch = WriteBatch::new();
        destroy_output(&trees, &mut batch, &output, false).unwrap();
        batch.commit(&trees).unwrap();

        let batch = WriteBatch::new();
        assert!(matches!(
            store::get_wallet(&trees, &batch, &address).unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[test]
    fn spend_then_unspend_output_is_identity() {
        let (_db, trees) = test_trees();
        let address = Address::new(Address::SINGLE_SIGNATURE, Hash256([1u8; 32]));
        let output = coin_output(1, 100, address);
        let tx = Hash256([2u8; 32]);
        let fulfillment = Fulfillment::Unknown { tag: 0xFF, raw: vec![] };

        let mut batch = WriteBatch::new();
        credit_output(&trees, &mut batch, &output, false).unwrap();
        batch.commit(&trees).unwrap();

        let mut batch = WriteBatch::new();
        spend_output(&trees, &mut batch, &output, &fulfillment, tx).unwrap();
        batch.commit(&trees).unwrap();

        let batch = WriteBatch::new();
        assert!(matches!(
            store::get_wallet(&trees, &batch, &address).unwrap_err(),
            StoreError::NotFound
        ));

        let mut batch = WriteBatch::new();
        unspend_output(&trees, &mut batch, &output, tx).unwrap();
        batch.commit(&trees).unwrap();

        let batch = WriteBatch::new();
        let wallet = store::get_wallet(&trees, &batch, &address).unwrap();
        assert_eq!(wallet.balances().coins.unlocked, Currency::from_u64(100));
    }

    #[test]
    fn multisig_output_credits_derived_wallet_and_tags_owners() {
        let (_db, trees) = test_trees();
        let owner_a = Address::new(Address::SINGLE_SIGNATURE, Hash256([1u8; 32]));
        let owner_b = Address::new(Address::SINGLE_SIGNATURE, Hash256([2u8; 32]));
        let condition = Condition::MultiSignature {
            addresses: vec![owner_a, owner_b],
            required_signatures: 2,
        };
        let output = Output {
            id: Hash256([9u8; 32]),
            parent_id: Hash256([0xAA; 32]),
            kind: OutputKind::Coin,
            value: Currency::from_u64(50),
            condition,
            reference_point: ReferencePoint::ALWAYS_UNLOCKED,
            spenditure: None,
        };

        let mut batch = WriteBatch::new();
        credit_output(&trees, &mut batch, &output, false).unwrap();
        batch.commit(&trees).unwrap();

        let batch = WriteBatch::new();
        let owner_wallet = store::get_wallet(&trees, &batch, &owner_a).unwrap();
        match owner_wallet {
            Wallet::SingleSignature { cosigned_wallets, .. } => assert_eq!(cosigned_wallets.len(), 1),
            other => panic!("expected single-signature wallet, got {:?}", other),
        }
    }

    #[test]
    fn atomic_swap_output_creates_contract_then_deletes_on_destroy() {
        let (_db, trees) = test_trees();
        let sender = Address::new(Address::SINGLE_SIGNATURE, Hash256([1u8; 32]));
        let receiver = Address::new(Address::SINGLE_SIGNATURE, Hash256([2u8; 32]));
        let hashed_secret = Hash256([3u8; 32]);
        let output = Output {
            id: Hash256([9u8; 32]),
            parent_id: Hash256([0xAA; 32]),
            kind: OutputKind::Coin,
            value: Currency::from_u64(75),
            condition: Condition::AtomicSwap {
                sender,
                receiver,
                hashed_secret,
                timestamp: 1_700_000_000,
            },
            reference_point: ReferencePoint::ALWAYS_UNLOCKED,
            spenditure: None,
        };

        let mut batch = WriteBatch::new();
        credit_output(&trees, &mut batch, &output, false).unwrap();
        batch.commit(&trees).unwrap();

        let address = derive_swap_address(&sender, &receiver, &hashed_secret, 1_700_000_000);
        let batch = WriteBatch::new();
        let contract = store::get_contract(&trees, &batch, &address).unwrap();
        assert_eq!(contract.value, Currency::from_u64(75));

        let mut batch = WriteBatch::new();
        destroy_output(&trees, &mut batch, &output, false).unwrap();
        batch.commit(&trees).unwrap();

        let batch = WriteBatch::new();
        assert!(matches!(
            store::get_contract(&trees, &batch, &address).unwrap_err(),
            StoreError::NotFound
        ));
    }
}
