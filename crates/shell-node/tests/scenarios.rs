//! End-to-end scenarios for the Shell Reserve core: settlement lifecycles,
//! RBF, orphan promotion, atomic swaps, and the auxiliary-PoW sunset, all
//! driven through the `ShellCore` façade against a deterministic mock chain.

use std::sync::Arc;

use shell_auxpow::SunsetPhase;
use shell_chain::MockChain;
use shell_core::constants::FEE_CLAIMABLE_CREATE;
use shell_core::error::ShellError;
use shell_core::policy::{ChainParams, Policy};
use shell_core::transaction::{Transaction, TxIn, TxOut, MAX_RBF_SEQUENCE, SEQUENCE_FINAL};
use shell_core::types::{Hash256, MinorUnits, OutPoint};
use shell_crypto::hash::sha256_hash;
use shell_crypto::KeyPair;
use shell_node::{ShellCore, Submission};
use shell_script::{Predicate, SettlementOpcode};
use shell_settlement::{derive_balance_id, derive_channel_id, update_digest};
use shell_swap::{build_contract_tx, build_redeem_tx, extract_secret, HtlcTerms, SwapParams};
use shell_wire::tx_hash;

// ── Harness ───────────────────────────────────────────────────────────────────

fn new_core() -> (Arc<MockChain>, ShellCore) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let chain = Arc::new(MockChain::new());
    let core = ShellCore::new(chain.clone(), Policy::default(), ChainParams::default());
    (chain, core)
}

fn fund(chain: &MockChain, seed: u8, value: MinorUnits) -> OutPoint {
    let out = OutPoint::new(Hash256::from_bytes([seed; 32]), 0);
    chain.add_utxo(out, value, vec![0x51; 25], 500, false);
    out
}

fn spend(prev: OutPoint, out_value: MinorUnits, sequence: u32) -> Arc<Transaction> {
    let mut tx = Transaction::new(1);
    let mut input = TxIn::new(prev);
    input.sequence = sequence;
    tx.inputs.push(input);
    tx.outputs.push(TxOut::new(out_value, vec![0x51; 25]));
    Arc::new(tx)
}

/// A settlement transaction: single input carrying the opcode and witness.
fn settlement_tx(opcode: SettlementOpcode, prev: OutPoint, witness: Vec<Vec<u8>>) -> Arc<Transaction> {
    let mut tx = Transaction::new(2);
    let mut input = TxIn::new(prev);
    input.sig_script = vec![opcode as u8];
    input.witness = witness;
    tx.inputs.push(input);
    tx.outputs.push(TxOut::new(100_000, vec![0x51; 25]));
    Arc::new(tx)
}

// ── Scenario 1: channel lifecycle ────────────────────────────────────────────

#[test]
fn channel_lifecycle_through_block_connection() {
    let (chain, core) = new_core();
    let (alice, bob) = (KeyPair::generate(), KeyPair::generate());
    let funding = fund(&chain, 1, 2_000_000);

    // Open with capacity 1_000_000: all balance starts on alice's side.
    let open = settlement_tx(
        SettlementOpcode::ChannelOpen,
        funding,
        vec![
            alice.public_bytes().to_vec(),
            bob.public_bytes().to_vec(),
            1_000_000i64.to_le_bytes().to_vec(),
        ],
    );
    core.block_connected(&[open], 1_001, false);

    let channel_id = derive_channel_id(&alice.public_key, &bob.public_key, &funding);
    let channel = core.settlement.channels.get(&channel_id).unwrap();
    assert_eq!(channel.balances, [1_000_000, 0]);
    assert!(channel.is_open);

    // Cooperative update to (600_000, 400_000) at nonce 1.
    let digest = update_digest(&channel_id, 600_000, 400_000, 1);
    let update = settlement_tx(
        SettlementOpcode::ChannelUpdate,
        fund(&chain, 2, 1_000_000),
        vec![
            channel_id.0.as_bytes().to_vec(),
            600_000i64.to_le_bytes().to_vec(),
            400_000i64.to_le_bytes().to_vec(),
            1u64.to_le_bytes().to_vec(),
            alice.sign(&digest).serialize_compact().to_vec(),
            bob.sign(&digest).serialize_compact().to_vec(),
        ],
    );
    core.block_connected(&[update], 1_002, false);

    let channel = core.settlement.channels.get(&channel_id).unwrap();
    assert_eq!(channel.balances, [600_000, 400_000]);
    assert_eq!(channel.nonce, 1);
    assert_eq!(channel.balances[0] + channel.balances[1], channel.capacity);

    // Close; the channel becomes terminal.
    let close = settlement_tx(
        SettlementOpcode::ChannelClose,
        fund(&chain, 3, 1_000_000),
        vec![channel_id.0.as_bytes().to_vec()],
    );
    core.block_connected(&[close], 1_003, false);
    assert!(!core.settlement.channels.get(&channel_id).unwrap().is_open);

    // A late update is rejected by the registry.
    let stale = shell_script::ChannelUpdateParams {
        channel_id,
        balance_a: 500_000,
        balance_b: 500_000,
        nonce: 2,
        signatures: vec![],
    };
    assert!(matches!(
        core.settlement.channels.update_channel(&stale, 1_004),
        Err(ShellError::ChannelClosed)
    ));
}

// ── Scenario 2: claimable balance ────────────────────────────────────────────

#[test]
fn claimable_unconditional_claim_is_single_shot() {
    let (chain, core) = new_core();
    let claimer = KeyPair::generate();
    let funding = fund(&chain, 4, 1_000_000);
    let throwaway_sig = claimer.sign(&shell_crypto::hash::sha256(b"create"));

    let create = settlement_tx(
        SettlementOpcode::ClaimableCreate,
        funding,
        vec![
            500_000i64.to_le_bytes().to_vec(),
            vec![1u8],
            claimer.public_bytes().to_vec(),
            Predicate::Unconditional.encode(),
            throwaway_sig.serialize_compact().to_vec(),
        ],
    );
    core.block_connected(&[create], 100, false);
    assert_eq!(core.settlement.claimables.count(), 1);

    let balance_id = derive_balance_id(&claimer.public_key, 500_000, &funding, 100);
    let claim_sig = claimer.sign(&shell_crypto::hash::sha256(b"claim"));
    let claim = settlement_tx(
        SettlementOpcode::ClaimableClaim,
        fund(&chain, 5, 1_000_000),
        vec![
            balance_id.0.as_bytes().to_vec(),
            claimer.public_bytes().to_vec(),
            Vec::new(),
            claim_sig.serialize_compact().to_vec(),
        ],
    );
    core.block_connected(&[claim.clone()], 200, false);
    assert_eq!(core.settlement.claimables.count(), 0);

    // Second claim: the balance no longer exists.
    assert!(matches!(
        core.settlement
            .claimables
            .claim(&balance_id, &claimer.public_key, b"", 1_900_000_000),
        Err(ShellError::UnknownBalance(_))
    ));
}

// ── Scenario 3: RBF replacement ──────────────────────────────────────────────

#[test]
fn rbf_replacement_evicts_lower_rate_original() {
    let (chain, core) = new_core();
    let contested = fund(&chain, 6, 10_000_000);

    // Original pays 10_000 in fees and signals replaceability.
    let original = spend(contested, 9_990_000, MAX_RBF_SEQUENCE);
    let original_id = tx_hash(&original);
    match core.submit_transaction(original, 0, true, false).unwrap() {
        Submission::Accepted(ids) => assert_eq!(ids, vec![original_id]),
        other => panic!("unexpected outcome {other:?}"),
    }

    // Replacement pays 25_000 at the same size: 2.5× the rate.
    let replacement = spend(contested, 9_975_000, MAX_RBF_SEQUENCE);
    let replacement_id = tx_hash(&replacement);
    match core.submit_transaction(replacement, 0, true, false).unwrap() {
        Submission::Accepted(ids) => assert_eq!(ids, vec![replacement_id]),
        other => panic!("unexpected outcome {other:?}"),
    }

    assert!(!core.mempool.is_transaction_in_pool(&original_id));
    assert!(core.mempool.is_transaction_in_pool(&replacement_id));
}

// ── Scenario 4: orphan promotion ─────────────────────────────────────────────

#[test]
fn orphan_child_promoted_when_parent_arrives() {
    let (chain, core) = new_core();
    let base = fund(&chain, 7, 10_000_000);

    let parent = spend(base, 9_990_000, SEQUENCE_FINAL);
    let parent_id = tx_hash(&parent);
    let child = spend(OutPoint::new(parent_id, 0), 9_980_000, SEQUENCE_FINAL);
    let child_id = tx_hash(&child);

    match core.submit_transaction(child, 0, true, false).unwrap() {
        Submission::MissingParents(missing) => assert_eq!(missing, vec![parent_id]),
        other => panic!("unexpected outcome {other:?}"),
    }

    match core.submit_transaction(parent, 0, true, false).unwrap() {
        Submission::Accepted(ids) => assert_eq!(ids, vec![parent_id, child_id]),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(core.mempool.count(), 2);
    assert_eq!(core.mempool.orphan_count(), 0);
}

// ── Scenario 5: atomic swap ──────────────────────────────────────────────────

#[test]
fn atomic_swap_redeem_reveals_secret_byte_for_byte() {
    let (_, core) = new_core();
    let secret = b"central-bank-swap-secret-2026-q1";
    let initiator = KeyPair::generate();
    let participant = KeyPair::generate();

    let swap_id = core
        .swaps
        .new_swap(SwapParams {
            initiator: initiator.public_key,
            participant: participant.public_key,
            amount: 1_000_000_000,
            timeout: 86_400,
            secret_hash: sha256_hash(secret),
            chain_tag: "shell".to_string(),
        })
        .unwrap();

    let terms = HtlcTerms {
        secret_hash: sha256_hash(secret),
        initiator: initiator.public_key,
        participant: participant.public_key,
        timeout: 86_400,
    };
    let funding = OutPoint::new(Hash256::from_bytes([8u8; 32]), 0);
    let contract = build_contract_tx(&terms, funding, 1_000_000_000).unwrap();
    assert_eq!(contract.inputs.len(), 1);
    assert_eq!(contract.outputs.len(), 1);
    core.swaps.mark_active(&swap_id).unwrap();

    let sig = participant.sign(&shell_crypto::hash::sha256(b"redeem"));
    let redeem = build_redeem_tx(&contract, secret, &sig, vec![0x51; 25], &terms).unwrap();

    let revealed = core.swaps.redeem(&swap_id, &redeem).unwrap();
    assert_eq!(revealed, secret.to_vec());
    assert_eq!(
        core.swaps.get(&swap_id).unwrap().status,
        shell_swap::SwapStatus::Redeemed
    );
    assert_eq!(extract_secret(&redeem).unwrap(), secret.to_vec());
}

// ── Scenario 6: auxiliary-PoW sunset ─────────────────────────────────────────

#[test]
fn sunset_notice_then_activation_rejects_auxpow() {
    let chain = Arc::new(MockChain::new());
    let params = ChainParams {
        sunset_hashrate_threshold: 1_000,
        monitoring_blocks: 1_008,
        sunset_notice_blocks: 25_920,
        ..ChainParams::default()
    };
    let core = ShellCore::new(chain, Policy::default(), params);
    core.auxpow.set_network_hashrate(1_000);

    // One full monitoring window of purely native blocks.
    for height in 1..=1_008 {
        core.block_connected(&[], height, false);
    }
    let SunsetPhase::NoticePosted { activates_at } = core.auxpow.sunset_phase() else {
        panic!("sunset notice was not posted");
    };
    assert_eq!(activates_at, 1_008 + 25_920);

    core.block_connected(&[], activates_at, false);
    assert_eq!(core.auxpow.sunset_phase(), SunsetPhase::Sunset);

    // Any further auxiliary proof-of-work is refused.
    let child = shell_core::transaction::BlockHeader::new(
        2,
        Hash256::from_bytes([1u8; 32]),
        Hash256::from_bytes([2u8; 32]),
    );
    let record = shell_auxpow::AuxPowRecord {
        parent_coinbase: Transaction::new(1),
        merkle_branch: vec![],
        merkle_index: 0,
        parent_header: child.clone(),
        chain_index: 0,
        committed_child_hash: Hash256::ZERO,
    };
    assert!(matches!(
        core.auxpow.validate(&record, &child),
        Err(ShellError::AuxPowSunset)
    ));
}

// ── Block connection clears the pool ─────────────────────────────────────────

#[test]
fn confirmed_transactions_leave_the_pool() {
    let (chain, core) = new_core();
    let a = fund(&chain, 9, 1_000_000);
    let tx = spend(a, 990_000, SEQUENCE_FINAL);
    let txid = tx_hash(&tx);

    core.submit_transaction(tx.clone(), 0, true, false).unwrap();
    assert!(core.mempool.is_transaction_in_pool(&txid));

    core.block_connected(&[tx], 1_001, false);
    assert!(!core.mempool.is_transaction_in_pool(&txid));
    assert_eq!(core.mempool.count(), 0);
}

// ── Settlement surcharges at relay ───────────────────────────────────────────

#[test]
fn settlement_transaction_must_pay_its_surcharge() {
    let (chain, core) = new_core();
    let claimer = KeyPair::generate();
    let sig = claimer.sign(&shell_crypto::hash::sha256(b"create"));
    let witness = vec![
        500_000i64.to_le_bytes().to_vec(),
        vec![1u8],
        claimer.public_bytes().to_vec(),
        Predicate::Unconditional.encode(),
        sig.serialize_compact().to_vec(),
    ];

    // Fee below the claimable-create surcharge.
    let cheap_funding = fund(&chain, 10, 10_000_000);
    let mut cheap = (*settlement_tx(
        SettlementOpcode::ClaimableCreate,
        cheap_funding,
        witness.clone(),
    ))
    .clone();
    cheap.outputs[0].value = 10_000_000 - FEE_CLAIMABLE_CREATE / 2;
    assert!(matches!(
        core.submit_transaction(Arc::new(cheap), 0, true, false),
        Err(ShellError::InsufficientFee { .. })
    ));

    // Fee covering the surcharge is admitted.
    let funded = fund(&chain, 11, 10_000_000);
    let mut paid = (*settlement_tx(SettlementOpcode::ClaimableCreate, funded, witness)).clone();
    paid.outputs[0].value = 10_000_000 - FEE_CLAIMABLE_CREATE;
    core.submit_transaction(Arc::new(paid), 0, true, false)
        .unwrap();
}

// ── Liquidity claims through the façade ──────────────────────────────────────

#[test]
fn liquidity_claim_respects_single_claim_ledger() {
    let (_, core) = new_core();
    let attestors: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
    for kp in &attestors {
        core.liquidity.add_attestor(kp.public_key);
    }

    let mut attestation = shell_liquidity::LiquidityAttestation {
        participant_id: Hash256::from_bytes([0x77; 32]),
        epoch: 0,
        volume: 40_000_000,
        spread_bps: 30,
        uptime_bps: 9_800,
        timestamp: 1_770_000_000,
        signatures: Vec::new(),
        merkle_proof: vec![Hash256::from_bytes([0x21; 32])],
        leaf_index: 1,
    };
    let digest = attestation.digest();
    attestation.signatures = attestors
        .iter()
        .map(|kp| shell_liquidity::AttestorSignature {
            attestor: kp.public_key,
            signature: kp.sign(&digest),
        })
        .collect();

    let root = Hash256::from_bytes(shell_crypto::hash::check_merkle_branch(
        digest,
        &attestation.merkle_proof,
        attestation.leaf_index,
    ));
    core.liquidity
        .finalize_epoch(0, root, attestation.weight() * 2)
        .unwrap();

    let max = core.liquidity.claim_reward(&attestation, 0).unwrap();
    assert!(max > 0);
    assert!(matches!(
        core.liquidity.claim_reward(&attestation, 0),
        Err(ShellError::AlreadyClaimed)
    ));
}
