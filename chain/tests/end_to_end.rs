//! Multi-module end-to-end scenarios exercised against real node wiring
//! (in-memory transport, `NullStorage`) rather than through a single
//! module's unit tests.

use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigInt;

use chain::config::NodeConfig;
use chain::consensus::{Chain, ChainError, ValidationError};
use chain::crypto::PrivateKey;
use chain::mempool::Mempool;
use chain::node::Node;
use chain::rpc::Payload;
use chain::storage::NullStorage;
use chain::transport::memory::{MemoryNetwork, MemoryTransport};
use chain::transport::Transport;
use chain::types::{Block, BlockVerifyError, Transaction, TxInner};
use chain::Hash;

fn chain_with_genesis() -> Chain {
    Chain::new(Box::new(NullStorage), None)
}

fn signed_transfer(from: &PrivateKey, to: &PrivateKey, value: i64) -> Transaction {
    let mut tx = Transaction {
        data: Vec::new(),
        from: None,
        to: Some(to.public_key()),
        value: Some(BigInt::from(value)),
        inner: TxInner::None,
        nonce: 1234,
        signature: None,
    };
    tx.sign(from);
    tx
}

fn block_at_height_1(validator: &PrivateKey, tip: &Chain, txs: Vec<Transaction>) -> Block {
    let tip_header = tip.tip_header();
    let mut block = Block::new(tip_header.hash(), tip_header.height + 1, 0, txs);
    block.sign(validator);
    block
}

#[test]
fn scenario_1_transfer_happy_path() {
    let chain = chain_with_genesis();
    let validator = PrivateKey::generate();
    let bob = PrivateKey::generate();
    let alice = PrivateKey::generate();

    chain
        .accounts()
        .create_account(bob.public_key().address(), BigInt::from(100_000_000_000i64));

    let tx = signed_transfer(&bob, &alice, 3_000_000_000);
    let block = block_at_height_1(&validator, &chain, vec![tx]);

    chain.add_block(block).expect("block should be admitted");

    assert_eq!(
        chain.accounts().get_balance(&bob.public_key().address()).unwrap(),
        BigInt::from(97_000_000_000i64)
    );
    assert_eq!(
        chain.accounts().get_balance(&alice.public_key().address()).unwrap(),
        BigInt::from(3_000_000_000i64)
    );
}

#[test]
fn scenario_2_tampered_recipient_is_rejected() {
    let chain = chain_with_genesis();
    let validator = PrivateKey::generate();
    let bob = PrivateKey::generate();
    let alice = PrivateKey::generate();
    let hacker = PrivateKey::generate();

    chain
        .accounts()
        .create_account(bob.public_key().address(), BigInt::from(100_000_000_000i64));

    let mut tx = signed_transfer(&bob, &alice, 3_000_000_000);
    tx.to = Some(hacker.public_key());
    let block = block_at_height_1(&validator, &chain, vec![tx]);

    let err = chain.add_block(block).unwrap_err();
    assert!(matches!(
        err,
        ChainError::Validation(ValidationError::Verify(BlockVerifyError::InvalidSignature))
    ));

    assert_eq!(
        chain.accounts().get_balance(&bob.public_key().address()).unwrap(),
        BigInt::from(100_000_000_000i64)
    );
    assert!(chain.accounts().get_balance(&alice.public_key().address()).is_err());
}

#[test]
fn scenario_3_out_of_order_block_is_rejected() {
    let chain = chain_with_genesis();
    let validator = PrivateKey::generate();

    let mut block = Block::new(Hash::ZERO, 223, 0, vec![]);
    block.sign(&validator);

    match chain.add_block(block) {
        Err(ChainError::Validation(ValidationError::HeightOutOfOrder { block_height, chain_height })) => {
            assert_eq!(block_height, 223);
            assert_eq!(chain_height, 0);
        }
        other => panic!("expected HeightOutOfOrder, got {other:?}"),
    }
}

#[test]
fn scenario_4_vm_compute_store_and_load() {
    use chain::state::ContractState;
    use chain::vm::{self, Opcode, Value};

    let state = ContractState::new();

    // Add(2, 3) -> Int(5)
    let mut program = vec![2u8, Opcode::PushInt as u8, 3u8, Opcode::PushInt as u8, Opcode::Add as u8];
    // push "hey" byte by byte then Pack(3), Store
    for b in b"hey" {
        program.push(*b);
        program.push(Opcode::PushByte as u8);
    }
    program.push(3u8);
    program.push(Opcode::PushInt as u8);
    program.push(Opcode::Pack as u8);
    program.push(Opcode::Store as u8);

    vm::run(&program, &state).expect("program should run");
    assert_eq!(state.get(b"hey").unwrap(), 5i64.to_le_bytes().to_vec());

    // load it back
    let mut load_program = Vec::new();
    for b in b"hey" {
        load_program.push(*b);
        load_program.push(Opcode::PushByte as u8);
    }
    load_program.push(3u8);
    load_program.push(Opcode::PushInt as u8);
    load_program.push(Opcode::Pack as u8);
    load_program.push(Opcode::Get as u8);

    let stack = vm::run(&load_program, &state).expect("load program should run");
    assert_eq!(stack, vec![Value::Bytes(5i64.to_le_bytes().to_vec())]);
}

#[test]
fn scenario_5_mempool_eviction_keeps_only_the_last_transaction() {
    let pool = Mempool::new(1);
    let mut hashes = Vec::new();
    for i in 0..5u64 {
        let key = PrivateKey::generate();
        let mut tx = Transaction {
            data: Vec::new(),
            from: None,
            to: None,
            value: None,
            inner: TxInner::None,
            nonce: i,
            signature: None,
        };
        tx.sign(&key);
        hashes.push(tx.hash());
        pool.add(tx);
    }

    assert_eq!(pool.all_count(), 1);
    assert!(pool.contains(hashes.last().unwrap()));
    for h in &hashes[..hashes.len() - 1] {
        assert!(!pool.contains(h));
    }
}

#[tokio::test]
async fn scenario_6_peer_sync_brings_a_follower_up_to_date() {
    let network = MemoryNetwork::new();

    let transport_a: Arc<dyn Transport> = Arc::new(MemoryTransport::new("a".into(), network.clone()));
    let validator_key = PrivateKey::generate();
    let node_a = Node::new(
        NodeConfig {
            listen_addr: "a".into(),
            private_key: Some(validator_key),
            block_time: Duration::from_millis(20),
            ..Default::default()
        },
        transport_a,
        Box::new(NullStorage),
        None,
    );
    let handle_a = tokio::spawn(node_a.clone().run());

    // Let the validator seal a handful of blocks.
    let seal_deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while node_a.chain().height() < 10 {
        if tokio::time::Instant::now() > seal_deadline {
            panic!("validator never reached height 10 (stuck at {})", node_a.chain().height());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let transport_b: Arc<dyn Transport> = Arc::new(MemoryTransport::new("b".into(), network.clone()));
    let node_b = Node::new(
        NodeConfig {
            listen_addr: "b".into(),
            seed_nodes: vec!["a".into()],
            ..Default::default()
        },
        transport_b,
        Box::new(NullStorage),
        None,
    );
    let handle_b = tokio::spawn(node_b.clone().run());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while node_b.chain().height() < node_a.chain().height() {
        if tokio::time::Instant::now() > deadline {
            panic!("node B never caught up: a={}, b={}", node_a.chain().height(), node_b.chain().height());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(node_a.chain().height(), node_b.chain().height());
    for h in 0..=node_a.chain().height() {
        let a_header = node_a.chain().get_block(h).unwrap().header_hash();
        let b_header = node_b.chain().get_block(h).unwrap().header_hash();
        assert_eq!(a_header, b_header, "header hash mismatch at height {h}");
    }

    node_a.quit_handle().send(()).await.unwrap();
    node_b.quit_handle().send(()).await.unwrap();
    let _ = handle_a.await;
    let _ = handle_b.await;
}

#[test]
fn balance_is_conserved_across_a_sequence_of_transfers() {
    let chain = chain_with_genesis();
    let validator = PrivateKey::generate();
    let keys: Vec<PrivateKey> = (0..4).map(|_| PrivateKey::generate()).collect();

    chain.accounts().create_account(
        keys[0].public_key().address(),
        BigInt::from(1_000_000_000_000i64),
    );

    let total_before: BigInt = keys
        .iter()
        .map(|k| {
            chain
                .accounts()
                .get_balance(&k.public_key().address())
                .unwrap_or_else(|_| BigInt::from(0))
        })
        .sum();

    // Each account forwards a third of its balance to the next one,
    // round-robin, across four separately-sealed blocks.
    for i in 0..keys.len() {
        let from = &keys[i];
        let to = &keys[(i + 1) % keys.len()];
        let balance = chain
            .accounts()
            .get_balance(&from.public_key().address())
            .unwrap_or_else(|_| BigInt::from(0));
        if balance == BigInt::from(0) {
            continue;
        }
        let amount = &balance / 3;
        if amount == BigInt::from(0) {
            continue;
        }
        let tx = signed_transfer(from, to, amount.to_string().parse().unwrap());
        let block = block_at_height_1(&validator, &chain, vec![tx]);
        chain.add_block(block).expect("transfer block should be admitted");
    }

    let total_after: BigInt = keys
        .iter()
        .map(|k| {
            chain
                .accounts()
                .get_balance(&k.public_key().address())
                .unwrap_or_else(|_| BigInt::from(0))
        })
        .sum();

    assert_eq!(total_before, total_after, "transfers must not create or destroy value");
}

#[test]
fn mempool_bound_is_never_exceeded() {
    let pool = Mempool::new(3);
    for i in 0..50u64 {
        let key = PrivateKey::generate();
        let mut tx = Transaction {
            data: Vec::new(),
            from: None,
            to: None,
            value: None,
            inner: TxInner::None,
            nonce: i,
            signature: None,
        };
        tx.sign(&key);
        pool.add(tx);
        assert!(pool.all_count() <= 3, "mempool exceeded its bound after {} inserts", i + 1);
    }
}

#[test]
fn sync_blocks_request_envelope_roundtrips() {
    // Sanity check on the wire envelope used by the sync scenario above:
    // a StatusRequest is a single header byte with no body.
    let encoded = Payload::StatusRequest.encode();
    assert_eq!(encoded.len(), 1);
    assert!(matches!(Payload::decode(&encoded).unwrap(), Payload::StatusRequest));
}
