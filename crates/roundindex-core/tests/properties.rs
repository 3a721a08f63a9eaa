//! Generated log sequences checked against the pooled-balance and
//! creator-pass rules.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, B256, I256, U256};
use futures::stream;
use proptest::prelude::*;

use roundindex_core::entity::{
    AssetType, Balance, Claim, Deposit, HouseType, Reclaim, RoundCreator, RoundType,
};
use roundindex_core::events::{
    AssetParams, AwardClaimed, DepositToRound, HouseCreated, RoundCreated, TransferSingle,
};
use roundindex_core::{
    ids, ContractFamily, EntityStoreExt, EventPayload, Indexer, IndexerConfig, LogEvent, LogMeta,
    MemoryCheckpointStore, MemoryEntityStore,
};

const HOUSE: Address = Address::new([0x40; 20]);
const ROUND: Address = Address::new([0x70; 20]);
const PASS: Address = Address::new([0x50; 20]);
const ACTORS: [Address; 3] = [
    Address::new([0x0a; 20]),
    Address::new([0x0b; 20]),
    Address::new([0x0c; 20]),
];

#[derive(Clone, Debug)]
enum LedgerOp {
    Deposit { from: usize, amount: u64 },
    Claim { claimer: usize, amount: u64 },
    Transfer { from: usize, to: usize, amount: u64 },
    Burn { from: usize, amount: u64 },
}

#[derive(Clone, Debug)]
enum PassOp {
    Mint { to: usize, amount: u64 },
    Transfer { from: usize, to: usize, amount: u64 },
    Burn { from: usize, amount: u64 },
}

fn actor() -> impl Strategy<Value = usize> {
    0..ACTORS.len()
}

fn ledger_amount() -> impl Strategy<Value = u64> {
    prop_oneof![Just(0u64), 0..50u64]
}

fn pass_amount() -> impl Strategy<Value = u64> {
    prop_oneof![Just(0u64), 0..4u64]
}

fn ledger_op() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        (actor(), ledger_amount()).prop_map(|(from, amount)| LedgerOp::Deposit { from, amount }),
        (actor(), ledger_amount())
            .prop_map(|(claimer, amount)| LedgerOp::Claim { claimer, amount }),
        (actor(), actor(), ledger_amount())
            .prop_map(|(from, to, amount)| LedgerOp::Transfer { from, to, amount }),
        (actor(), ledger_amount()).prop_map(|(from, amount)| LedgerOp::Burn { from, amount }),
    ]
}

fn pass_op() -> impl Strategy<Value = PassOp> {
    prop_oneof![
        (actor(), pass_amount()).prop_map(|(to, amount)| PassOp::Mint { to, amount }),
        (actor(), actor(), pass_amount())
            .prop_map(|(from, to, amount)| PassOp::Transfer { from, to, amount }),
        (actor(), pass_amount()).prop_map(|(from, amount)| PassOp::Burn { from, amount }),
    ]
}

fn native(amount: u64) -> AssetParams {
    AssetParams {
        asset_type: AssetType::Native,
        token: Address::ZERO,
        identifier: U256::ZERO,
        amount: U256::from(amount),
    }
}

fn transfer(from: Address, to: Address, id: U256, amount: u64) -> EventPayload {
    EventPayload::TransferSingle(TransferSingle {
        operator: from,
        from,
        to,
        id,
        value: U256::from(amount),
    })
}

/// Ordered logs, one per block, starting with a house and one round.
struct Logs {
    block: u64,
    events: Vec<LogEvent>,
}

impl Logs {
    fn with_round() -> Self {
        let mut logs = Self {
            block: 0,
            events: Vec::new(),
        };
        logs.push(
            ContractFamily::PropHouse,
            PASS,
            EventPayload::HouseCreated(HouseCreated {
                creator: ACTORS[0],
                house: HOUSE,
                kind: HouseType::Community,
                metadata: None,
            }),
        );
        logs.push(
            ContractFamily::PropHouse,
            PASS,
            EventPayload::RoundCreated(RoundCreated {
                creator: ACTORS[0],
                house: HOUSE,
                round: ROUND,
                kind: RoundType::Timed,
                title: "Round".into(),
                description: String::new(),
            }),
        );
        logs
    }

    fn push(&mut self, family: ContractFamily, address: Address, payload: EventPayload) {
        self.block += 1;
        self.events.push(LogEvent {
            family,
            meta: LogMeta {
                address,
                tx_hash: B256::left_padding_from(&self.block.to_be_bytes()),
                log_index: 0,
                block_number: self.block,
                block_timestamp: 1_000 + self.block * 12,
            },
            payload,
        });
    }

    fn ledger(&mut self, op: &LedgerOp) {
        match *op {
            LedgerOp::Deposit { from, amount } => self.push(
                ContractFamily::PropHouse,
                PASS,
                EventPayload::DepositToRound(DepositToRound {
                    from: ACTORS[from],
                    round: ROUND,
                    asset: native(amount),
                }),
            ),
            LedgerOp::Claim { claimer, amount } => self.push(
                ContractFamily::Round,
                ROUND,
                EventPayload::AwardClaimed(AwardClaimed {
                    proposal_id: U256::from(1),
                    claimer: ACTORS[claimer],
                    recipient: ACTORS[claimer],
                    asset: native(amount),
                }),
            ),
            LedgerOp::Transfer { from, to, amount } => self.push(
                ContractFamily::Round,
                ROUND,
                transfer(ACTORS[from], ACTORS[to], U256::ZERO, amount),
            ),
            LedgerOp::Burn { from, amount } => self.push(
                ContractFamily::Round,
                ROUND,
                transfer(ACTORS[from], Address::ZERO, U256::ZERO, amount),
            ),
        }
    }

    fn pass(&mut self, op: &PassOp) {
        let (from, to, amount) = match *op {
            PassOp::Mint { to, amount } => (Address::ZERO, ACTORS[to], amount),
            PassOp::Transfer { from, to, amount } => (ACTORS[from], ACTORS[to], amount),
            PassOp::Burn { from, amount } => (ACTORS[from], Address::ZERO, amount),
        };
        let house_token = U256::from_be_slice(HOUSE.as_slice());
        self.push(ContractFamily::CreatorPass, PASS, transfer(from, to, house_token, amount));
    }
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

async fn index(events: Vec<LogEvent>) -> Arc<MemoryEntityStore> {
    let store = Arc::new(MemoryEntityStore::new());
    let mut indexer = Indexer::new(
        store.clone(),
        Box::new(MemoryCheckpointStore::new()),
        IndexerConfig::default(),
    );
    indexer
        .run(stream::iter(events.into_iter().map(Ok)))
        .await
        .unwrap();
    store
}

struct LedgerTotals {
    balance: I256,
    deposited: U256,
    reclaimed: U256,
    deposits: usize,
    claims: usize,
}

async fn replay_ledger(ops: &[LedgerOp]) -> LedgerTotals {
    let mut logs = Logs::with_round();
    for op in ops {
        logs.ledger(op);
    }
    let store = index(logs.events).await;

    let balance_id = ids::compose(&[
        &ids::address_key(&ROUND),
        &ids::asset_key_from_token_id(&U256::ZERO),
    ]);
    let balance = store
        .load::<Balance>(&balance_id)
        .await
        .unwrap()
        .map(|b| b.balance)
        .unwrap_or(I256::ZERO);
    let deposits: Vec<Deposit> = store.all().await.unwrap();
    let reclaims: Vec<Reclaim> = store.all().await.unwrap();
    let claims: Vec<Claim> = store.all().await.unwrap();

    LedgerTotals {
        balance,
        deposited: deposits.iter().fold(U256::ZERO, |sum, d| sum + d.amount),
        reclaimed: reclaims.iter().fold(U256::ZERO, |sum, r| sum + r.amount),
        deposits: deposits.len(),
        claims: claims.len(),
    }
}

/// Holder to pass count, keyed by account id.
async fn replay_passes(ops: &[PassOp]) -> (Vec<RoundCreator>, BTreeMap<String, u64>) {
    let mut logs = Logs::with_round();
    for op in ops {
        logs.pass(op);
    }
    let store = index(logs.events).await;
    let creators: Vec<RoundCreator> = store.all().await.unwrap();
    let counts = creators
        .iter()
        .map(|c| (c.creator.clone(), c.pass_count))
        .collect();
    (creators, counts)
}

/// Removes `amount` if `holder` has that many; zero never moves anything.
fn take(held: &mut BTreeMap<usize, u64>, holder: usize, amount: u64) -> bool {
    let have = held.get(&holder).copied().unwrap_or(0);
    if amount == 0 || have < amount {
        return false;
    }
    if have == amount {
        held.remove(&holder);
    } else {
        held.insert(holder, have - amount);
    }
    true
}

fn expected_passes(ops: &[PassOp]) -> BTreeMap<String, u64> {
    let mut held = BTreeMap::new();
    for op in ops {
        match *op {
            PassOp::Mint { to, amount } => {
                if amount > 0 {
                    *held.entry(to).or_default() += amount;
                }
            }
            PassOp::Burn { from, amount } => {
                take(&mut held, from, amount);
            }
            PassOp::Transfer { from, to, amount } => {
                if take(&mut held, from, amount) {
                    *held.entry(to).or_default() += amount;
                }
            }
        }
    }
    held.into_iter()
        .map(|(holder, count)| (ids::address_key(&ACTORS[holder]), count))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pooled_balance_tracks_deposits_and_reclaims(
        ops in prop::collection::vec(ledger_op(), 0..24)
    ) {
        let totals = block_on(replay_ledger(&ops));

        let expected = I256::from_raw(totals.deposited) - I256::from_raw(totals.reclaimed);
        prop_assert_eq!(totals.balance, expected);

        let deposit_ops = ops.iter().filter(|op| matches!(op, LedgerOp::Deposit { .. })).count();
        let claim_ops = ops.iter().filter(|op| matches!(op, LedgerOp::Claim { .. })).count();
        prop_assert_eq!(totals.deposits, deposit_ops);
        prop_assert_eq!(totals.claims, claim_ops);

        let generated: u64 = ops
            .iter()
            .filter_map(|op| match op {
                LedgerOp::Deposit { amount, .. } => Some(*amount),
                _ => None,
            })
            .sum();
        prop_assert_eq!(totals.deposited, U256::from(generated));
    }

    #[test]
    fn pass_counts_stay_positive_and_match_holdings(
        ops in prop::collection::vec(pass_op(), 0..24)
    ) {
        let (creators, counts) = block_on(replay_passes(&ops));

        prop_assert!(creators.iter().all(|c| c.pass_count > 0), "{:?}", creators);
        prop_assert_eq!(counts, expected_passes(&ops));
    }
}
