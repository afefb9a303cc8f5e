// 指令解码器测试 / Instruction decoder tests
use borsh::BorshSerialize;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::{Transaction, VersionedTransaction};

use crate::mango::decoder::{anchor_discriminator, InstructionDecoder};
use crate::mango::events::{MangoEvent, Side};
use crate::mango::group::{
    GroupCache, GroupError, GroupSnapshot, PerpMarketInfo, SerumMarketInfo, TokenInfo,
};

struct Fixture {
    group: Pubkey,
    bank: Pubkey,
    perp_market: Pubkey,
    decoder: InstructionDecoder,
}

fn fixture() -> Fixture {
    let group = Pubkey::new_unique();
    let bank = Pubkey::new_unique();
    let perp_market = Pubkey::new_unique();
    let snapshot = GroupSnapshot::new(
        group.to_string(),
        vec![TokenInfo {
            token_index: 0,
            symbol: "USDC".to_string(),
            mint: Pubkey::new_unique().to_string(),
            decimals: 6,
            banks: vec![bank.to_string()],
            oracle: None,
            vault: None,
        }],
        vec![PerpMarketInfo {
            perp_market_index: 0,
            name: "SOL-PERP".to_string(),
            public_key: perp_market.to_string(),
        }],
        Vec::<SerumMarketInfo>::new(),
    );
    let decoder = InstructionDecoder::new(GroupCache::from_snapshot(snapshot));
    Fixture {
        group,
        bank,
        perp_market,
        decoder,
    }
}

/// 前置的两条compute budget占位指令 / The two leading compute budget placeholder instructions
fn padding_ix() -> Instruction {
    Instruction {
        program_id: Pubkey::new_unique(),
        accounts: vec![],
        data: vec![0, 1, 2],
    }
}

fn anchor_ix(name: &str, accounts: Vec<AccountMeta>, args: &impl BorshSerialize) -> Instruction {
    let mut data = anchor_discriminator(name).to_vec();
    args.serialize(&mut data).unwrap();
    Instruction {
        program_id: Pubkey::new_unique(),
        accounts,
        data,
    }
}

fn transaction(instructions: &[Instruction], payer: &Pubkey) -> VersionedTransaction {
    let message = Message::new(instructions, Some(payer));
    VersionedTransaction::from(Transaction::new_unsigned(message))
}

fn deposit_ix(f: &Fixture, owner: &Pubkey, mango_account: &Pubkey, amount: u64) -> Instruction {
    anchor_ix(
        "token_deposit",
        vec![
            AccountMeta::new_readonly(f.group, false),
            AccountMeta::new(*mango_account, false),
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new(f.bank, false),
            AccountMeta::new(Pubkey::new_unique(), false),
            AccountMeta::new_readonly(Pubkey::new_unique(), false),
            AccountMeta::new(Pubkey::new_unique(), false),
            AccountMeta::new_readonly(*owner, true),
        ],
        &(amount, false),
    )
}

#[tokio::test]
async fn test_decodes_token_deposit() {
    let f = fixture();
    let owner = Pubkey::new_unique();
    let mango_account = Pubkey::new_unique();
    let tx = transaction(
        &[
            padding_ix(),
            padding_ix(),
            deposit_ix(&f, &owner, &mango_account, 1_500_000),
        ],
        &owner,
    );

    let events = f.decoder.decode(&tx, "sig1", Some(1_700_000_000)).await.unwrap();
    assert_eq!(events.len(), 1);
    let MangoEvent::TokenDeposit(e) = &events[0] else {
        panic!("expected tokenDeposit, got {:?}", events[0].event_type());
    };
    assert_eq!(e.amount, 1_500_000);
    assert_eq!(e.token, "USDC");
    assert_eq!(e.meta.mango_account, mango_account.to_string());
    assert_eq!(e.meta.group_pubkey, f.group.to_string());
    assert_eq!(e.meta.timestamp, 1_700_000_000_000);
    assert_eq!(e.meta.signers, vec![owner.to_string()]);
    assert_eq!(e.owner, owner.to_string());
    assert_eq!(e.bank, f.bank.to_string());
}

#[tokio::test]
async fn test_skips_first_two_instructions() {
    let f = fixture();
    let owner = Pubkey::new_unique();
    let tx = transaction(
        &[
            deposit_ix(&f, &owner, &Pubkey::new_unique(), 10),
            padding_ix(),
            padding_ix(),
        ],
        &owner,
    );

    let events = f.decoder.decode(&tx, "sig2", None).await.unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_bad_instruction_does_not_block_siblings() {
    let f = fixture();
    let owner = Pubkey::new_unique();
    let mango_account = Pubkey::new_unique();

    // 判别符对但参数字节不够 / Right discriminator, truncated args
    let broken = Instruction {
        program_id: Pubkey::new_unique(),
        accounts: vec![AccountMeta::new_readonly(f.group, false)],
        data: anchor_discriminator("token_deposit").to_vec(),
    };

    let tx = transaction(
        &[
            padding_ix(),
            padding_ix(),
            broken,
            deposit_ix(&f, &owner, &mango_account, 42),
        ],
        &owner,
    );

    let events = f.decoder.decode(&tx, "sig3", Some(1)).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].mango_account(), mango_account.to_string());
}

#[tokio::test]
async fn test_unknown_bank_drops_only_that_event() {
    let f = fixture();
    let owner = Pubkey::new_unique();
    let mut bad_deposit = deposit_ix(&f, &owner, &Pubkey::new_unique(), 7);
    // bank换成快照外的地址 / Swap the bank for one outside the snapshot
    bad_deposit.accounts[3] = AccountMeta::new(Pubkey::new_unique(), false);

    let good_account = Pubkey::new_unique();
    let tx = transaction(
        &[
            padding_ix(),
            padding_ix(),
            bad_deposit,
            deposit_ix(&f, &owner, &good_account, 7),
        ],
        &owner,
    );

    let events = f.decoder.decode(&tx, "sig4", Some(1)).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].mango_account(), good_account.to_string());
}

#[tokio::test]
async fn test_uninitialized_snapshot_is_fatal() {
    let decoder = InstructionDecoder::new(GroupCache::empty(
        Pubkey::new_unique().to_string(),
        String::new(),
    ));
    let owner = Pubkey::new_unique();
    let tx = transaction(&[padding_ix(), padding_ix()], &owner);

    let err = decoder.decode(&tx, "sig5", None).await.unwrap_err();
    assert!(matches!(err, GroupError::NotInitialized));
}

#[tokio::test]
async fn test_decodes_perp_cancel_order() {
    let f = fixture();
    let owner = Pubkey::new_unique();
    let mango_account = Pubkey::new_unique();
    let ix = anchor_ix(
        "perp_cancel_order",
        vec![
            AccountMeta::new_readonly(f.group, false),
            AccountMeta::new(mango_account, false),
            AccountMeta::new_readonly(owner, true),
            AccountMeta::new(f.perp_market, false),
        ],
        &(123456789i128, 99u64),
    );
    let tx = transaction(&[padding_ix(), padding_ix(), ix], &owner);

    let events = f.decoder.decode(&tx, "sig6", Some(2)).await.unwrap();
    assert_eq!(events.len(), 1);
    let MangoEvent::PerpCancelOrder(e) = &events[0] else {
        panic!("expected perpCancelOrder");
    };
    assert_eq!(e.order_id, 123456789);
    assert_eq!(e.client_order_id, 99);
    assert_eq!(e.token, "SOL-PERP");
    assert_eq!(e.perp_market, f.perp_market.to_string());
}

#[tokio::test]
async fn test_decodes_perp_place_order_side() {
    let f = fixture();
    let owner = Pubkey::new_unique();
    let mango_account = Pubkey::new_unique();
    let args = (
        1u8,        // side: sell
        1234i64,    // price lots
        10i64,      // max base lots
        100i64,     // max quote lots
        7u64,       // client order id
        0u8,        // order type: limit
        false,      // reduce only
        0u64,       // expiry
        10u8,       // limit
    );
    let ix = anchor_ix(
        "perp_place_order",
        vec![
            AccountMeta::new_readonly(f.group, false),
            AccountMeta::new(mango_account, false),
            AccountMeta::new_readonly(owner, true),
            AccountMeta::new(f.perp_market, false),
        ],
        &args,
    );
    let tx = transaction(&[padding_ix(), padding_ix(), ix], &owner);

    let events = f.decoder.decode(&tx, "sig7", Some(3)).await.unwrap();
    let MangoEvent::PerpPlaceOrder(e) = &events[0] else {
        panic!("expected perpPlaceOrder");
    };
    assert_eq!(e.side, Side::Sell);
    assert_eq!(e.price, "1234");
    assert_eq!(e.order_type, "limit");
    assert_eq!(e.client_order_id, "7");
}
