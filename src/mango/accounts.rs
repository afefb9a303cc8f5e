// Mango账户派生与指令构造 / Mango account derivation and instruction building
use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use borsh::BorshSerialize;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;
use solana_sdk::{pubkey, system_instruction, system_program};

use crate::mango::decoder::anchor_discriminator;

pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// MangoAccount PDA: ["MangoAccount", group, owner, accountNum LE]
pub fn derive_mango_account(
    program_id: &Pubkey,
    group: &Pubkey,
    owner: &Pubkey,
    account_num: u32,
) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"MangoAccount",
            group.as_ref(),
            owner.as_ref(),
            &account_num.to_le_bytes(),
        ],
        program_id,
    )
    .0
}

/// 关联token账户地址 / Associated token account address
pub fn derive_associated_token_account(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

// ---------- anchor指令参数布局 / Anchor instruction arg layouts ----------

#[derive(BorshSerialize)]
struct AccountCreateArgs {
    account_num: u32,
    token_count: u8,
    serum3_count: u8,
    perp_count: u8,
    perp_oo_count: u8,
    name: String,
}

#[derive(BorshSerialize)]
struct AccountEditArgs {
    name: Option<String>,
    delegate: Option<[u8; 32]>,
    temporary_delegate: Option<[u8; 32]>,
    temporary_delegate_expiry: Option<u64>,
}

#[derive(BorshSerialize)]
struct TokenDepositArgs {
    amount: u64,
    reduce_only: bool,
}

#[derive(BorshSerialize)]
struct TokenWithdrawArgs {
    amount: u64,
    allow_borrow: bool,
}

#[derive(BorshSerialize)]
struct AccountCloseArgs {
    force_close: bool,
}

/// Mango指令构造器 / Mango instruction builder
pub struct MangoInstructionBuilder {
    program_id: Pubkey,
    group: Pubkey,
}

impl MangoInstructionBuilder {
    pub fn new(program_id: Pubkey, group: Pubkey) -> Self {
        Self { program_id, group }
    }

    pub fn derive_account(&self, owner: &Pubkey, account_num: u32) -> Pubkey {
        derive_mango_account(&self.program_id, &self.group, owner, account_num)
    }

    fn ix(
        &self,
        name: &str,
        accounts: Vec<AccountMeta>,
        args: &impl BorshSerialize,
    ) -> Result<Instruction> {
        let mut data = anchor_discriminator(name).to_vec();
        args.serialize(&mut data)
            .map_err(|e| anyhow!("serialize {} args: {}", name, e))?;
        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data,
        })
    }

    /// 创建mango账户，槽位参数沿用(4,4,4,32)
    /// Create the mango account, slot sizing stays (4,4,4,32)
    pub fn account_create(
        &self,
        owner: &Pubkey,
        mango_account: &Pubkey,
        account_num: u32,
    ) -> Result<Instruction> {
        self.ix(
            "account_create",
            vec![
                AccountMeta::new(*mango_account, false),
                AccountMeta::new_readonly(self.group, false),
                AccountMeta::new_readonly(*owner, true),
                AccountMeta::new(*owner, true),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            &AccountCreateArgs {
                account_num,
                token_count: 4,
                serum3_count: 4,
                perp_count: 4,
                perp_oo_count: 32,
                name: String::new(),
            },
        )
    }

    /// 把交易机器人设为账户代理 / Set the trading bot as the account delegate
    pub fn account_set_delegate(
        &self,
        owner: &Pubkey,
        mango_account: &Pubkey,
        delegate: &Pubkey,
    ) -> Result<Instruction> {
        self.ix(
            "account_edit",
            vec![
                AccountMeta::new_readonly(self.group, false),
                AccountMeta::new(*mango_account, false),
                AccountMeta::new_readonly(*owner, true),
            ],
            &AccountEditArgs {
                name: None,
                delegate: Some(delegate.to_bytes()),
                temporary_delegate: None,
                temporary_delegate_expiry: None,
            },
        )
    }

    pub fn token_deposit(
        &self,
        owner: &Pubkey,
        mango_account: &Pubkey,
        bank: &Pubkey,
        vault: &Pubkey,
        oracle: &Pubkey,
        token_account: &Pubkey,
        amount: u64,
    ) -> Result<Instruction> {
        self.ix(
            "token_deposit",
            vec![
                AccountMeta::new_readonly(self.group, false),
                AccountMeta::new(*mango_account, false),
                AccountMeta::new_readonly(*owner, true),
                AccountMeta::new(*bank, false),
                AccountMeta::new(*vault, false),
                AccountMeta::new_readonly(*oracle, false),
                AccountMeta::new(*token_account, false),
                AccountMeta::new_readonly(*owner, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            ],
            &TokenDepositArgs {
                amount,
                reduce_only: false,
            },
        )
    }

    /// 全额提取，allow_borrow开着以便清空 / Full withdrawal, allow_borrow on so the balance clears
    pub fn token_withdraw(
        &self,
        owner: &Pubkey,
        mango_account: &Pubkey,
        bank: &Pubkey,
        vault: &Pubkey,
        oracle: &Pubkey,
        token_account: &Pubkey,
        amount: u64,
    ) -> Result<Instruction> {
        self.ix(
            "token_withdraw",
            vec![
                AccountMeta::new_readonly(self.group, false),
                AccountMeta::new(*mango_account, false),
                AccountMeta::new_readonly(*owner, true),
                AccountMeta::new(*bank, false),
                AccountMeta::new(*vault, false),
                AccountMeta::new_readonly(*oracle, false),
                AccountMeta::new(*token_account, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            ],
            &TokenWithdrawArgs {
                amount,
                allow_borrow: true,
            },
        )
    }

    /// 清仓后关闭账户，租金退回owner / Close the account after clearing, rent back to the owner
    pub fn account_close(&self, owner: &Pubkey, mango_account: &Pubkey) -> Result<Instruction> {
        self.ix(
            "account_close",
            vec![
                AccountMeta::new_readonly(self.group, false),
                AccountMeta::new(*mango_account, false),
                AccountMeta::new_readonly(*owner, true),
                AccountMeta::new(*owner, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            ],
            &AccountCloseArgs { force_close: false },
        )
    }

    /// 机器人运行费，SOL直接转给delegate / Bot running fee, SOL transferred straight to the delegate
    pub fn fee_transfer(&self, owner: &Pubkey, delegate: &Pubkey, lamports: u64) -> Instruction {
        system_instruction::transfer(owner, delegate, lamports)
    }
}

/// 未签名交易: legacy消息 + bincode + base64，由钱包签名后走 /sendTransaction
/// Unsigned transaction: legacy message + bincode + base64, wallet signs it and posts /sendTransaction
pub fn build_unsigned_transaction(
    instructions: &[Instruction],
    payer: &Pubkey,
    recent_blockhash: Hash,
) -> Result<String> {
    let message = Message::new_with_blockhash(instructions, Some(payer), &recent_blockhash);
    let transaction = Transaction::new_unsigned(message);
    let bytes = bincode::serialize(&transaction)?;
    Ok(BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_derive_is_deterministic() {
        let program_id =
            Pubkey::from_str("4MangoMjqJ2firMokCjjGgoK8d4MXcrgL7XJaL3w6fVg").unwrap();
        let group = Pubkey::from_str("78b8f4cGCwmZ9ysPFMWLaLTkkaYnUjwMJYStWe5RTSSX").unwrap();
        let owner = Pubkey::new_unique();
        let a = derive_mango_account(&program_id, &group, &owner, 1);
        let b = derive_mango_account(&program_id, &group, &owner, 1);
        let c = derive_mango_account(&program_id, &group, &owner, 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_unsigned_transaction_round_trips() {
        let payer = Pubkey::new_unique();
        let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), 1);
        let encoded = build_unsigned_transaction(&[ix], &payer, Hash::default()).unwrap();
        let bytes = BASE64.decode(encoded).unwrap();
        let tx: Transaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(tx.message.account_keys[0], payer);
        assert!(tx.signatures.iter().all(|s| *s == Default::default()));
    }
}
