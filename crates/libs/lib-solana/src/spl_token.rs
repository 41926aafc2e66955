//! Associated token account helpers.

use lib_core::{AppError, Result};
use solana_sdk::pubkey::Pubkey;

/// Byte offset of the `amount` field in an SPL token account
/// (mint: 32 bytes, owner: 32 bytes, amount: u64 little endian).
const TOKEN_ACCOUNT_AMOUNT_OFFSET: usize = 64;

/// Associated token account holding `mint` for `owner`.
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(owner, mint)
}

/// Read the raw amount out of SPL token account data.
pub fn decode_token_amount(data: &[u8]) -> Result<u64> {
    let end = TOKEN_ACCOUNT_AMOUNT_OFFSET + 8;
    let bytes: [u8; 8] = data
        .get(TOKEN_ACCOUNT_AMOUNT_OFFSET..end)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| {
            AppError::Decoding(format!(
                "Token account data too short: {} bytes",
                data.len()
            ))
        })?;
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ata_is_deterministic_per_owner_and_mint() {
        let owner = Pubkey::new_unique();
        let mint_a = Pubkey::new_unique();
        let mint_b = Pubkey::new_unique();

        assert_eq!(
            associated_token_address(&owner, &mint_a),
            associated_token_address(&owner, &mint_a)
        );
        assert_ne!(
            associated_token_address(&owner, &mint_a),
            associated_token_address(&owner, &mint_b)
        );
    }

    #[test]
    fn test_decode_token_amount() {
        let mut data = vec![0u8; 165];
        data[64..72].copy_from_slice(&42_000_000u64.to_le_bytes());
        assert_eq!(decode_token_amount(&data).unwrap(), 42_000_000);

        assert!(matches!(decode_token_amount(&[0u8; 40]), Err(AppError::Decoding(_))));
    }
}
