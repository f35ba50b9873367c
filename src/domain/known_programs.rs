//! Known Program Addresses
//!
//! Constants for the DEX programs a genuine swap must touch, plus the
//! token denylist (stablecoins, wrapped/staked SOL, majors) that never
//! produces an alert.

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// DEX program IDs whose presence in a transaction marks it as a swap.
/// A purchase with none of these among its instructions is treated as
/// an airdrop or plain transfer and rejected.
pub const KNOWN_DEX_PROGRAMS: &[&str] = &[
    // Raydium AMM V4
    "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSdgbctX",
    // Raydium CLMM
    "CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK",
    // Raydium CPMM
    "CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C",
    // Jupiter V6
    "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4",
    // Pump.fun
    "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P",
    // PumpSwap
    "pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA",
    // Orca Whirlpool
    "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc",
    // Meteora DLMM
    "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo",
];

/// Token mints excluded from alerting: stablecoins, wrapped native SOL,
/// liquid staking derivatives, and majors too large to signal anything.
pub const EXCLUDED_MINTS: &[&str] = &[
    // Wrapped SOL (wSOL)
    "So11111111111111111111111111111111111111112",
    // USDC
    "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
    // USDT
    "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
    // mSOL
    "mSoLzYCxHdYgdzU16g5QSh3i5K3z3KZK7ytfqcJm7So",
    // stSOL
    "7dHbWXmci3dT8UFYWYZweBLXgycu7Y3iL6trKn1Y7ARj",
    // JitoSOL
    "J1toso1uCk3RLmjorhTtrVwY9HJ7X8V9yYac6Y7kGCPn",
    // bSOL
    "bSo13r4TkiE4KumL71LsHTPpL2euBYLFx6h9HP3piy1",
    // BONK (too large)
    "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263",
    // JUP
    "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN",
];

/// Symbol-level denylist, matched case-insensitively. Catches re-mints
/// of the majors that are not on the mint denylist.
pub const EXCLUDED_SYMBOLS: &[&str] = &[
    "SOL", "WSOL", "USDC", "USDT", "MSOL", "STSOL", "JITOSOL", "BSOL", "JUP",
];

/// Native SOL mint (wrapped SOL)
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Parse all known DEX program IDs into Pubkeys
pub fn dex_program_pubkeys() -> Vec<Pubkey> {
    KNOWN_DEX_PROGRAMS
        .iter()
        .filter_map(|s| Pubkey::from_str(s).ok())
        .collect()
}

/// Parse all excluded mints into Pubkeys
pub fn excluded_mint_pubkeys() -> Vec<Pubkey> {
    EXCLUDED_MINTS
        .iter()
        .filter_map(|s| Pubkey::from_str(s).ok())
        .collect()
}

/// Check if an address is a known DEX program
pub fn is_known_dex_program(address: &str) -> bool {
    KNOWN_DEX_PROGRAMS.contains(&address)
}

/// Check if a mint is on the denylist
pub fn is_excluded_mint(mint: &str) -> bool {
    EXCLUDED_MINTS.contains(&mint)
}

/// Check if a symbol is on the denylist (case-insensitive)
pub fn is_excluded_symbol(symbol: &str) -> bool {
    EXCLUDED_SYMBOLS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(symbol))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dex_program_pubkeys_parse() {
        let pubkeys = dex_program_pubkeys();
        assert_eq!(pubkeys.len(), 8);
    }

    #[test]
    fn test_excluded_mint_pubkeys_parse() {
        let pubkeys = excluded_mint_pubkeys();
        assert_eq!(pubkeys.len(), 9);
    }

    #[test]
    fn test_is_known_dex_program() {
        assert!(is_known_dex_program("JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4"));
        assert!(is_known_dex_program("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P"));
        assert!(!is_known_dex_program("11111111111111111111111111111111"));
    }

    #[test]
    fn test_is_excluded_mint() {
        assert!(is_excluded_mint(WSOL_MINT));
        assert!(is_excluded_mint("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"));
        assert!(!is_excluded_mint("MintBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB"));
    }

    #[test]
    fn test_is_excluded_symbol_case_insensitive() {
        assert!(is_excluded_symbol("USDC"));
        assert!(is_excluded_symbol("usdc"));
        assert!(is_excluded_symbol("JitoSOL"));
        assert!(!is_excluded_symbol("WIF"));
    }
}
